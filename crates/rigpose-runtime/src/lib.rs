//! `rigpose-runtime` – the pose resolution pipeline.
//!
//! # Modules
//!
//! - [`calibration`] – the rig's fixed transforms
//!   ([`Calibration`][calibration::Calibration]) and the
//!   [`ResolverConfig`][calibration::ResolverConfig] that carries them together
//!   with the missing-light policy.
//! - [`compose`] – [`PoseComposer`][compose::PoseComposer]: maps one capture
//!   record to world-frame camera and light poses.
//! - [`source`] – [`CaptureSource`][source::CaptureSource] and its file and
//!   in-memory implementations.
//! - [`resolver`] – [`PoseResolver`][resolver::PoseResolver]: resolves the whole
//!   log once and caches the result behind a lock.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console logging
//!   plus optional OTLP span export.

pub mod calibration;
pub mod compose;
pub mod resolver;
pub mod source;
pub mod telemetry;

pub use calibration::{
    Calibration, CalibrationChain, MissingLightPolicy, ResolverConfig, TransformConfig,
};
pub use compose::{PoseComposer, servo_angles_or_default};
pub use resolver::PoseResolver;
pub use source::{CaptureSource, InMemorySource, JsonFileSource, parse_capture_log};
pub use telemetry::{TracerProviderGuard, init_tracing};

//! [`PoseResolver`] – turns a whole capture log into world-frame poses.
//!
//! Resolution is all-or-nothing: the first bad record aborts the batch and no
//! partial output is produced.  [`PoseResolver::poses`] computes once and keeps
//! the result for the resolver's lifetime; the log is assumed not to change
//! while the process runs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rigpose_types::{CaptureRecord, FramePose, RigError};
use tracing::{info, instrument, warn};

use crate::calibration::ResolverConfig;
use crate::compose::PoseComposer;
use crate::source::CaptureSource;

/// Resolves capture records into [`FramePose`]s and caches the full log.
///
/// # Example
///
/// ```rust
/// use rigpose_runtime::{InMemorySource, PoseResolver, ResolverConfig};
/// use rigpose_types::{CaptureRecord, EffectorSample, IDENTITY_ROWS};
///
/// let record = CaptureRecord {
///     frame_id: 1,
///     camera: EffectorSample {
///         rotation_matrix: IDENTITY_ROWS,
///         position: [100.0, 200.0, 300.0],
///         servo_angles: None,
///     },
///     light: None,
/// };
/// let resolver = PoseResolver::new(&ResolverConfig::default(), InMemorySource::new(vec![record]));
/// let poses = resolver.poses().unwrap();
/// assert_eq!(poses[0].light.position, [0.0, 300.0, 400.0]);
/// ```
pub struct PoseResolver {
    composer: PoseComposer,
    source: Box<dyn CaptureSource>,
    /// Filled by the first successful [`poses`](Self::poses) call.  The lock
    /// is held for the whole computation so concurrent first callers wait
    /// instead of recomputing.
    cache: Mutex<Option<Arc<[FramePose]>>>,
}

impl PoseResolver {
    pub fn new(config: &ResolverConfig, source: impl CaptureSource + 'static) -> Self {
        Self::with_boxed_source(config, Box::new(source))
    }

    pub fn with_boxed_source(config: &ResolverConfig, source: Box<dyn CaptureSource>) -> Self {
        Self {
            composer: PoseComposer::new(config),
            source,
            cache: Mutex::new(None),
        }
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Compose every record in order.  Does not touch the cache.
    ///
    /// # Errors
    ///
    /// Returns the first [`RigError`] raised by any record.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn resolve(&self, records: &[CaptureRecord]) -> Result<Vec<FramePose>, RigError> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut poses = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if !seen.insert(record.frame_id) {
                warn!(index, frame_id = record.frame_id, "duplicate frame id in capture log");
            }
            poses.push(self.composer.compose(index, record)?);
        }
        Ok(poses)
    }

    /// Load the source and resolve it, once.  Later calls return the cached
    /// result.  Failures are not cached, so a later call tries again.
    #[instrument(skip(self), fields(source = %self.source.describe()))]
    pub fn poses(&self) -> Result<Arc<[FramePose]>, RigError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| RigError::Internal("pose cache lock poisoned".to_string()))?;
        if let Some(poses) = cache.as_ref() {
            return Ok(Arc::clone(poses));
        }

        let records = self.source.load()?;
        let poses: Arc<[FramePose]> = self.resolve(&records)?.into();
        info!(frames = poses.len(), "pose cache populated");
        *cache = Some(Arc::clone(&poses));
        Ok(poses)
    }

    /// Whether [`poses`](Self::poses) has already succeeded.
    pub fn is_cached(&self) -> bool {
        self.cache.lock().map(|c| c.is_some()).unwrap_or(false)
    }
}

impl std::fmt::Debug for PoseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseResolver")
            .field("source", &self.source.describe())
            .field("cached", &self.is_cached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;
    use crate::source::InMemorySource;
    use rigpose_types::{EffectorSample, IDENTITY_ROWS};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(frame_id: i64, position: [f64; 3]) -> CaptureRecord {
        CaptureRecord {
            frame_id,
            camera: EffectorSample {
                rotation_matrix: IDENTITY_ROWS,
                position,
                servo_angles: None,
            },
            light: None,
        }
    }

    /// Counts loads; fails the first `failures` of them.
    struct CountingSource {
        records: Vec<CaptureRecord>,
        loads: Arc<AtomicUsize>,
        failures: usize,
    }

    impl CaptureSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn load(&self) -> Result<Vec<CaptureRecord>, RigError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(RigError::CaptureLog("transient".to_string()));
            }
            Ok(self.records.clone())
        }
    }

    #[test]
    fn resolve_preserves_log_order() {
        let resolver = PoseResolver::new(&ResolverConfig::default(), InMemorySource::default());
        let records = vec![record(9, [0.0; 3]), record(2, [0.0; 3]), record(5, [0.0; 3])];
        let ids: Vec<i64> = resolver
            .resolve(&records)
            .unwrap()
            .iter()
            .map(|p| p.frame_id)
            .collect();
        assert_eq!(ids, vec![9, 2, 5]);
    }

    #[test]
    fn resolve_aborts_on_first_bad_record() {
        let resolver = PoseResolver::new(&ResolverConfig::default(), InMemorySource::default());
        let records = vec![
            record(1, [0.0; 3]),
            record(2, [f64::INFINITY, 0.0, 0.0]),
            record(3, [f64::NAN, 0.0, 0.0]),
        ];
        let err = resolver.resolve(&records).unwrap_err();
        assert!(matches!(err, RigError::MalformedRecord { index: 1, frame_id: 2, .. }));
    }

    #[test]
    fn resolve_allows_duplicate_frame_ids() {
        let resolver = PoseResolver::new(&ResolverConfig::default(), InMemorySource::default());
        let poses = resolver
            .resolve(&[record(1, [0.0; 3]), record(1, [1.0, 0.0, 0.0])])
            .unwrap();
        assert_eq!(poses.len(), 2);
    }

    #[test]
    fn unit_round_trip_with_identity_calibration() {
        let config = ResolverConfig {
            calibration: Calibration::identity(),
            ..ResolverConfig::default()
        };
        let resolver = PoseResolver::new(&config, InMemorySource::default());
        let input = [-1234.5678, 0.125, 98765.4321];
        let poses = resolver.resolve(&[record(1, input)]).unwrap();
        for i in 0..3 {
            let rel = (poses[0].camera.position[i] - input[i]).abs() / input[i].abs();
            assert!(rel < 1e-9, "component {i}: {:?}", poses[0].camera.position);
        }
    }

    #[test]
    fn poses_are_computed_once_and_cached() {
        let loads = Arc::new(AtomicUsize::new(0));
        let resolver = PoseResolver::new(
            &ResolverConfig::default(),
            CountingSource {
                records: vec![record(1, [0.0; 3])],
                loads: Arc::clone(&loads),
                failures: 0,
            },
        );
        assert!(!resolver.is_cached());
        let first = resolver.poses().unwrap();
        let second = resolver.poses().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(resolver.is_cached());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_callers_share_one_computation() {
        let loads = Arc::new(AtomicUsize::new(0));
        let resolver = Arc::new(PoseResolver::new(
            &ResolverConfig::default(),
            CountingSource {
                records: (0..200).map(|i| record(i, [i as f64, 0.0, 0.0])).collect(),
                loads: Arc::clone(&loads),
                failures: 0,
            },
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || resolver.poses().unwrap())
            })
            .collect();
        let results: Vec<Arc<[FramePose]>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        for r in &results {
            assert!(Arc::ptr_eq(r, &results[0]));
            assert_eq!(r.len(), 200);
        }
    }

    #[test]
    fn failed_load_is_not_cached() {
        let loads = Arc::new(AtomicUsize::new(0));
        let resolver = PoseResolver::new(
            &ResolverConfig::default(),
            CountingSource {
                records: vec![record(1, [0.0; 3])],
                loads: Arc::clone(&loads),
                failures: 1,
            },
        );
        assert!(matches!(resolver.poses(), Err(RigError::CaptureLog(_))));
        assert!(!resolver.is_cached());
        assert_eq!(resolver.poses().unwrap().len(), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn debug_output_names_source() {
        let resolver = PoseResolver::new(&ResolverConfig::default(), InMemorySource::default());
        let debug = format!("{resolver:?}");
        assert!(debug.contains("in-memory"));
        assert!(debug.contains("cached: false"));
    }
}

//! Configuration vault – reads/writes `~/.rigpose/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use rigpose_runtime::ResolverConfig;
use rigpose_server::{DEFAULT_HOST, DEFAULT_PORT, ImagePattern, default_allowed_origins};

/// Persisted configuration stored in `~/.rigpose/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Bind address of the pose API.
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port of the pose API.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the capture log (JSON array of records).
    #[serde(default = "default_capture_log")]
    pub capture_log: PathBuf,

    /// Directory holding the processed frame images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_dir: Option<PathBuf>,

    /// Secondary video served at `/api/secondary-video`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_video: Option<PathBuf>,

    /// Browser origins allowed to call the API.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// File-name pattern of the frame images.
    #[serde(default)]
    pub image_pattern: ImagePattern,

    /// Calibration, missing-light policy, rotation validation.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_capture_log() -> PathBuf {
    PathBuf::from("capture_log.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            capture_log: default_capture_log(),
            image_dir: None,
            secondary_video: None,
            allowed_origins: default_allowed_origins(),
            image_pattern: ImagePattern::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

/// Return the path to `~/.rigpose/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rigpose").join("config.toml")
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// The config in effect: the file at `path` (or the defaults when it is
/// absent) with `RIGPOSE_*` environment overrides applied.
pub fn load_effective(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `RIGPOSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RIGPOSE_CAPTURE_LOG` | `capture_log` |
/// | `RIGPOSE_IMAGE_DIR` | `image_dir` |
/// | `RIGPOSE_VIDEO_PATH` | `secondary_video` |
/// | `RIGPOSE_HOST` | `host` |
/// | `RIGPOSE_PORT` | `port` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |name| std::env::var(name).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("RIGPOSE_CAPTURE_LOG") {
        cfg.capture_log = PathBuf::from(v);
    }
    if let Some(v) = lookup("RIGPOSE_IMAGE_DIR") {
        cfg.image_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("RIGPOSE_VIDEO_PATH") {
        cfg.secondary_video = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("RIGPOSE_HOST") {
        cfg.host = v;
    }
    if let Some(v) = lookup("RIGPOSE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
}

/// Save the config to a specific path, creating parent directories.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

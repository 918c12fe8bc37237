//! Sub-command handlers.

use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use rigpose_runtime::{JsonFileSource, PoseResolver};
use rigpose_server::ApiServer;
use rigpose_types::FramePose;

use crate::config::{self, Config};

#[derive(Serialize)]
struct PosesDocument<'a> {
    poses: &'a [FramePose],
}

fn resolver_for(cfg: &Config, log: &Path) -> PoseResolver {
    PoseResolver::new(&cfg.resolver, JsonFileSource::new(log))
}

/// `rigpose serve` – run the pose API until Ctrl-C.
pub fn serve(cfg: Config) -> Result<(), String> {
    let resolver = Arc::new(resolver_for(&cfg, &cfg.capture_log));

    println!("{}", "rigpose – pose API".bold().cyan());
    println!("  capture log : {}", cfg.capture_log.display());
    println!(
        "  images      : {}",
        cfg.image_dir
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!(
        "  listening   : {}",
        format!("http://{}:{}", cfg.host, cfg.port).bold()
    );

    let server = ApiServer::new(resolver)
        .with_host(cfg.host.clone())
        .with_port(cfg.port)
        .with_image_dir(cfg.image_dir.clone())
        .with_image_pattern(cfg.image_pattern.clone())
        .with_secondary_video(cfg.secondary_video.clone())
        .with_allowed_origins(cfg.allowed_origins.clone());

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start runtime: {e}"))?;
    runtime
        .block_on(async move {
            let bound = server.bind().await?;
            bound
                .serve(async {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        println!();
                        println!("{}", "Ctrl-C received – shutting down.".yellow().bold());
                    }
                })
                .await
        })
        .map_err(|e| e.to_string())
}

/// `rigpose resolve` – resolve every frame once and write the JSON document
/// to `out` (stdout when `None`).
pub fn resolve(cfg: Config, log: Option<PathBuf>, out: Option<PathBuf>) -> Result<(), String> {
    let log = log.unwrap_or_else(|| cfg.capture_log.clone());
    let resolver = resolver_for(&cfg, &log);
    let poses = resolver.poses().map_err(|e| e.to_string())?;
    let rendered = render_poses(&poses)?;

    match &out {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            info!(frames = poses.len(), out = %path.display(), "poses written");
        }
        None => println!("{rendered}"),
    }
    eprintln!(
        "{} {} frame(s) from {}",
        "✓ resolved".green(),
        poses.len(),
        log.display()
    );
    Ok(())
}

/// Pretty JSON `{"poses": [...]}`, the same shape `/api/poses` returns.
pub(crate) fn render_poses(poses: &[FramePose]) -> Result<String, String> {
    serde_json::to_string_pretty(&PosesDocument { poses })
        .map_err(|e| format!("Failed to serialize poses: {e}"))
}

/// `rigpose schema` – JSON Schema of one resolved frame.
pub fn print_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(FramePose);
    let rendered = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("Failed to serialize schema: {e}"))?;
    println!("{rendered}");
    Ok(())
}

/// `rigpose init-config` – write the default config to `path`.
pub fn init_config(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    config::save_to(&Config::default(), path)?;
    println!("{} {}", "✓ wrote".green(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"[
        {"id": 0,
         "camera": {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]],
                    "position": [100, 200, 300],
                    "servo_angles": [1, 2, 3, 4, 5, 6, 7]},
         "light":  {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]],
                    "position": [0, 0, 500]}},
        {"id": 1,
         "camera": {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]],
                    "position": [110, 200, 300]}}
    ]"#;

    #[test]
    fn resolve_writes_poses_document() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let log = dir.path().join("capture_log.json");
        let out = dir.path().join("poses.json");
        std::fs::write(&log, LOG).unwrap();

        resolve(Config::default(), Some(log), Some(out.clone())).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        let poses = doc["poses"].as_array().unwrap();
        assert_eq!(poses.len(), 2);
        assert_eq!(poses[0]["frame_id"], 0);
        assert_eq!(poses[1]["frame_id"], 1);
        assert_eq!(
            poses[0]["camera"]["servo_angles"],
            serde_json::json!([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
        // Frame 1 has no light sample; the fixed pose is substituted.
        assert_eq!(
            poses[1]["light"]["position"],
            serde_json::json!([0.0, 300.0, 400.0])
        );
    }

    #[test]
    fn resolve_reports_missing_log() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = resolve(
            Config::default(),
            Some(dir.path().join("absent.json")),
            None,
        )
        .unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn render_poses_of_empty_log() {
        let rendered = render_poses(&[]).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(doc, serde_json::json!({"poses": []}));
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join("config.toml");

        init_config(&path, false).unwrap();
        assert!(config::load_from(&path).unwrap().is_some());

        let err = init_config(&path, false).unwrap_err();
        assert!(err.contains("already exists"));
        init_config(&path, true).unwrap();
    }
}

//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub api_key_configured: bool,
}

/// Write a default config and create the database schema
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitReport> {
    let config = Config::for_base_dir(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    info!("Initializing tubecache in {:?}", config.paths.base_dir);
    config.save()?;
    MetaDb::connect(&config).await?;

    Ok(InitReport {
        config_path: config.paths.config_file.clone(),
        db_path: config.paths.db_file.clone(),
        api_key_configured: config.api_key().is_some(),
    })
}

pub fn print_init_report(report: &InitReport, api_key_env: &str) {
    println!("✓ tubecache initialized successfully");
    println!("  Config: {}", report.config_path.display());
    println!("  Database: {}", report.db_path.display());
    println!("\nNext steps:");
    if !report.api_key_configured {
        println!("  1. Export {} with your upstream API key", api_key_env);
    } else {
        println!("  1. Edit the config file to customize settings");
    }
    println!("  2. Fetch a video: tubecache video <VIDEO_ID>");
    println!("  3. Ingest its comments: tubecache comments <VIDEO_ID> --follow");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let report = cmd_init(Some(tmp.path().to_path_buf()), false).await.unwrap();

        assert!(report.config_path.exists());
        assert!(report.db_path.exists());

        let loaded = Config::load(&report.config_path).unwrap();
        assert_eq!(loaded.cache.chunk_size, 100);
    }

    #[tokio::test]
    async fn test_init_refuses_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        cmd_init(Some(tmp.path().to_path_buf()), false).await.unwrap();

        let err = cmd_init(Some(tmp.path().to_path_buf()), false).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(cmd_init(Some(tmp.path().to_path_buf()), true).await.is_ok());
    }
}

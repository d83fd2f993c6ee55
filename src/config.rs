//! TOML configuration -- detection defaults plus the optional intent
//! service, with environment variable override for the file path.

use crate::detect::DetectionParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Root configuration for the daemon and CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionParams,
    pub intent: IntentConfig,
}

/// Remote intent translator settings. Left empty, the keyword fallback
/// handles every query locally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// HTTP endpoint of the translation service.
    pub endpoint: Option<String>,
    /// Bearer token sent with each request.
    pub token: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try, in order: `AUTHSENTRY_CONFIG`, `./authsentry.toml`, then
    /// compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("AUTHSENTRY_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "AUTHSENTRY_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local_path = Path::new("authsentry.toml");
        if local_path.exists() {
            match Self::load(local_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(error = %e, "local config file exists but could not be loaded, using defaults");
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.detection.window_minutes, 5);
        assert_eq!(cfg.detection.fail_threshold, 10);
        assert!(cfg.intent.endpoint.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
[detection]
fail_threshold = 6
"#,
        )
        .unwrap();
        assert_eq!(cfg.detection.fail_threshold, 6);
        assert_eq!(cfg.detection.window_minutes, 5);
        assert_eq!(cfg.detection.contamination, 0.02);
    }

    #[test]
    fn test_parse_full_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
[detection]
window_minutes = 10
fail_threshold = 20
contamination = 0.05
top_k = 25
horizon_minutes = 30
seed = 7

[intent]
endpoint = "http://localhost:9000/intent"
token = "secret"
"#,
        )
        .unwrap();
        assert_eq!(cfg.detection.window_minutes, 10);
        assert_eq!(cfg.detection.seed, 7);
        assert_eq!(
            cfg.intent.endpoint.as_deref(),
            Some("http://localhost:9000/intent")
        );
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(AppConfig::load(Path::new("/nonexistent/authsentry.toml")).is_err());
    }
}

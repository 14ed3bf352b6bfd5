use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CLASSIFIER_URL_ENV: &str = "TX_SENTRY_CLASSIFIER_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub classifier: Classifier,
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub dataset: Dataset,
    #[serde(default)]
    pub store: Store,
    #[serde(default)]
    pub view: View,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Environment overrides applied after the file is read.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(CLASSIFIER_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.classifier.base_url = url.to_string();
            }
        }
    }

    /// Directory holding one session's stored documents.
    pub fn session_dir(&self) -> PathBuf {
        PathBuf::from(&self.store.dir).join(&self.store.session)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Classifier {
    pub base_url: String,
    pub predict_path: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}
impl Default for Classifier {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            predict_path: "/predict".into(),
            timeout_seconds: 30,
            connect_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    /// Pause inserted after each progress tick; 0 only yields to the scheduler.
    pub row_yield_millis: u64,
    pub progress_log_every: usize,
}
impl Default for Pipeline {
    fn default() -> Self {
        Self {
            row_yield_millis: 1,
            progress_log_every: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub delimiter: String,
    pub trim_headers: bool,
    pub require_csv_extension: bool,
    /// 0 disables the cap.
    pub max_rows: usize,
}
impl Default for Dataset {
    fn default() -> Self {
        Self {
            delimiter: ",".into(),
            trim_headers: true,
            require_csv_extension: true,
            max_rows: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    pub enabled: bool,
    pub dir: String,
    pub session: String,
}
impl Default for Store {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: ".tx-sentry".into(),
            session: "default".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct View {
    pub page_size: usize,
}
impl Default for View {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

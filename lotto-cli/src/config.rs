use anyhow::Context;
use lotto_core::LotteryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Account the built-in oracle fulfils draws as.
pub const ORACLE_ACCOUNT: &str = "oracle";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lotto"),
        }
    }
}

impl CliConfig {
    /// Lottery rules from an explicit file, else `<data_dir>/config.json`, else defaults.
    pub fn lottery_config(&self, explicit: Option<&Path>) -> anyhow::Result<LotteryConfig> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = self.data_dir.join("config.json");
                if !path.exists() {
                    return Ok(LotteryConfig::default());
                }
                path
            }
        };

        LotteryConfig::load(&path)
            .with_context(|| format!("Failed to load lottery config from {}", path.display()))
    }
}

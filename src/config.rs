use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::planner::ShareBoost;
use crate::utils;

const DEFAULT_TIMEZONE: &str = "Europe/London";
const DEFAULT_FESTIVAL_YEAR: i32 = 2019;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: Option<PathBuf>,
    pub timezone: String,
    pub festival_year: i32,
    pub default_boost: ShareBoost,
    /// Hide tokens applied when the command line names none.
    pub hidden: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            festival_year: DEFAULT_FESTIVAL_YEAR,
            default_boost: ShareBoost::None,
            hidden: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("FRINGE_PLANNER_DB") {
            if !path.trim().is_empty() {
                self.database_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(tz) = std::env::var("FRINGE_PLANNER_TZ") {
            if !tz.trim().is_empty() {
                self.timezone = tz.trim().to_string();
            }
        }
        self
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| PlannerError::Config(format!("timezone {}: {err}", self.timezone)))
    }

    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(utils::database_path)
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = read_config(&path).unwrap_or_else(|err| {
            log::warn!("ignoring unreadable config {:?}: {err}", path);
            AppConfig::default()
        });
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn read(&self) -> AppConfig {
        match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F>(&self, transform: F) -> Result<AppConfig>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| PlannerError::Config("config mutex poisoned".to_string()))?;
        transform(&mut guard);
        write_config(&self.path, &guard)?;
        Ok(guard.clone())
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| PlannerError::Config(err.to_string()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<()> {
    utils::ensure_parent(path);
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents).map_err(|err| PlannerError::Config(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::load_from(dir.path().join("config.json"));
        let config = store.read();
        assert_eq!(config.timezone, "Europe/London");
        assert_eq!(config.festival_year, 2019);
        assert_eq!(config.default_boost, ShareBoost::None);
        assert_eq!(config.tz().expect("tz"), chrono_tz::Europe::London);
    }

    #[test]
    fn update_persists_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        let store = ConfigStore::load_from(path.clone());
        store
            .update(|config| {
                config.default_boost = ShareBoost::Lot;
                config.hidden = vec!["Comedy".to_string()];
            })
            .expect("update config");

        let reloaded = ConfigStore::load_from(path).read();
        assert_eq!(reloaded.default_boost, ShareBoost::Lot);
        assert_eq!(reloaded.hidden, vec!["Comedy".to_string()]);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let config = AppConfig {
            timezone: "Mars/Olympus".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.tz(), Err(PlannerError::Config(_))));
    }
}

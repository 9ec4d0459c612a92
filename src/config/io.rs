use std::fs;
use std::path::Path;

use super::{AppConfig, PartialAppConfig};

impl AppConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            let defaults = Self::default();
            defaults.save_to_path(path)?;
            return Ok(defaults);
        }
        let raw = fs::read_to_string(path)
            .map_err(|err| format!("failed reading config {:?}: {err}", path))?;
        let partial: PartialAppConfig = serde_json::from_str(&raw)
            .map_err(|err| format!("failed parsing config {:?}: {err}", path))?;
        let config = Self::default().merged(partial);
        config.save_to_path(path)?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("failed creating config directory {:?}: {err}", parent))?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|err| format!("failed serializing config: {err}"))?;
        fs::write(path, raw).map_err(|err| format!("failed writing config {:?}: {err}", path))
    }
}

use std::path::PathBuf;

pub fn default_config_path() -> PathBuf {
    config_root_dir().join("settings.json")
}

pub fn default_log_path() -> PathBuf {
    config_root_dir().join("tether.log")
}

pub fn config_root_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config").join("tether");
    }
    PathBuf::from(".config").join("tether")
}

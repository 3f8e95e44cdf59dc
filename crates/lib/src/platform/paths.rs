use std::path::PathBuf;

use crate::consts::{APP_NAME, CONFIG_FILENAME, STORE_ENV_VAR};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> PathBuf {
  std::env::var("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
    .join(APP_NAME)
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
  let config_home = std::env::var("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".config"));
  config_home.join(APP_NAME)
}

/// Returns the user-level configuration file path.
pub fn user_config_path() -> PathBuf {
  config_dir().join(CONFIG_FILENAME)
}

/// Returns the store root used to derive package paths.
///
/// `PINENV_STORE` overrides the default.
pub fn store_dir() -> PathBuf {
  if let Ok(path) = std::env::var(STORE_ENV_VAR) {
    return PathBuf::from(path);
  }

  default_store_dir()
}

#[cfg(windows)]
pub fn default_store_dir() -> PathBuf {
  let drive = std::env::var("SYSTEMDRIVE").unwrap_or_else(|_| "C:".to_string());
  PathBuf::from(format!("{}\\", drive)).join(APP_NAME).join("store")
}

#[cfg(not(windows))]
pub fn default_store_dir() -> PathBuf {
  PathBuf::from("/").join(APP_NAME).join("store")
}

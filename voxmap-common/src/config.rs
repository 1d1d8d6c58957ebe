//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Ensure the root folder exists and return the database path inside it
pub fn prepare_root_folder(root: &PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(root)
        .map_err(|e| Error::Config(format!("Failed to create root folder {:?}: {}", root, e)))?;
    Ok(root.join("voxmap.db"))
}

/// Locate the platform config file (~/.config/voxmap/config.toml, with an
/// /etc fallback on Linux)
fn find_config_file() -> Result<PathBuf> {
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("voxmap").join("config.toml")) {
        if user_config.exists() {
            return Ok(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/voxmap/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("voxmap"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/voxmap"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("voxmap"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/voxmap"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("voxmap"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\voxmap"))
    } else {
        PathBuf::from("./voxmap_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_arg_wins_over_everything() {
        let resolved = resolve_root_folder(Some("/tmp/voxmap-test"), "VOXMAP_NO_SUCH_VAR");
        assert_eq!(resolved, PathBuf::from("/tmp/voxmap-test"));
    }

    #[test]
    fn prepare_creates_folder_and_names_database() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("root");
        let db_path = prepare_root_folder(&root).unwrap();
        assert!(root.exists());
        assert_eq!(db_path.file_name().unwrap(), "voxmap.db");
    }
}

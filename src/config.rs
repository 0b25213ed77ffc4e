use std::path::{Path, PathBuf};

use quire::{parse_config, parse_string, Options};
use quire::validate as V;

use crate::error::{Error, Result};


pub static DEFAULT_SETTINGS_FILE: &'static str = "/etc/minidock.yaml";
pub static DEFAULT_STORAGE_DIR: &'static str = "/var/lib/minidock";


#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Root of the `images`, `images_meta` and `containers` directories
    pub storage_dir: PathBuf,
    /// Command run when a container is started without one
    pub default_command: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct SettingsFile {
    storage_dir: Option<PathBuf>,
    default_command: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            default_command: vec!["/bin/sh".to_string()],
        }
    }
}

fn settings_validator<'a>() -> V::Structure<'a> {
    V::Structure::new()
    .member("storage_dir", V::Directory::new().absolute(true).optional())
    // V::Sequence would turn a missing key into `[]`
    .member("default_command", V::Anything)
}

fn merge(file: SettingsFile) -> Result<Settings> {
    let mut settings = Settings::default();
    if let Some(dir) = file.storage_dir {
        if !dir.is_absolute() {
            return Err(Error::Config(format!(
                "storage_dir must be absolute, got {:?}", dir)));
        }
        settings.storage_dir = dir;
    }
    if let Some(command) = file.default_command {
        if command.is_empty() {
            return Err(Error::Config(
                "default_command must not be empty".to_string()));
        }
        settings.default_command = command;
    }
    Ok(settings)
}

/// Reads settings from an explicit file or from the system-wide one
///
/// An explicitly passed file must exist. The system-wide file is optional,
/// built-in defaults are used when it's absent.
pub fn read_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_SETTINGS_FILE);
            if !default.exists() {
                debug!("No {:?}, using default settings", default);
                return Ok(Settings::default());
            }
            default
        }
    };
    let file: SettingsFile = parse_config(path,
        &settings_validator(), &Options::default())
        .map_err(|e| Error::Config(format!(
            "error reading settings {:?}: {}", path, e)))?;
    merge(file)
}

/// Parses settings from a string, `name` is only used in error messages
pub fn parse_settings(name: &str, data: &str) -> Result<Settings> {
    let file: SettingsFile = parse_string(name, data,
        &settings_validator(), &Options::default())
        .map_err(|e| Error::Config(format!(
            "error reading settings {:?}: {}", name, e)))?;
    merge(file)
}

use serde_derive::Deserialize;
use std::io::Read;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use thiserror::*;

/// Per-subscription buffer, in batches.
pub const CHANNEL_SIZE: usize = 32;
/// Changes the in-memory store keeps for listeners that fall behind.
pub const CHANGE_CAPACITY: usize = 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error {0} when reading config")]
    IoError(#[from] std::io::Error),
    #[error("cannot open config file '{0}' : {1}")]
    OpeningError(PathBuf, std::io::Error),
    #[error("UTF8 format error when reading config")]
    Utf8Error,
    #[error("format error {0} when reading config")]
    FormatError(#[from] serde_yaml::Error),
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub url: String,
    pub change_capacity: Option<usize>,
    pub listener_buffer: Option<usize>,
}

impl StorageConfig {
    pub fn change_capacity(&self) -> usize {
        self.change_capacity.unwrap_or(CHANGE_CAPACITY)
    }

    pub fn listener_buffer(&self) -> usize {
        self.listener_buffer.unwrap_or(CHANNEL_SIZE)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "memory://".into(),
            change_capacity: None,
            listener_buffer: None,
        }
    }
}

#[derive(Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    pub log: Option<crate::log::Log>,
}

impl Config {
    pub fn from_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let p = path.as_ref();
        let mut file = File::open(p).map_err(|e| ConfigError::OpeningError(p.to_owned(), e))?;
        let mut contents = vec![];
        file.read_to_end(&mut contents)?;
        let contents = String::from_utf8(contents).map_err(|_| ConfigError::Utf8Error)?;
        let config = Config::from_str(&contents)?;
        Ok(config)
    }
}

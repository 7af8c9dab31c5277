use std::{env, path::PathBuf};

use log::warn;

/// Runtime configuration, read once from the environment by the embedding
/// service and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Key used to sign and verify session tokens.
    pub session_secret: String,
    /// Directory recipe images are written beneath.
    pub media_root: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: require("DATABASE_URL"),
            session_secret: require("SESSION_SECRET"),
            media_root: PathBuf::from(try_load("MEDIA_ROOT", "media")),
        }
    }
}

fn require(key: &str) -> String {
    match env::var(key) {
        Ok(value) => value,
        Err(_) => panic!("Environment variable {key} is not set"),
    }
}

fn try_load(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{key} not set, using default: {default}");
        default.to_string()
    })
}

use dotenvy::dotenv;
use std::env;
use thiserror::Error;

use crate::message::MessagingTarget;

pub const DEFAULT_MESSAGING_HOST: &str = "wa.me";
pub const DEFAULT_WHATSAPP_NUMBER: &str = "5511981296861";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MESSAGING_HOST must not be empty")]
    EmptyHost,

    #[error("WHATSAPP_NUMBER must contain only digits, got {0:?}")]
    InvalidDestination(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: MessagingTarget,
}

impl Config {
    /// Reads `.env` and the environment. `TELOXIDE_TOKEN` is picked up
    /// separately by `Bot::from_env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_vars(env::var("MESSAGING_HOST").ok(), env::var("WHATSAPP_NUMBER").ok())
    }

    fn from_vars(host: Option<String>, destination: Option<String>) -> Result<Self, ConfigError> {
        let host = host.unwrap_or_else(|| DEFAULT_MESSAGING_HOST.to_string());
        let host = host.trim();
        if host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let destination = destination.unwrap_or_else(|| DEFAULT_WHATSAPP_NUMBER.to_string());
        let destination = destination.trim();
        if destination.is_empty() || !destination.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidDestination(destination.to_string()));
        }

        Ok(Config {
            target: MessagingTarget {
                host: host.to_string(),
                destination: destination.to_string(),
            },
        })
    }
}

use anyhow::{Context, Result};

// Environment variable names shared across modules.
pub const MAPPING_FILE: &str = "MAPPING_FILE";
pub const CA_CERT_FILE: &str = "CA_CERT_FILE";
pub const CERT_FILE: &str = "CERT_FILE";
pub const KEY_FILE: &str = "KEY_FILE";
pub const NO_VERIFY: &str = "NO_VERIFY";
pub const LOG_LEVEL: &str = "LOG_LEVEL";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub log_level: log::Level,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port: u16 = env("PORT", "8080").parse().context("PORT parse")?;
        let log_level = env(LOG_LEVEL, "info")
            .parse::<log::Level>()
            .context("LOG_LEVEL parse")?;

        Ok(Self { port, log_level })
    }
}

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

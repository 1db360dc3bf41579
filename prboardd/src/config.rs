use std::{env, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::{fs::File, io::AsyncReadExt};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7192;
pub const DEFAULT_API_URL: &str = "https://api.github.com";

pub const CONFIG_FILE_ENV: &str = "PRBOARD_CONFIG_FILE";
pub const TOKEN_ENV: &str = "PRBOARD_GITHUB_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("No GitHub token, set 'token' in the config file or the {TOKEN_ENV} env var")]
    MissingToken,
}

#[derive(Deserialize, Debug)]
struct RawConfig {
    organization: String,
    token: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    api_url: Option<String>,
    store_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct GithubConfig {
    pub organization: String,
    pub token: String,
    pub api_url: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub github: GithubConfig,
    pub host: String,
    pub port: u16,
    // No file means records only live as long as the process.
    pub store_file: Option<PathBuf>,
}

impl Config {
    pub fn from_toml(contents: &str, env_token: Option<String>) -> Result<Config, ConfigError> {
        let RawConfig {
            organization,
            token,
            host,
            port,
            api_url,
            store_file,
        } = toml::from_str(contents)?;

        let token = token
            .or(env_token)
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        Ok(Config {
            github: GithubConfig {
                organization,
                token,
                api_url: api_url
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            host: host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: port.unwrap_or(DEFAULT_PORT),
            store_file,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn config_path(arg: Option<String>) -> String {
    arg.or(env::var(CONFIG_FILE_ENV).ok())
        .unwrap_or(DEFAULT_CONFIG_FILE.to_string())
}

pub async fn load_config(path: &str) -> Result<Config, ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_string(),
        source,
    };

    let mut config_file = File::open(path).await.map_err(io_error)?;
    let mut config_file_contents = vec![];
    config_file
        .read_to_end(&mut config_file_contents)
        .await
        .map_err(io_error)?;

    Config::from_toml(
        String::from_utf8_lossy(&config_file_contents).as_ref(),
        env::var(TOKEN_ENV).ok(),
    )
}

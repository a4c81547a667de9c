use thiserror::Error;

use crate::pool::PoolError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Setup env variable SLOBS_TEST_USER_POOL_TOKEN to run this test")]
    MissingToken,

    #[error("User pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

//! Configuração do cliente do user-pool carregada a partir de `userpool.toml`.
//!
//! A struct [`PoolConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `USER_POOL_URL` e `SLOBS_TEST_USER_POOL_TOKEN`
//! têm precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::reservation::RetryPolicy;

pub const CONFIG_FILE: &str = "userpool.toml";
pub const URL_ENV: &str = "USER_POOL_URL";
pub const TOKEN_ENV: &str = "SLOBS_TEST_USER_POOL_TOKEN";

/// Configuração de nível superior carregada de `userpool.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// URL base do serviço de user-pool.
    #[serde(default)]
    pub base_url: String,

    /// Token de acesso ao serviço.
    #[serde(default)]
    pub token: String,

    /// Máximo de tentativas de reserva antes de desistir.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Atraso fixo em segundos entre tentativas de reserva.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Timeout de conexão HTTP em segundos.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout total de cada requisição HTTP em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Valor padrão para tentativas máximas: 5.
fn default_max_attempts() -> u32 {
    5
}

// Valor padrão para o atraso entre tentativas: 20s.
fn default_retry_delay_secs() -> u64 {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PoolConfig {
    /// Carrega a configuração e aplica as variáveis de ambiente.
    ///
    /// Sem `path`, usa `userpool.toml` no diretório atual, ou os valores
    /// padrão se o arquivo não existir. Com `path`, o arquivo é obrigatório.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<PoolConfig>(&contents)?)
    }

    /// Sobrescreve URL e token com os valores não vazios devolvidos por `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.token = token;
        }
    }

    /// Verifica se há URL e token suficientes para falar com o pool.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.token.trim().is_empty() {
            return Err(AppError::MissingToken);
        }
        if self.base_url.trim().is_empty() {
            return Err(AppError::Config(format!(
                "user-pool URL is not set, use `base_url` in {CONFIG_FILE} or {URL_ENV}"
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_values() {
        let config = PoolConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_delay_secs, 20);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 60);
        assert!(config.token.is_empty());
        assert!(config.base_url.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            base_url = "https://pool.example.com"
            max_attempts = 3
        "#;
        let config: PoolConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_url, "https://pool.example.com");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay_secs, 20);
        assert!(config.token.is_empty());
    }

    #[test]
    fn retry_policy_from_config() {
        let config = PoolConfig {
            max_attempts: 2,
            retry_delay_secs: 1,
            ..PoolConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn environment_takes_precedence() {
        let env: HashMap<&str, &str> = [
            (URL_ENV, "https://env.example.com"),
            (TOKEN_ENV, "env-token"),
        ]
        .into_iter()
        .collect();
        let mut config = PoolConfig {
            base_url: "https://file.example.com".into(),
            token: "file-token".into(),
            ..PoolConfig::default()
        };

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.base_url, "https://env.example.com");
        assert_eq!(config.token, "env-token");
    }

    #[test]
    fn empty_environment_values_are_ignored() {
        let mut config = PoolConfig {
            token: "file-token".into(),
            ..PoolConfig::default()
        };
        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config.token, "file-token");
    }

    #[test]
    fn validate_requires_token() {
        let config = PoolConfig {
            base_url: "https://pool.example.com".into(),
            ..PoolConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Setup env variable SLOBS_TEST_USER_POOL_TOKEN to run this test"
        );
    }

    #[test]
    fn validate_requires_url() {
        let config = PoolConfig {
            token: "t".into(),
            ..PoolConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://127.0.0.1:5000\"").unwrap();
        writeln!(file, "token = \"secret\"").unwrap();
        writeln!(file, "retry_delay_secs = 0").unwrap();

        let config = PoolConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.token, "secret");
        assert_eq!(config.retry_delay_secs, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PoolConfig::load(Some(dir.path().join("missing.toml").as_path()));
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_attempts = \"many\"").unwrap();
        let result = PoolConfig::from_file(file.path());
        assert!(matches!(result, Err(AppError::Toml(_))));
    }
}

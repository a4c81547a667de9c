//! Tipos de erro do cliente do user-pool.
//!
//! Define [`PoolError`] com variantes para falhas da API, falhas de rede,
//! respostas inválidas e o esgotamento das tentativas de reserva.

use thiserror::Error;

use super::types::Platform;
use crate::session::SessionError;

/// Erros que podem ocorrer ao interagir com o serviço de user-pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// O serviço respondeu com status fora de 2xx (ex.: nenhum usuário livre).
    #[error("user-pool API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// O corpo da resposta não é uma conta válida.
    #[error("failed to parse user-pool response: {0}")]
    Parse(String),

    /// O pool devolveu uma conta de outra plataforma.
    #[error("requested a {requested} user but the pool returned a {returned} user ({email})")]
    PlatformMismatch {
        requested: Platform,
        returned: Platform,
        email: String,
    },

    /// Todas as tentativas de reserva falharam.
    #[error("unable to reserve a user after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// URL base inválida na configuração.
    #[error("invalid user-pool URL: {0}")]
    InvalidUrl(String),

    /// Uso incorreto da sessão (ex.: reservar com uma conta já reservada).
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl PoolError {
    /// Indica se uma nova tentativa de reserva pode ter outro resultado.
    ///
    /// Erros de configuração e de uso da sessão falham na hora.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PoolError::InvalidUrl(_) | PoolError::Session(_) | PoolError::Exhausted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = PoolError::Api {
            status: 503,
            message: "no free users".into(),
        };
        assert_eq!(err.to_string(), "user-pool API error (status 503): no free users");
    }

    #[test]
    fn exhausted_display_carries_attempts() {
        let err = PoolError::Exhausted {
            attempts: 5,
            last_error: "network error: connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "unable to reserve a user after 5 attempts: network error: connection refused"
        );
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(PoolError::Api { status: 500, message: String::new() }.is_retryable());
        assert!(PoolError::Parse("eof".into()).is_retryable());
        assert!(
            PoolError::PlatformMismatch {
                requested: Platform::Twitch,
                returned: Platform::Youtube,
                email: "a@b.com".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn setup_errors_are_not_retryable() {
        assert!(!PoolError::InvalidUrl("nope".into()).is_retryable());
        assert!(
            !PoolError::Session(SessionError::AlreadyHeld {
                email: "a@b.com".into()
            })
            .is_retryable()
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PoolError>();
    }
}

//! Interface de linha de comando do userpool baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (reserve, release, run)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use userpool::{FeatureFilter, Platform, ReserveRequest};

/// userpool: reserva contas de teste descartáveis no serviço de user-pool.
#[derive(Debug, Parser)]
#[command(name = "userpool", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo de configuração (padrão: `userpool.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Argumento de plataforma aceito pela CLI, mapeado para [`Platform`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PlatformArg {
    Twitch,
    Youtube,
    Mixer,
    Facebook,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Twitch => Platform::Twitch,
            PlatformArg::Youtube => Platform::Youtube,
            PlatformArg::Mixer => Platform::Mixer,
            PlatformArg::Facebook => Platform::Facebook,
        }
    }
}

/// Critérios de reserva compartilhados por `reserve` e `run`.
#[derive(Debug, Args)]
pub struct ReserveArgs {
    /// Plataforma da conta; qualquer uma se omitida.
    #[arg(long, short)]
    pub platform: Option<PlatformArg>,

    /// Capacidade exigida, no formato `nome` ou `nome=true|false`. Repetível.
    #[arg(long = "feature", value_name = "NAME[=BOOL]", value_parser = parse_feature)]
    pub features: Vec<(String, bool)>,

    /// Número máximo de tentativas de reserva.
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

impl ReserveArgs {
    pub fn to_request(&self) -> ReserveRequest {
        let mut request = ReserveRequest {
            platform: self.platform.map(Platform::from),
            ..ReserveRequest::default()
        };
        if !self.features.is_empty() {
            request = request.with_features(self.features.iter().cloned().collect::<FeatureFilter>());
        }
        if let Some(max_attempts) = self.max_attempts {
            request = request.with_max_attempts(max_attempts);
        }
        request
    }
}

fn parse_feature(raw: &str) -> Result<(String, bool), String> {
    let (name, enabled) = match raw.split_once('=') {
        None => (raw, true),
        Some((name, value)) => {
            let enabled = value
                .parse::<bool>()
                .map_err(|_| format!("invalid value `{value}` for feature `{name}`, expected true or false"))?;
            (name, enabled)
        }
    };
    if name.is_empty() {
        return Err("feature name must not be empty".to_string());
    }
    Ok((name.to_string(), enabled))
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reserva uma conta e imprime o registro em JSON. A conta fica reservada.
    Reserve {
        #[command(flatten)]
        args: ReserveArgs,

        /// Imprime o payload de login em vez do registro bruto.
        #[arg(long, default_value_t = false)]
        auth_info: bool,
    },

    /// Libera uma conta reservada anteriormente.
    Release {
        platform: PlatformArg,
        email: String,
    },

    /// Reserva uma conta, executa o comando e libera a conta ao final.
    Run {
        #[command(flatten)]
        args: ReserveArgs,

        /// Comando a executar, após `--`.
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

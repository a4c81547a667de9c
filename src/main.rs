mod cli;
mod ui;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, ReserveArgs};
use tokio::process::Child;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use ui::{PoolProgress, SpinnerSlot};
use userpool::{AppError, Platform, PoolApi, PoolConfig, PoolHttpClient, UserPool, UserSession};

/// 128 + SIGINT, what a shell reports for a command stopped with Ctrl-C.
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let spinner = SpinnerSlot::default();
    init_tracing(cli.verbose, spinner.clone());

    let config = PoolConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.validate()?;
    let client = PoolHttpClient::from_config(&config).map_err(AppError::from)?;
    let pool = UserPool::new(client, config.retry_policy());

    let code = match cli.command {
        Command::Reserve { args, auth_info } => reserve(&pool, &spinner, &args, auth_info).await?,
        Command::Release { platform, email } => release(&pool, platform.into(), &email).await?,
        Command::Run { args, command } => run(&pool, &spinner, &args, &command).await?,
    };
    Ok(code)
}

fn init_tracing(verbose: bool, spinner: SpinnerSlot) {
    let default_filter = if verbose { "userpool=debug" } else { "userpool=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(spinner)
        .with_target(false)
        .init();
}

async fn reserve(
    pool: &UserPool<PoolHttpClient>,
    spinner: &SpinnerSlot,
    args: &ReserveArgs,
    auth_info: bool,
) -> Result<ExitCode, AppError> {
    let request = args.to_request();
    let progress = PoolProgress::start(&request, spinner);
    let mut session = UserSession::new();

    let identity = match pool.reserve(&mut session, &request).await {
        Ok(identity) => identity,
        Err(err) => {
            progress.failed(&err);
            return Err(err.into());
        }
    };
    progress.reserved(identity);

    // The lease stays held on purpose; `userpool release` returns it.
    let json = if auth_info {
        serde_json::to_string_pretty(&identity.user_auth())?
    } else {
        serde_json::to_string_pretty(identity)?
    };
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

async fn release(
    pool: &UserPool<PoolHttpClient>,
    platform: Platform,
    email: &str,
) -> Result<ExitCode, AppError> {
    pool.api().release(platform, email).await?;
    eprintln!("Released {platform} user {email}");
    Ok(ExitCode::SUCCESS)
}

/// Hold a user for the lifetime of `command`, exposing it through the environment.
async fn run(
    pool: &UserPool<PoolHttpClient>,
    spinner: &SpinnerSlot,
    args: &ReserveArgs,
    command: &[String],
) -> Result<ExitCode, AppError> {
    let Some((program, program_args)) = command.split_first() else {
        return Err(AppError::Config("no command given to run".to_string()));
    };

    let request = args.to_request();
    let progress = PoolProgress::start(&request, spinner);
    let mut session = UserSession::new();

    let identity = match pool.reserve(&mut session, &request).await {
        Ok(identity) => identity,
        Err(err) => {
            progress.failed(&err);
            return Err(err.into());
        }
    };
    progress.reserved(identity);

    let outcome = match serde_json::to_string(identity) {
        Ok(identity_json) => {
            let child = tokio::process::Command::new(program)
                .args(program_args)
                .env("USER_POOL_EMAIL", &identity.email)
                .env("USER_POOL_PLATFORM", identity.platform.as_str())
                .env("USER_POOL_IDENTITY", identity_json)
                .kill_on_drop(true)
                .spawn();
            match child {
                Ok(child) => wait_or_interrupt(child).await,
                Err(err) => Err(AppError::from(err)),
            }
        }
        Err(err) => Err(AppError::from(err)),
    };

    // Release on every path: failed spawn, Ctrl-C or normal exit.
    if let Some(record) = pool.release(&mut session).await {
        progress.print_lease(&record);
    }

    outcome.map(ExitCode::from)
}

/// Wait for the child, or kill it when the user hits Ctrl-C.
async fn wait_or_interrupt(mut child: Child) -> Result<u8, AppError> {
    tokio::select! {
        status = child.wait() => Ok(child_exit_code(status?.code())),
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping command and releasing user");
            if let Err(err) = child.kill().await {
                warn!(error = %err, "failed to kill command");
            }
            Ok(INTERRUPTED_EXIT_CODE)
        }
    }
}

/// Forward the child's exit code; signals and out-of-range codes become 1.
fn child_exit_code(code: Option<i32>) -> u8 {
    code.and_then(|code| u8::try_from(code).ok()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_exit_code_is_forwarded() {
        assert_eq!(child_exit_code(Some(0)), 0);
        assert_eq!(child_exit_code(Some(3)), 3);
    }

    #[test]
    fn killed_or_out_of_range_child_is_failure() {
        assert_eq!(child_exit_code(None), 1);
        assert_eq!(child_exit_code(Some(-1)), 1);
        assert_eq!(child_exit_code(Some(300)), 1);
    }

    #[tokio::test]
    async fn finished_child_wins_over_ctrl_c() {
        let child = tokio::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        assert_eq!(wait_or_interrupt(child).await.unwrap(), 7);
    }
}

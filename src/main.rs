#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use mission_client::api::{ApiRequest, MultipartPayload};
use mission_client::config::Config;
use mission_client::domain::auth::{LoginForm, SignupForm};
use mission_client::services::{RetryPolicy, SessionBootstrapper};
use mission_client::{Client, telemetry};
use reqwest::Method;
use serde_json::{Value, json};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[derive(Debug, Parser)]
#[command(version, about = "Session and request client for the mission platform API")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MISSION_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MISSION_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        password_confirm: Option<String>,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// volunteer, organization or admin
        #[arg(long, default_value = "volunteer")]
        user_type: String,
        #[arg(long)]
        organization_name: Option<String>,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the signed-in user
    Whoami {
        /// Fetch the profile from the backend instead of the store
        #[arg(long)]
        refresh: bool,
    },
    /// Resolve the stored session to a landing route
    Bootstrap,
    /// Exchange the refresh token for a new access token
    Refresh,
    /// Send an authenticated request and print the JSON response
    Request {
        #[arg(value_parser = parse_method)]
        method: Method,
        path: String,
        /// JSON request body
        #[arg(long, conflicts_with_all = ["field", "file"])]
        data: Option<String>,
        /// Query parameter as KEY=VALUE
        #[arg(long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Multipart text field as NAME=VALUE
        #[arg(long, value_parser = parse_pair)]
        field: Vec<(String, String)>,
        /// Multipart file as NAME=PATH
        #[arg(long, value_parser = parse_pair)]
        file: Vec<(String, String)>,
        /// Retry rate-limited, server, network and timeout failures
        #[arg(long)]
        retry: bool,
    },
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(|e| e.to_string())
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))
}

#[allow(clippy::print_stdout)]
fn emit(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry_guard = telemetry::init_telemetry(&cli.config.telemetry)?;

    let span = tracing::info_span!("command");
    let result = run(cli).instrument(span).await;

    telemetry_guard.shutdown();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli { config, command } = cli;
    let store = mission_client::open_store(&config.store).await?;
    let connect = || Client::new(&config, store.clone());

    match command {
        Command::Bootstrap => {
            // Resolving the stored session makes no request, so it needs no backend URL.
            let outcome = SessionBootstrapper::new(store.clone()).resolve().await;
            emit(&serde_json::to_value(outcome)?)
        }
        Command::Login { email, password } => {
            let session = connect()?.auth.login(&LoginForm::new(email, password)).await?;
            emit(&json!({ "user": session.user, "role": session.user.role() }))
        }
        Command::Signup { email, password, password_confirm, first_name, last_name, user_type, organization_name } => {
            let form = SignupForm {
                email,
                password,
                password_confirm,
                first_name,
                last_name,
                user_type,
                organization_name,
            };
            let session = connect()?.auth.signup(&form).await?;
            emit(&json!({ "user": session.user, "role": session.user.role() }))
        }
        Command::Logout => {
            connect()?.auth.logout().await?;
            emit(&json!({ "signed_out": true }))
        }
        Command::Whoami { refresh } => {
            let user = if refresh {
                connect()?.auth.refresh_profile().await?
            } else {
                store.get().await?.context("Not signed in")?.user
            };
            emit(&json!({ "user": user, "role": user.role() }))
        }
        Command::Refresh => {
            connect()?.auth.refresh_tokens().await?;
            emit(&json!({ "refreshed": true }))
        }
        Command::Request { method, path, data, query, field, file, retry } => {
            let mut request = ApiRequest::new(method, path);
            for (key, value) in query {
                request = request.query(key, value);
            }
            if let Some(data) = data {
                request = request.json(serde_json::from_str(&data).context("--data is not valid JSON")?);
            } else if !field.is_empty() || !file.is_empty() {
                request = request.multipart(multipart(field, file).await?);
            }

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let client = connect()?;
            let requests = client.requests();
            let (request, cancel) = (&request, &cancel);
            let policy = if retry { RetryPolicy::new(&config.retry) } else { RetryPolicy::once() };
            let body = policy.run_cancellable(cancel, move || requests.execute_with_cancel(request.clone(), cancel)).await?;
            emit(&body.unwrap_or(Value::Null))
        }
    }
}

async fn multipart(fields: Vec<(String, String)>, files: Vec<(String, String)>) -> anyhow::Result<MultipartPayload> {
    let mut payload = MultipartPayload::new();
    for (name, value) in fields {
        payload = payload.text(name, value);
    }
    for (name, path) in files {
        let path = PathBuf::from(path);
        let bytes = tokio::fs::read(&path).await.with_context(|| format!("Could not read {}", path.display()))?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        payload = payload.file(name, bytes, file_name, None);
    }
    Ok(payload)
}

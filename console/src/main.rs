use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use greenhouse_console::{CommandInvoker, MethodCall, TokenManager};
use greenhouse_shared::descriptor::{self, SHARED_ACCESS_KEY_NAME};
use greenhouse_shared::{timing, HubCredentials};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Invoke direct methods on greenhouse devices
#[derive(Parser, Debug)]
#[command(name = "console", version, about)]
struct Cli {
    /// File with hub access policies, one connection string per line
    #[arg(long, default_value = "iot-hub-connection-strings")]
    credentials: PathBuf,

    /// Access policy to sign with; the first one in the file by default
    #[arg(long)]
    policy: Option<String>,

    /// Base URL of the hub's HTTP endpoint
    #[arg(long, default_value = "http://127.0.0.1:8081")]
    endpoint: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call a direct method and print the hub's answer
    Invoke {
        device: String,
        method: String,
        /// Method argument as key=value; the value is read as JSON when possible
        #[arg(long = "arg", value_parser = parse_argument)]
        args: Vec<(String, Value)>,
        /// Seconds the device may take to respond
        #[arg(long, default_value_t = timing::METHOD_RESPONSE_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Print a freshly signed access token
    Token,
}

fn parse_argument(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty argument name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn load_policy(cli: &Cli) -> anyhow::Result<HubCredentials> {
    let entries = descriptor::read_descriptor_file(&cli.credentials, SHARED_ACCESS_KEY_NAME)?;
    let (name, descriptor) = match &cli.policy {
        Some(wanted) => entries
            .into_iter()
            .find(|(name, _)| name == wanted)
            .ok_or_else(|| anyhow!("policy {wanted} not found in {}", cli.credentials.display()))?,
        None => entries
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no access policy in {}", cli.credentials.display()))?,
    };
    HubCredentials::from_descriptor(&descriptor).with_context(|| format!("access policy {name}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let cli = Cli::parse();
    let mut tokens = TokenManager::from_credentials(load_policy(&cli)?);

    match cli.command {
        Command::Token => {
            println!("{}", tokens.current_token()?.value);
        }
        Command::Invoke {
            device,
            method,
            args,
            timeout,
        } => {
            let call = args
                .into_iter()
                .fold(MethodCall::new(method), |call, (key, value)| call.arg(key, value))
                .response_timeout(Duration::from_secs(timeout));

            let invoker = CommandInvoker::with_tokens(tokens);
            let answer = invoker.invoke_device(&cli.endpoint, &device, &call).await?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
    }
    Ok(())
}

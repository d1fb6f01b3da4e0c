//! idport command line
//!
//! Drives the SDK end to end from a terminal:
//! 1. Loads TOML configuration (secret from env or file)
//! 2. Wires the reqwest transport, the file credential store, and the
//!    orchestrator
//! 3. Runs one command: interactive login, client token, status, an
//!    authenticated GET, or logout
//!
//! The interactive step uses a stdin/stdout user agent: the authorization
//! URL is printed, the user completes it in a browser and pastes the
//! `{scheme}://...` callback URL back.

mod config;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use idport_auth::{FileCredentialStore, SecureStore};
use idport_client::{AuthorizationFlow, BrowserResult, RequestOrchestrator, UserAgent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{HttpTransport, Transport};

use crate::config::Config;

/// User agent that hands the URL to a human via the terminal.
struct StdioUserAgent;

impl UserAgent for StdioUserAgent {
    fn present(&self, url: &str) -> Pin<Box<dyn Future<Output = BrowserResult> + Send + '_>> {
        let url = url.to_owned();
        Box::pin(async move {
            println!("Open this URL in your browser:\n\n  {url}\n");
            println!("Paste the callback URL here (empty line to cancel):");
            let mut line = String::new();
            let mut reader = BufReader::new(tokio::io::stdin());
            match reader.read_line(&mut line).await {
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        BrowserResult::Cancelled
                    } else {
                        BrowserResult::Redirect(trimmed.to_owned())
                    }
                }
                Err(_) => BrowserResult::Cancelled,
            }
        })
    }
}

fn usage() -> ! {
    eprintln!(
        "usage: idport [--config <path>] <command>\n\n\
         commands:\n\
         \x20 login         interactive browser-redirect authorization\n\
         \x20 register      interactive account registration\n\
         \x20 client-token  obtain an app-level credential (no user)\n\
         \x20 status        show the current credential state\n\
         \x20 get <path>    authenticated GET against /api/{{version}}/<path>\n\
         \x20 logout        provider logout, then clear local state\n\
         \x20 soft-logout   clear local state only"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // CLI: --config flag plus one command and an optional argument
    let args: Vec<String> = std::env::args().collect();
    let mut cli_config_path: Option<&str> = None;
    let mut command: Option<&str> = None;
    let mut command_arg: Option<&str> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                cli_config_path = args.get(i + 1).map(|s| s.as_str());
                i += 2;
            }
            value if command.is_none() => {
                command = Some(value);
                i += 1;
            }
            value => {
                command_arg = Some(value);
                i += 1;
            }
        }
    }
    let Some(command) = command else { usage() };

    let config_path = Config::resolve_path(cli_config_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let client_config = config.to_client_config()?;

    info!(
        server_url = %client_config.server_url,
        client_id = %client_config.client_id,
        "configuration loaded"
    );

    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(Duration::from_secs(config.client.timeout_secs))
            .context("building http transport")?,
    );
    let store: Arc<dyn SecureStore> = Arc::new(FileCredentialStore::new(
        config.client.credential_path.clone(),
    ));
    let orchestrator = RequestOrchestrator::new(client_config, transport, store).await;
    let flow = AuthorizationFlow::new(orchestrator.clone(), Arc::new(StdioUserAgent));

    match command {
        "login" => {
            let credential = flow.start_authorization().await?;
            match credential.subject_id {
                Some(subject) => println!("logged in as {subject}"),
                None => println!("logged in"),
            }
        }
        "register" => {
            let credential = flow.start_registration().await?;
            match credential.subject_id {
                Some(subject) => println!("registered and logged in as {subject}"),
                None => println!("registered and logged in"),
            }
        }
        "client-token" => {
            orchestrator.acquire_client_credential().await?;
            println!("client credential acquired");
        }
        "status" => {
            if orchestrator.is_authorized().await {
                match orchestrator.current_subject().await {
                    Some(subject) => println!("authorized as {subject}"),
                    None => println!("authorized (client credential)"),
                }
                match orchestrator.token_expires_at().await {
                    Some(at) if orchestrator.has_token_expired().await => {
                        println!("credential expired at {at} (unix ms); will renew on next call")
                    }
                    Some(at) => println!("credential expires at {at} (unix ms)"),
                    None => println!("credential has no recorded expiry"),
                }
            } else {
                println!("not authorized");
            }
        }
        "get" => {
            let Some(path) = command_arg else {
                bail!("get requires a path, e.g.: idport get me");
            };
            let response = orchestrator.get(path).await?;
            println!("{} {}", response.status, response.body);
        }
        "logout" => {
            flow.logout().await?;
            println!("logged out");
        }
        "soft-logout" => {
            flow.soft_logout().await;
            println!("local credential cleared");
        }
        _ => usage(),
    }

    Ok(())
}

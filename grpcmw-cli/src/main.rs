use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grpcmw_core::{
    stream_handler_fn, unary_handler_fn, CallDirection, ChannelStream, Message, MessageStream,
    Router, Status, StreamCall, UnaryCall,
};
use grpcmw_interceptors::Middleware;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grpcmw")]
#[command(about = "Inspect and exercise scoped RPC interceptor configurations")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a configuration and print the resulting route trees
    Check {
        /// Configuration file (.toml, .yaml, .yml or .json)
        config: PathBuf,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Send a call through the client and server routers to an echo handler
    Simulate {
        /// Configuration file (.toml, .yaml, .yml or .json)
        config: PathBuf,

        /// Full method name, e.g. /acme.Accounts/Get
        #[arg(short, long)]
        method: String,

        /// Simulate a streaming call instead of a unary one
        #[arg(long)]
        stream: bool,

        /// Messages to send on a streaming call
        #[arg(long, default_value_t = 3)]
        messages: usize,

        /// Outgoing metadata entry (key=value), may be repeated
        #[arg(short = 'H', long = "metadata", value_parser = parse_metadata)]
        metadata: Vec<(String, String)>,

        /// JSON request payload
        #[arg(short, long, default_value = "{}", value_parser = parse_payload)]
        payload: Message,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config, verbose } => {
            init_tracing(verbose);
            run_check(config)
        }
        Commands::Simulate {
            config,
            method,
            stream,
            messages,
            metadata,
            payload,
            verbose,
        } => {
            init_tracing(verbose);
            let middleware = load(&config)?;
            if stream {
                simulate_stream(&middleware, method, metadata, payload, messages).await
            } else {
                simulate_unary(&middleware, method, metadata, payload).await
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_metadata(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

fn parse_payload(raw: &str) -> Result<Message, serde_json::Error> {
    serde_json::from_str(raw)
}

fn load(config: &Path) -> Result<Middleware> {
    Middleware::from_file(config)
        .with_context(|| format!("Failed to load configuration from {}", config.display()))
}

fn run_check(config: PathBuf) -> Result<()> {
    let middleware = load(&config)?;

    println!("Configuration {} is valid", config.display());
    println!();
    println!("Bundles: {}", display_list(&middleware.registry.tags()));
    println!();
    println!("Server routes:");
    print!("{}", middleware.server.describe());
    println!();
    println!("Client routes:");
    print!("{}", middleware.client.describe());
    Ok(())
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

/// Terminal of the client router: hands the call to the server router.
fn unary_transport(server: Router) -> std::sync::Arc<dyn grpcmw_core::UnaryHandler> {
    unary_handler_fn(move |call: UnaryCall| {
        let server = server.clone();
        async move {
            let echo = unary_handler_fn(|call: UnaryCall| async move {
                Ok::<_, Status>(serde_json::json!({
                    "method": call.info.method,
                    "metadata": call.metadata,
                    "request": call.request,
                }))
            });
            server
                .handle_unary(call.with_direction(CallDirection::Server), echo)
                .await
        }
    })
}

fn stream_transport(server: Router) -> std::sync::Arc<dyn grpcmw_core::StreamHandler> {
    stream_handler_fn(move |call: StreamCall| {
        let server = server.clone();
        async move {
            let echo = stream_handler_fn(|mut call: StreamCall| async move {
                while let Some(message) = call.stream.recv().await? {
                    call.stream.send(message).await?;
                }
                Ok::<_, Status>(())
            });
            server
                .handle_stream(call.with_direction(CallDirection::Server), echo)
                .await
        }
    })
}

async fn simulate_unary(
    middleware: &Middleware,
    method: String,
    metadata: Vec<(String, String)>,
    payload: Message,
) -> Result<()> {
    let mut call = UnaryCall::new(method, payload).with_direction(CallDirection::Client);
    for (key, value) in metadata {
        call.metadata.insert(key, value);
    }

    let transport = unary_transport(middleware.server.clone());
    match middleware.client.handle_unary(call, transport).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(status) => anyhow::bail!("Call failed: {}", status),
    }
}

async fn simulate_stream(
    middleware: &Middleware,
    method: String,
    metadata: Vec<(String, String)>,
    payload: Message,
    messages: usize,
) -> Result<()> {
    let (call_end, driver_end) = ChannelStream::pair(messages.max(1));
    let (mut inbound, outbound) = driver_end.into_parts();

    for _ in 0..messages {
        outbound
            .send(payload.clone())
            .await
            .context("Stream closed before all messages were sent")?;
    }
    drop(outbound);

    let mut call = StreamCall::new(method, call_end).with_direction(CallDirection::Client);
    for (key, value) in metadata {
        call.metadata.insert(key, value);
    }

    let transport = stream_transport(middleware.server.clone());
    if let Err(status) = middleware.client.handle_stream(call, transport).await {
        anyhow::bail!("Stream failed: {}", status);
    }

    let mut received = 0;
    while let Some(message) = inbound.recv().await {
        received += 1;
        println!("{}", serde_json::to_string(&message)?);
    }
    tracing::info!(sent = messages, received, "Stream finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        assert_eq!(
            parse_metadata("authorization=Bearer a=b").unwrap(),
            ("authorization".to_string(), "Bearer a=b".to_string())
        );
        assert!(parse_metadata("novalue").is_err());
        assert!(parse_metadata("=value").is_err());
    }

    #[test]
    fn test_cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "grpcmw",
            "simulate",
            "middleware.toml",
            "--method",
            "/acme.Accounts/Get",
            "-H",
            "tenant=acme",
            "--payload",
            r#"{"id": 7}"#,
        ])
        .unwrap();

        match cli.command {
            Commands::Simulate {
                method,
                metadata,
                payload,
                stream,
                ..
            } => {
                assert_eq!(method, "/acme.Accounts/Get");
                assert_eq!(metadata, vec![("tenant".to_string(), "acme".to_string())]);
                assert_eq!(payload, serde_json::json!({"id": 7}));
                assert!(!stream);
            }
            Commands::Check { .. } => panic!("expected simulate"),
        }
    }
}

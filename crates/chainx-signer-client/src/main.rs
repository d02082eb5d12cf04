//! `chainx-signer`: talk to a locally running ChainX signer from the shell.
//!
//! Links to the signer, pairs if needed (the signer shows an approval prompt
//! the first time), runs one command and prints the result as JSON.
//!
//! # Usage
//!
//! ```text
//! chainx-signer [OPTIONS] <COMMAND>
//!
//! Commands:
//!   account            Print the signer's current account
//!   node               Print the node the signer is connected to
//!   settings           Print the signer's settings
//!   sign               Sign an extrinsic and print the signature
//!   sign-send          Sign and submit an extrinsic, following its status
//!   chainx2-sign       Sign a ChainX 2.0 payload
//!   chainx2-sign-send  Sign and submit a ChainX 2.0 payload
//!   watch              Print account, node and network changes until Ctrl+C
//!   pair               Request pairing and report the answer
//!
//! Options:
//!   --host <HOST>          Host the signer listens on [default: 127.0.0.1]
//!   --port <PORT>          Port to probe; repeat for several [default: 10013, 10014, 10015]
//!   --plugin <NAME>        Name presented to the signer [default: chainx-signer-link]
//!   --hostname <HOST>      Hostname used to derive the origin
//!   --key-file <PATH>      Where the paired appkey is stored
//!   --no-reconnect         Do not re-link when the signer drops the connection
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                   | Description                       |
//! |----------------------------|-----------------------------------|
//! | `CHAINX_SIGNER_HOST`       | Host the signer listens on        |
//! | `CHAINX_SIGNER_PORTS`      | Comma-separated ports to probe    |
//! | `CHAINX_SIGNER_PLUGIN`     | Plugin name                       |
//! | `CHAINX_SIGNER_HOSTNAME`   | Hostname for the origin           |
//! | `CHAINX_SIGNER_KEY_FILE`   | Key file path                     |
//! | `CHAINX_SIGNER_RECONNECT_MS` | Reconnect delay in milliseconds |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chainx_signer_client::domain::config::DEFAULT_PORTS;
use chainx_signer_client::infrastructure::production_ports;
use chainx_signer_client::{ClientConfig, LinkOutcome, SignerClient, TxStatusCallback};
use chainx_signer_core::protocol::messages::FINALIZED_STATUS;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Command-line client for a locally running ChainX signer.
#[derive(Debug, Parser)]
#[command(name = "chainx-signer", about = "Talk to a locally running ChainX signer", version)]
struct Cli {
    /// Host the signer listens on.
    #[arg(long, default_value = "127.0.0.1", env = "CHAINX_SIGNER_HOST")]
    host: String,

    /// Port to probe.  Repeat the flag to probe several ports in order.
    #[arg(long = "port", env = "CHAINX_SIGNER_PORTS", value_delimiter = ',')]
    ports: Vec<u16>,

    /// Name this application presents to the signer.
    #[arg(long, default_value = "chainx-signer-link", env = "CHAINX_SIGNER_PLUGIN")]
    plugin: String,

    /// Hostname used to derive the origin shown in the signer.
    #[arg(long, env = "CHAINX_SIGNER_HOSTNAME")]
    hostname: Option<String>,

    /// Where the paired appkey is stored.
    #[arg(long, env = "CHAINX_SIGNER_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Do not re-link automatically when the signer drops the connection.
    #[arg(long)]
    no_reconnect: bool,

    /// Delay between reconnect attempts, in milliseconds.
    #[arg(long, default_value_t = 1000, env = "CHAINX_SIGNER_RECONNECT_MS")]
    reconnect_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Command {
    /// Print the signer's current account.
    Account,
    /// Print the node the signer is connected to.
    Node,
    /// Print the signer's settings.
    Settings,
    /// Sign an extrinsic and print the signature.
    Sign(SignArgs),
    /// Sign and submit an extrinsic, printing status updates until it is final.
    SignSend(SignArgs),
    /// Sign a ChainX 2.0 payload.
    Chainx2Sign(SignArgs),
    /// Sign and submit a ChainX 2.0 payload.
    Chainx2SignSend(SignArgs),
    /// Print account, node and network changes until Ctrl+C.
    Watch,
    /// Request pairing and report the answer.
    Pair,
}

#[derive(Debug, Args, PartialEq)]
struct SignArgs {
    /// Signing account address.
    #[arg(long)]
    address: String,
    /// Payload: hex for ChainX 1.0; for ChainX 2.0 either JSON or a plain string.
    #[arg(long)]
    data: String,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`ClientConfig`].
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            plugin: self.plugin.clone(),
            hostname: self.hostname.clone(),
            host: self.host.clone(),
            ports: if self.ports.is_empty() {
                DEFAULT_PORTS.to_vec()
            } else {
                self.ports.clone()
            },
            reconnect_delay: Duration::from_millis(self.reconnect_ms),
            auto_reconnect: !self.no_reconnect,
            key_file: self.key_file.clone(),
            ..ClientConfig::default()
        }
    }
}

/// ChainX 2.0 payloads are structured; accept JSON and fall back to a string.
fn chainx2_payload(data: &str) -> Value {
    serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` controls verbosity; `info` when it is absent or invalid.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();
    let ports = production_ports(&config).context("could not open the appkey store")?;
    let client = SignerClient::new(&config, ports);

    match client.link().await.context("could not reach a ChainX signer")? {
        LinkOutcome::Connected { paired } => info!("linked to signer (paired: {paired})"),
        LinkOutcome::NotConnected => bail!("a signer was found but the connection could not be opened"),
    }

    let result = run(&client, cli.command).await;
    client.disconnect();
    result
}

async fn run(client: &SignerClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Account => print_json(&client.get_current_account().await?),
        Command::Node => print_json(&client.get_current_node().await?),
        Command::Settings => print_json(&client.get_settings().await?),
        Command::Sign(args) => print_json(&client.sign_extrinsic(&args.address, &args.data).await?),
        Command::Chainx2Sign(args) => {
            print_json(&client.sign_chainx2_extrinsic(&args.address, chainx2_payload(&args.data)).await?)
        }
        Command::SignSend(args) => {
            let (callback, statuses) = status_channel();
            let hash = client
                .sign_and_send_extrinsic(&args.address, &args.data, Some(callback))
                .await?;
            print_json(&hash)?;
            follow_statuses(statuses).await
        }
        Command::Chainx2SignSend(args) => {
            let (callback, statuses) = status_channel();
            let hash = client
                .sign_and_send_chainx2_extrinsic(&args.address, chainx2_payload(&args.data), Some(callback))
                .await?;
            print_json(&hash)?;
            follow_statuses(statuses).await
        }
        Command::Watch => watch(client).await,
        Command::Pair => {
            let accepted = client.pair(false).await?;
            println!("{}", if accepted { "paired" } else { "pairing declined" });
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

type StatusUpdate = (Option<Value>, Option<Value>);

fn status_channel() -> (TxStatusCallback, mpsc::UnboundedReceiver<StatusUpdate>) {
    let (tx, rx) = mpsc::unbounded_channel::<StatusUpdate>();
    let callback: TxStatusCallback = Arc::new(move |err: Option<Value>, status: Option<Value>| {
        let _ = tx.send((err, status));
    });
    (callback, rx)
}

/// Prints transaction status updates until the transaction fails or is final.
///
/// The channel closes when the client drops the status watcher, which it does
/// once the connection to the signer is lost.
async fn follow_statuses(mut statuses: mpsc::UnboundedReceiver<StatusUpdate>) -> anyhow::Result<()> {
    while let Some((err, status)) = statuses.recv().await {
        if let Some(err) = err {
            bail!("transaction failed: {err}");
        }
        let status = status.unwrap_or(Value::Null);
        println!("status: {status}");
        if status.get("status").and_then(Value::as_str) == Some(FINALIZED_STATUS) {
            return Ok(());
        }
    }
    bail!("connection to the signer was lost before the transaction was final")
}

async fn watch(client: &SignerClient) -> anyhow::Result<()> {
    client.listen_account_change(|payload| println!("account changed: {payload}"));
    client.listen_node_change(|payload| println!("node changed: {payload}"));
    client.listen_network_change(|payload| println!("network changed: {payload}"));
    info!("watching signer events; press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C, shutting down");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_defaults_produce_default_config() {
        // Arrange
        let cli = Cli::parse_from(["chainx-signer", "account"]);

        // Act
        let config = cli.client_config();

        // Assert
        assert_eq!(config, ClientConfig::default());
        assert_eq!(cli.command, Command::Account);
    }

    #[test]
    fn test_cli_repeated_port_flag_keeps_order() {
        let cli = Cli::parse_from(["chainx-signer", "--port", "9002", "--port", "9001", "node"]);
        assert_eq!(cli.client_config().ports, vec![9002, 9001]);
    }

    #[test]
    fn test_cli_no_reconnect_disables_auto_reconnect() {
        let cli = Cli::parse_from(["chainx-signer", "--no-reconnect", "settings"]);
        assert!(!cli.client_config().auto_reconnect);
    }

    #[test]
    fn test_cli_reconnect_delay_override() {
        let cli = Cli::parse_from(["chainx-signer", "--reconnect-ms", "250", "pair"]);
        assert_eq!(cli.client_config().reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_cli_identity_overrides() {
        let cli = Cli::parse_from([
            "chainx-signer",
            "--plugin",
            "my-wallet",
            "--hostname",
            "www.dapp.io",
            "--key-file",
            "/tmp/key.toml",
            "watch",
        ]);
        let config = cli.client_config();
        assert_eq!(config.plugin, "my-wallet");
        assert_eq!(config.hostname.as_deref(), Some("www.dapp.io"));
        assert_eq!(config.key_file, Some(PathBuf::from("/tmp/key.toml")));
    }

    #[test]
    fn test_cli_sign_send_arguments() {
        let cli = Cli::parse_from(["chainx-signer", "sign-send", "--address", "5F", "--data", "0x00"]);
        assert_eq!(
            cli.command,
            Command::SignSend(SignArgs {
                address: "5F".to_string(),
                data: "0x00".to_string()
            })
        );
    }

    #[test]
    fn test_cli_sign_requires_address() {
        assert!(Cli::try_parse_from(["chainx-signer", "sign", "--data", "0x00"]).is_err());
    }

    #[test]
    fn test_cli_requires_a_command() {
        assert!(Cli::try_parse_from(["chainx-signer"]).is_err());
    }

    #[test]
    fn test_chainx2_payload_accepts_json_or_string() {
        assert_eq!(chainx2_payload(r#"{"method":"transfer"}"#), json!({"method": "transfer"}));
        assert_eq!(chainx2_payload("0xdeadbeef"), json!("0xdeadbeef"));
    }

    #[tokio::test]
    async fn test_follow_statuses_stops_at_finalized() {
        // Arrange
        let (callback, rx) = status_channel();
        callback(None, Some(json!({"status": "InBlock"})));
        callback(None, Some(json!({"status": FINALIZED_STATUS})));
        callback(None, Some(json!({"status": "never read"})));

        // Act / Assert
        assert!(follow_statuses(rx).await.is_ok());
    }

    #[tokio::test]
    async fn test_follow_statuses_reports_failure() {
        let (callback, rx) = status_channel();
        callback(Some(json!("dispatch error")), None);
        assert!(follow_statuses(rx).await.is_err());
    }

    #[tokio::test]
    async fn test_follow_statuses_fails_when_watcher_is_dropped() {
        // Arrange: one update, then the client drops the watcher.
        let (callback, rx) = status_channel();
        callback(None, Some(json!({"status": "Ready"})));
        drop(callback);

        // Act
        let result = follow_statuses(rx).await;

        // Assert
        let message = result.unwrap_err().to_string();
        assert!(message.contains("lost before the transaction was final"));
    }
}

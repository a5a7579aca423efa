//! rmaker-prov: provisioning and local-control command-line tool.
//!
//! Talks to a device over HTTP (soft access point or home network), a
//! serial console, or BLE (when built with `--features ble`), negotiates a
//! secure session and then runs one command.
//!
//! # Usage
//!
//! ```text
//! rmaker-prov [TARGET] [SECURITY] <COMMAND>
//!
//! Target (default: soft AP at 192.168.4.1:80):
//!   --host <HOST> [--port <PORT>]   HTTP device
//!   --node <NODE_ID>                on-network node, <node>.local:8080
//!   --ble <NAME>                    BLE device (e.g. PROV_d76c30)
//!   --serial <PATH>                 serial console
//!
//! Security:
//!   --sec-ver <0|1|2>   force a scheme instead of probing
//!   --pop <POP>         proof of possession (sec1)
//!   --username, --password            (sec2)
//!
//! Commands:
//!   provision   join Wi-Fi and bind the node to the user
//!   scan        list networks the device can see
//!   get-params  read node params (chunked; --signed for a signed report)
//!   get-config  read node config
//!   set-params  write a JSON params update
//!   props       list local-control properties
//!   set-prop    write one local-control property
//!   chal-resp   prove node identity to the cloud
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable            | Flag           |
//! |---------------------|----------------|
//! | `RMAKER_HOST`       | `--host`       |
//! | `RMAKER_NODE`       | `--node`       |
//! | `RMAKER_POP`        | `--pop`        |
//! | `RMAKER_USERNAME`   | `--username`   |
//! | `RMAKER_PASSWORD`   | `--password`   |
//! | `RMAKER_SSID`       | `--ssid`       |
//! | `RMAKER_PASSPHRASE` | `--passphrase` |
//! | `RMAKER_ID_TOKEN`   | `--id-token`   |
//!
//! Anything not given on the command line comes from `config.toml` (see
//! `infrastructure::storage::config`).

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rmaker_core::domain::capabilities::SecurityCredentials;
use rmaker_core::domain::wifi::WifiAccessPoint;
use rmaker_core::security::SchemeVersion;
use rmaker_core::{DeviceInfo, SessionKind};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rmaker_prov::application::challenge::{ChallengeResponseCoordinator, CloudAuthority};
use rmaker_prov::application::chunked::{get_json, get_signed, DataKind};
use rmaker_prov::application::local_ctrl::{list_properties, set_params, set_property_by_name};
use rmaker_prov::application::orchestrator::{
    NetworkSelector, ProvisionRequest, ProvisioningOrchestrator,
};
use rmaker_prov::application::session::{open_session, SecureSession};
use rmaker_prov::application::transport::Transport;
use rmaker_prov::application::wifi::{scan, ScanOptions, StatusPoller, WifiCredentials};
use rmaker_prov::infrastructure::cloud::CloudClient;
use rmaker_prov::infrastructure::storage::config::{load_config, load_config_from, ProvConfig};
use rmaker_prov::infrastructure::transport::connect;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Provision devices onto Wi-Fi and control them on the local network.
#[derive(Debug, Parser)]
#[command(name = "rmaker-prov", version, about)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "RMAKER_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP host of the device.
    #[arg(long, global = true, env = "RMAKER_HOST", conflicts_with_all = ["node", "ble", "serial"])]
    host: Option<String>,

    /// HTTP port (80 for --host, 8080 for --node).
    #[arg(long, global = true, env = "RMAKER_PORT")]
    port: Option<u16>,

    /// Node id (or `<node>.local`) of an on-network device.
    #[arg(long, global = true, env = "RMAKER_NODE", conflicts_with_all = ["ble", "serial"])]
    node: Option<String>,

    /// Advertised BLE name of the device.
    #[arg(long, global = true, conflicts_with = "serial")]
    ble: Option<String>,

    /// Serial console device path.
    #[arg(long, global = true)]
    serial: Option<String>,

    /// Security scheme: 0 (none), 1 (PoP) or 2 (username/password).
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(0..=2))]
    sec_ver: Option<u32>,

    /// Proof of possession.
    #[arg(long, global = true, env = "RMAKER_POP", default_value = "", hide_env_values = true)]
    pop: String,

    #[arg(long, global = true, env = "RMAKER_USERNAME", default_value = "")]
    username: String,

    #[arg(long, global = true, env = "RMAKER_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Cloud id token (overrides the config file).
    #[arg(long, global = true, env = "RMAKER_ID_TOKEN", hide_env_values = true)]
    id_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send Wi-Fi credentials and bind the node to the user.
    Provision {
        /// Network to join; omitted means scan and choose interactively.
        #[arg(long, env = "RMAKER_SSID")]
        ssid: Option<String>,
        #[arg(long, env = "RMAKER_PASSPHRASE", default_value = "", hide_env_values = true)]
        passphrase: String,
        /// Prove identity only; leave Wi-Fi untouched.
        #[arg(long, conflicts_with = "ssid")]
        no_wifi: bool,
        /// Extra attempts after a failed connection.
        #[arg(long)]
        retries: Option<u32>,
        /// User id for the legacy binding (overrides the config file).
        #[arg(long)]
        user_id: Option<String>,
        /// Give up polling after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// List networks the device can see.
    Scan,
    /// Read node params.
    GetParams(ReadArgs),
    /// Read node config.
    GetConfig(ReadArgs),
    /// Write a JSON params update, e.g. '{"Light":{"Power":true}}'.
    SetParams { json: String },
    /// List local-control properties.
    Props,
    /// Write one local-control property.
    SetProp { name: String, value: String },
    /// Prove the node's identity to the cloud.
    ChalResp {
        /// Leave challenge-response enabled on the device afterwards.
        #[arg(long)]
        keep_enabled: bool,
    },
}

#[derive(Debug, clap::Args)]
struct ReadArgs {
    /// Timestamp to send with the first request (defaults to now).
    #[arg(long)]
    timestamp: Option<u64>,
    /// Have the device sign the document.
    #[arg(long)]
    signed: bool,
}

impl Cli {
    fn device(&self) -> DeviceInfo {
        if let Some(name) = &self.ble {
            DeviceInfo::ble(name)
        } else if let Some(path) = &self.serial {
            DeviceInfo::serial(path)
        } else if let Some(node) = &self.node {
            DeviceInfo::local_node(node, self.port)
        } else if let Some(host) = &self.host {
            DeviceInfo::network(host, self.port.unwrap_or(80))
        } else {
            DeviceInfo::softap()
        }
    }

    /// Local-control commands and on-network nodes use the
    /// `esp_local_ctrl/*` session; everything else the provisioning one.
    fn session_kind(&self) -> SessionKind {
        match self.command {
            Command::Props | Command::SetProp { .. } | Command::ChalResp { .. } => {
                SessionKind::LocalControl
            }
            _ if self.node.is_some() => SessionKind::LocalControl,
            _ => SessionKind::Provisioning,
        }
    }

    fn scheme(&self) -> anyhow::Result<Option<SchemeVersion>> {
        self.sec_ver
            .map(|v| {
                SchemeVersion::try_from(v).map_err(|v| anyhow::anyhow!("unknown sec_ver {v}"))
            })
            .transpose()
    }

    fn credentials(&self) -> SecurityCredentials {
        SecurityCredentials {
            pop: self.pop.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    fn load_config(&self) -> anyhow::Result<ProvConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => load_config().unwrap_or_else(|e| {
                eprintln!("warning: {e}; using defaults");
                ProvConfig::default()
            }),
        };
        if let Some(token) = &self.id_token {
            config.cloud.id_token = Some(token.clone());
        }
        Ok(config)
    }
}

// ── Interactive network choice ────────────────────────────────────────────────

/// Prints the scan and reads a choice and passphrase from the terminal.
struct TerminalSelector;

impl NetworkSelector for TerminalSelector {
    fn select(&self, networks: &[WifiAccessPoint]) -> Option<WifiCredentials> {
        if networks.is_empty() {
            println!("No networks found");
            return None;
        }
        print_networks(networks);
        let choice = prompt("Select network by number: ")?;
        let ap = networks.get(choice.trim().parse::<usize>().ok()?.checked_sub(1)?)?;
        let passphrase = if ap.auth.needs_passphrase() {
            prompt(&format!("Passphrase for {}: ", ap.ssid))?
        } else {
            String::new()
        };
        Some(WifiCredentials {
            ssid: ap.ssid.clone(),
            passphrase: passphrase.trim_end_matches(['\r', '\n']).to_string(),
        })
    }
}

fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    Some(line)
}

fn print_networks(networks: &[WifiAccessPoint]) {
    println!("{:>3}  {:<32} {:>4} {:>5}  {:<17} AUTH", "#", "SSID", "CH", "RSSI", "BSSID");
    for (i, ap) in networks.iter().enumerate() {
        println!(
            "{:>3}  {:<32} {:>4} {:>5}  {:<17} {}",
            i + 1,
            ap.ssid,
            ap.channel,
            ap.rssi,
            ap.bssid,
            ap.auth
        );
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let device = cli.device();
    let kind = cli.session_kind();
    let transport = connect(&device, kind, &config.transport_settings())
        .await
        .with_context(|| format!("failed to reach {}", device.target))?;

    let result = run(&cli, &config, transport.clone(), kind).await;
    if let Err(e) = transport.disconnect().await {
        warn!("disconnect failed: {e}");
    }
    result
}

async fn run(
    cli: &Cli,
    config: &ProvConfig,
    transport: Arc<dyn Transport>,
    kind: SessionKind,
) -> anyhow::Result<()> {
    let cloud = || -> anyhow::Result<Arc<dyn CloudAuthority>> {
        Ok(Arc::new(
            CloudClient::new(config.cloud_settings()).context("failed to set up cloud client")?,
        ))
    };

    match &cli.command {
        Command::Provision {
            ssid,
            passphrase,
            no_wifi,
            retries,
            user_id,
            timeout,
        } => {
            let request = ProvisionRequest {
                scheme: cli.scheme()?,
                credentials: cli.credentials(),
                wifi: ssid.as_ref().map(|ssid| WifiCredentials {
                    ssid: ssid.clone(),
                    passphrase: passphrase.clone(),
                }),
                no_wifi: *no_wifi,
                user_id: user_id.clone().or_else(|| config.cloud.user_id.clone()),
                max_retries: retries.unwrap_or(config.provisioning.max_retries),
                poller: StatusPoller {
                    interval: config.poll_interval(),
                    deadline: timeout.map(Duration::from_secs),
                },
            };
            let mut orchestrator =
                ProvisioningOrchestrator::new(transport).with_selector(Arc::new(TerminalSelector));
            if config.cloud.id_token.is_some() {
                orchestrator = orchestrator.with_cloud(cloud()?);
            }
            let outcome = orchestrator
                .run(request)
                .await
                .context("provisioning failed")?;
            info!("provisioned with {}", outcome.scheme);
            match (&outcome.node_id, &outcome.status) {
                (Some(node), Some(status)) => println!("Node {node}: {status}"),
                (Some(node), None) => println!("Node {node} verified"),
                (None, Some(status)) => println!("{status}"),
                (None, None) => println!("Done"),
            }
        }
        Command::Scan => {
            let mut session = open(cli, transport, kind).await?;
            let options = ScanOptions::for_transport(session.transport().kind());
            let networks = scan(&mut session, options).await.context("scan failed")?;
            print_networks(&networks);
        }
        Command::GetParams(args) => {
            let mut session = open(cli, transport, kind).await?;
            read(&mut session, DataKind::Params, args).await?;
        }
        Command::GetConfig(args) => {
            let mut session = open(cli, transport, kind).await?;
            read(&mut session, DataKind::Config, args).await?;
        }
        Command::SetParams { json } => {
            let params: Value =
                serde_json::from_str(json).context("set-params expects a JSON document")?;
            let mut session = open(cli, transport, kind).await?;
            let reply = set_params(&mut session, &params)
                .await
                .context("set_params failed")?;
            print_json(&reply)?;
        }
        Command::Props => {
            let mut session = open(cli, transport, kind).await?;
            let properties = list_properties(&mut session)
                .await
                .context("failed to read properties")?;
            for p in &properties {
                let access = if p.is_readonly() { "ro" } else { "rw" };
                println!("[{}] {} ({access}): {}", p.index, p.name, p.value_json());
            }
        }
        Command::SetProp { name, value } => {
            let mut session = open(cli, transport, kind).await?;
            set_property_by_name(&mut session, name, value.as_bytes().to_vec())
                .await
                .with_context(|| format!("failed to set property '{name}'"))?;
            println!("Property '{name}' updated");
        }
        Command::ChalResp { keep_enabled } => {
            if config.cloud.id_token.is_none() {
                bail!("chal-resp needs a cloud id token (--id-token or config file)");
            }
            let mut session = open(cli, transport, kind).await?;
            let mut coordinator = ChallengeResponseCoordinator::new(cloud()?, !keep_enabled);
            match coordinator.run(&mut session).await? {
                (true, Some(node)) => println!("Node {node} mapped to the user"),
                _ => bail!("cloud rejected the challenge response"),
            }
        }
    }
    Ok(())
}

async fn open(
    cli: &Cli,
    transport: Arc<dyn Transport>,
    kind: SessionKind,
) -> anyhow::Result<SecureSession> {
    let (session, _caps) = open_session(transport, kind, cli.scheme()?, &cli.credentials())
        .await
        .context("failed to establish session")?;
    Ok(session)
}

async fn read(session: &mut SecureSession, kind: DataKind, args: &ReadArgs) -> anyhow::Result<()> {
    let timestamp = args.timestamp.unwrap_or_else(now_secs);
    let value = if args.signed {
        get_signed(session, kind, timestamp).await
    } else {
        get_json(session, kind, Some(timestamp)).await
    }
    .with_context(|| format!("failed to read {}", kind.endpoint()))?;
    print_json(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_is_softap_provisioning() {
        let cli = Cli::parse_from(["rmaker-prov", "scan"]);
        assert_eq!(cli.device(), DeviceInfo::softap());
        assert_eq!(cli.session_kind(), SessionKind::Provisioning);
    }

    #[test]
    fn test_node_target_uses_local_control_on_8080() {
        // Arrange / Act
        let cli = Cli::parse_from(["rmaker-prov", "--node", "N1", "get-params", "--signed"]);

        // Assert
        assert_eq!(cli.device(), DeviceInfo::local_node("N1", None));
        assert_eq!(cli.session_kind(), SessionKind::LocalControl);
        assert!(matches!(cli.command, Command::GetParams(ReadArgs { signed: true, .. })));
    }

    #[test]
    fn test_provision_flags_parse() {
        let cli = Cli::parse_from([
            "rmaker-prov",
            "--host",
            "10.0.0.5",
            "--sec-ver",
            "2",
            "--username",
            "wifiprov",
            "--password",
            "abcd1234",
            "provision",
            "--ssid",
            "home",
            "--passphrase",
            "secret",
            "--retries",
            "2",
        ]);

        assert_eq!(cli.scheme().unwrap(), Some(SchemeVersion::MutualAuthPassword));
        assert_eq!(cli.device(), DeviceInfo::network("10.0.0.5", 80));
        assert_eq!(cli.credentials().username, "wifiprov");
        match cli.command {
            Command::Provision { ssid, retries, no_wifi, .. } => {
                assert_eq!(ssid.as_deref(), Some("home"));
                assert_eq!(retries, Some(2));
                assert!(!no_wifi);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_sec_ver_is_rejected() {
        let result = Cli::try_parse_from(["rmaker-prov", "--sec-ver", "3", "scan"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_conflicting_targets_are_rejected() {
        let result = Cli::try_parse_from(["rmaker-prov", "--ble", "PROV_1", "--serial", "/dev/ttyUSB0", "scan"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_property_commands_always_use_local_control() {
        let cli = Cli::parse_from(["rmaker-prov", "--host", "10.0.0.5", "props"]);
        assert_eq!(cli.session_kind(), SessionKind::LocalControl);
    }
}

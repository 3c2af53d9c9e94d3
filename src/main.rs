use std::net::IpAddr;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tether::api::server::{start_server, ServeOptions};
use tether::cert::CertificateAuthority;
use tether::config;
use tether::registry::ProjectRegistry;
use tether::tasks::TaskList;
use tether::tokens::TokenStore;

#[derive(Parser)]
#[command(name = config::APP_NAME, version, about = "Control a desktop session from your phone")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the API server and run until interrupted
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,
        /// Port to listen on
        #[arg(long, default_value_t = config::DEFAULT_PORT)]
        port: u16,
        /// Serve plain HTTP instead of TLS
        #[arg(long)]
        no_tls: bool,
        /// Accept requests without a token (trusted networks only)
        #[arg(long)]
        no_auth: bool,
    },
    /// Issue a new access token and print a pairing QR code
    Pair {
        /// Label stored with the token
        #[arg(long, default_value = "phone")]
        label: String,
        /// Port the pairing payload should point at
        #[arg(long, default_value_t = config::DEFAULT_PORT)]
        port: u16,
    },
    /// Manage access tokens
    Tokens {
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Manage the TLS certificate
    Cert {
        #[command(subcommand)]
        command: CertCommand,
    },
    /// Print how a client would connect to this machine
    ConnectInfo {
        #[arg(long, default_value_t = config::DEFAULT_PORT)]
        port: u16,
    },
    /// Summarize local state: tokens, certificate, projects
    Status,
}

#[derive(Subcommand)]
enum TokenCommand {
    /// List issued tokens (labels and hash prefixes only)
    List,
    /// Revoke tokens whose hash starts with the given prefix
    Revoke { prefix: String },
}

#[derive(Subcommand)]
enum CertCommand {
    /// Print the certificate fingerprint
    Fingerprint,
    /// Replace the certificate and key with fresh ones
    Regen,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve {
            host,
            port,
            no_tls,
            no_auth,
        } => serve(host, port, !no_tls, !no_auth),
        Command::Pair { label, port } => pair(&label, port),
        Command::Tokens { command } => tokens(command),
        Command::Cert { command } => cert(command),
        Command::ConnectInfo { port } => connect_info(port),
        Command::Status => status(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn default_authority() -> CertificateAuthority {
    CertificateAuthority::new(config::cert_path(), config::key_path())
}

#[tokio::main]
async fn serve(host: IpAddr, port: u16, tls: bool, auth: bool) -> CliResult {
    let store = TokenStore::open(config::tokens_path())?;
    if auth && store.is_empty() {
        tracing::warn!("no tokens issued yet; run `tether pair` so a phone can connect");
    }
    let registry = ProjectRegistry::new(config::registry_dir());
    let ca = default_authority();

    let opts = ServeOptions {
        host,
        port,
        auth,
        tls,
    };
    let mut server = start_server(opts, store, TaskList::default(), registry, &ca).await?;

    let session = server.session().clone();
    let scheme = if session.tls { "https" } else { "http" };
    println!("listening on {scheme}://{}", session.server_addr);
    if session.tls {
        println!("certificate fingerprint: {}", ca.fingerprint()?);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");
    server.shutdown();
    Ok(())
}

fn pair(label: &str, port: u16) -> CliResult {
    let mut store = TokenStore::open(config::tokens_path())?;
    let token = store.generate(label)?;

    let ca = default_authority();
    ca.ensure_certificate()?;
    let fingerprint = ca.fingerprint()?;

    let host = local_ip_address::local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string());
    let url = format!("https://{host}:{port}");

    let payload = serde_json::json!({
        "url": url,
        "token": token,
        "fingerprint": fingerprint,
    })
    .to_string();
    let qr = qrcode::QrCode::new(payload.as_bytes())?;
    let rendered = qr
        .render::<qrcode::render::unicode::Dense1x2>()
        .quiet_zone(true)
        .build();

    println!("{rendered}\n");
    println!("server:      {url}");
    println!("fingerprint: {fingerprint}");
    println!("token:       {token}");
    println!("\nThe token is shown once and stored only as a hash.");
    Ok(())
}

fn tokens(command: TokenCommand) -> CliResult {
    let mut store = TokenStore::open(config::tokens_path())?;
    match command {
        TokenCommand::List => {
            let entries = store.list();
            if entries.is_empty() {
                println!("no tokens issued");
                return Ok(());
            }
            for entry in entries {
                println!(
                    "{}  {}  issued {}",
                    entry.hash_prefix,
                    entry.label,
                    entry.created_at.format("%Y-%m-%d %H:%M UTC"),
                );
            }
        }
        TokenCommand::Revoke { prefix } => {
            if store.revoke(&prefix)? {
                println!("revoked tokens matching {prefix}");
            } else {
                println!("no token matches {prefix}");
            }
        }
    }
    Ok(())
}

fn cert(command: CertCommand) -> CliResult {
    let ca = default_authority();
    match command {
        CertCommand::Fingerprint => {
            ca.ensure_certificate()?;
            println!("{}", ca.fingerprint()?);
        }
        CertCommand::Regen => {
            ca.regenerate()?;
            println!("new fingerprint: {}", ca.fingerprint()?);
            println!("paired phones must re-pair to trust the new certificate");
        }
    }
    Ok(())
}

fn connect_info(port: u16) -> CliResult {
    let ca = default_authority();
    let fingerprint = if ca.is_provisioned() {
        Some(ca.fingerprint()?)
    } else {
        None
    };
    let host = local_ip_address::local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    println!("url:         https://{host}:{port}");
    match fingerprint {
        Some(fp) => println!("fingerprint: {fp}"),
        None => println!("fingerprint: (no certificate yet; run `tether serve` or `tether pair`)"),
    }
    Ok(())
}

fn status() -> CliResult {
    let store = TokenStore::open(config::tokens_path())?;
    let ca = default_authority();
    let registry = ProjectRegistry::new(config::registry_dir());
    let projects = registry.projects();

    println!("data dir:    {}", config::data_dir().display());
    println!("tokens:      {}", store.list().len());
    println!(
        "certificate: {}",
        if ca.is_provisioned() {
            "provisioned"
        } else {
            "not yet generated"
        }
    );
    println!("projects:    {}", projects.len());
    for project in &projects {
        let state = project.status.as_deref().unwrap_or("unknown");
        println!("  {}  {state}", project.name);
    }
    Ok(())
}

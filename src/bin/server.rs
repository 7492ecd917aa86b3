//! Serves the `Greeter` or the `Chat` RPC service.

use clap::{Parser, Subcommand};
use msa_rpc::identity::{parse_identity_entry, IdentityResolver, StaticRegistry};
use msa_rpc::relay::ChatRelay;
use msa_rpc::services::{chat::server::ChatServer, greeter::server::GreeterServer};
use msa_rpc::{runtime, telemetry, tls, RpcConfig, DEFAULT_BIND_ADDRESS};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "msa-server", version, about = "Serve an identity or chat RPC service")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "MSA_BIND_ADDR", default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// PEM certificate presented to clients.
    #[arg(long, default_value = "certs/test_cert.pem")]
    cert: PathBuf,

    /// PEM private key matching `--cert`.
    #[arg(long, default_value = "certs/test_key.pem")]
    key: PathBuf,

    /// Name written into a generated certificate.
    #[arg(long, default_value = "localhost")]
    server_name: String,

    /// Worker threads; falls back to MSA_SERVER_THREADS, then the CPU count.
    #[arg(long)]
    threads: Option<usize>,

    /// Write a fresh self-signed certificate and key to `--cert`/`--key` first.
    #[arg(long)]
    generate_cert: bool,

    #[command(subcommand)]
    service: Service,
}

#[derive(Subcommand, Debug)]
enum Service {
    /// Identity resolution (`Greeter.SayHello`).
    Greeter {
        /// Registry entry; repeat to build a custom directory instead of the built-in one.
        #[arg(long = "identity", value_name = "ID=NAME", value_parser = parse_identity_entry)]
        identities: Vec<(String, String)>,
    },
    /// Chat relay (`Chat.Join`, `Chat.Send`).
    Chat,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    telemetry::init_tracing(&[telemetry::DEFAULT_DIRECTIVE, "msa_server=info"])?;

    if cli.generate_cert {
        tls::generate_self_signed(&cli.cert, &cli.key, &[cli.server_name.as_str()])?;
    }

    let config = RpcConfig::new(&cli.cert, cli.bind.as_str())
        .with_key_path(&cli.key)
        .with_server_name(cli.server_name.as_str());
    let service = cli.service;

    let runtime = runtime::build_server_runtime(cli.threads)?;
    runtime.block_on(async move {
        match service {
            Service::Greeter { identities } => {
                let registry = if identities.is_empty() {
                    StaticRegistry::builtin()
                } else {
                    StaticRegistry::new(identities)
                };
                info!(entries = registry.len(), "identity registry loaded");
                GreeterServer::new(IdentityResolver::new(registry), config)
                    .serve()
                    .await
            }
            Service::Chat => ChatServer::new(ChatRelay::new(), config).serve().await,
        }
    })?;

    Ok(())
}

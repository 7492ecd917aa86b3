//! Command line client for the `Greeter` and `Chat` services.

use clap::{Parser, Subcommand};
use msa_rpc::services::chat::{client::ChatClient, ChatMessage};
use msa_rpc::services::greeter::{client::GreeterClient, IdentityReply, IdentityRequest};
use msa_rpc::{telemetry, RpcConfig, RpcError, DEFAULT_BIND_ADDRESS};
use std::{net::SocketAddr, path::PathBuf, process::ExitCode};

#[derive(Parser, Debug)]
#[command(name = "msa-client", version, about = "Call the identity or chat RPC service")]
struct Cli {
    /// Server address.
    #[arg(long, env = "MSA_SERVER_ADDR", default_value = DEFAULT_BIND_ADDRESS)]
    server: SocketAddr,

    /// Certificate trusted as the server's identity.
    #[arg(long, default_value = "certs/test_cert.pem")]
    cert: PathBuf,

    /// Name the server certificate must carry.
    #[arg(long, default_value = "localhost")]
    server_name: String,

    /// Local address for the client socket.
    #[arg(long, default_value = "0.0.0.0:0")]
    local: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up one person by id (try 123, 456 or 789).
    Hello { id: String },
    /// Join the chat as `user`.
    Join { user: String, text: String },
    /// Send a chat line as `user`.
    Send { user: String, text: String },
}

/// What `hello` prints for `reply`.
fn hello_line(reply: &IdentityReply, id: &str) -> String {
    if reply.is_resolved() {
        format!("{} (ID: #{id})", reply.message)
    } else {
        format!("Wait... I don't know you! (ID: #{id})")
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    telemetry::init_tracing(&["msa_rpc=warn"])?;

    let config = RpcConfig::new(&cli.cert, cli.local.as_str())
        .with_server_name(cli.server_name.as_str());

    let result = match cli.command {
        Command::Hello { id } => {
            let client = GreeterClient::connect(cli.server, config).await?;
            let reply = client.say_hello(IdentityRequest::new(id.as_str())).await?;
            println!("{}", hello_line(&reply, &id));
            Ok(())
        }
        Command::Join { user, text } => {
            let client = ChatClient::connect(cli.server, config).await?;
            client
                .join(ChatMessage::new(user, text))
                .await
                .map(|msg| println!("[joined] {}: {}", msg.user, msg.text))
        }
        Command::Send { user, text } => {
            let client = ChatClient::connect(cli.server, config).await?;
            client
                .send(ChatMessage::new(user, text))
                .await
                .map(|msg| println!("[sent] {}: {}", msg.user, msg.text))
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(RpcError::Status(status)) => {
            eprintln!("rejected: {status}");
            Ok(ExitCode::from(2))
        }
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_line_greets_known_id() {
        let reply = IdentityReply::greeting("Mary");
        assert_eq!(hello_line(&reply, "456"), "Hello, Mary (ID: #456)");
    }

    #[test]
    fn hello_line_flags_unknown_id() {
        let reply = IdentityReply::greeting("");
        assert_eq!(
            hello_line(&reply, "000"),
            "Wait... I don't know you! (ID: #000)"
        );
    }
}

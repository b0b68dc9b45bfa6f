//! Interactive console client.
//!
//! Reads message numbers from stdin and prints the server's answers.
//! `0` asks for a random message, `-1` closes the connection and exits.

use clap::Parser;
use message_catalog::client::Client;
use message_catalog::codec::Status;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const RULE_WIDTH: usize = 70;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "message-client")]
#[command(version = "0.1.0")]
#[command(about = "Interactive client for the message catalog server", long_about = None)]
struct ClientArgs {
    /// Server host
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    println!("=== MESSAGE CLIENT ===");
    println!("Connecting to {}:{}...", args.host, args.port);

    let mut client = Client::connect((args.host.as_str(), args.port)).await?;
    println!("Connected.\n");
    print_instructions();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout
            .write_all(b"\nMessage number (0 for random, -1 to quit): ")
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let index: i32 = match line.trim().parse() {
            Ok(index) => index,
            Err(_) => {
                println!("Invalid input, enter an integer.");
                continue;
            }
        };

        if index == -1 {
            break;
        }

        let response = client.fetch(index).await?;
        match response.status {
            Status::Ok => {
                println!("\n{}", "=".repeat(RULE_WIDTH));
                println!("MESSAGE:");
                println!("{}", response.payload);
                println!("{}", "=".repeat(RULE_WIDTH));
            }
            Status::Error => {
                println!("\n{}", "!".repeat(RULE_WIDTH));
                println!("ERROR: {}", response.payload);
                println!("{}", "!".repeat(RULE_WIDTH));
            }
        }
    }

    println!("\nClosing connection...");
    client.close().await?;
    println!("Client finished.");
    Ok(())
}

fn print_instructions() {
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("INSTRUCTIONS:");
    println!("  - Enter 0 for a random message");
    println!("  - Enter a number between 1 and M for a specific message");
    println!("  - Enter -1 to quit");
    println!("{}", "=".repeat(RULE_WIDTH));
}

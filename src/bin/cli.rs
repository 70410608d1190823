//! cfkv CLI Client
//!
//! Command-line interface for the Raw API.

use std::process::ExitCode;

use cfkv::network::Client;
use cfkv::Result;
use clap::{Parser, Subcommand};

/// cfkv CLI
#[derive(Parser, Debug)]
#[command(name = "cfkv-cli")]
#[command(about = "CLI for the cfkv key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:20160")]
    server: String,

    /// Column family (default, lock, write)
    #[arg(long, default_value = "default", global = true)]
    cf: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// List pairs starting at a key
    Scan {
        /// First key (inclusive)
        #[arg(default_value = "")]
        start: String,

        /// Maximum number of pairs
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;
    let cf = args.cf.as_str();

    match &args.command {
        Commands::Get { key } => match client.raw_get(cf, key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(not found)"),
        },
        Commands::Put { key, value } => {
            client.raw_put(cf, key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Delete { key } => {
            client.raw_delete(cf, key.as_bytes())?;
            println!("OK");
        }
        Commands::Scan { start, limit } => {
            let pairs = client.raw_scan(cf, start.as_bytes(), *limit)?;
            for pair in &pairs {
                println!(
                    "{} => {}",
                    String::from_utf8_lossy(&pair.key),
                    String::from_utf8_lossy(&pair.value)
                );
            }
            println!("({} pairs)", pairs.len());
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
    }

    Ok(())
}

//! GetSomeDB CLI Client
//!
//! Command-line interface for interacting with GetSomeDB.

use clap::{Parser, Subcommand};
use getsomedb::network::Client;
use getsomedb::protocol::{Command, Status};
use getsomedb::Value;

/// GetSomeDB CLI
#[derive(Parser, Debug)]
#[command(name = "getsomedb-cli")]
#[command(about = "CLI for the GetSomeDB key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a session for a database (creates the database if new)
    Open {
        /// Database name
        db: String,
    },

    /// Close a database's session
    Close {
        /// Database name
        db: String,
    },

    /// Insert a new key
    Create {
        db: String,
        key: String,
        /// JSON value, e.g. '{"qty": 2}' or '"text"'
        value: String,
    },

    /// Read a key
    Read { db: String, key: String },

    /// Replace the value of an existing key
    Update {
        db: String,
        key: String,
        /// JSON value
        value: String,
    },

    /// Delete a key
    Delete { db: String, key: String },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    let command = match build_command(args.command) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };

    let mut client = match Client::connect(&args.server) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    match client.execute(&command) {
        Ok(response) => {
            let body = response.message().unwrap_or_default();
            match response.status {
                Status::Ok if body.is_empty() => println!("OK"),
                Status::Ok => println!("{}", body),
                status => {
                    eprintln!("{:?}: {}", status, body);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn build_command(command: Commands) -> Result<Command, serde_json::Error> {
    Ok(match command {
        Commands::Open { db } => Command::CreateSession { db },
        Commands::Close { db } => Command::CloseSession { db },
        Commands::Create { db, key, value } => Command::Create {
            db,
            key,
            value: parse_value(&value)?,
        },
        Commands::Read { db, key } => Command::Read { db, key },
        Commands::Update { db, key, value } => Command::Update {
            db,
            key,
            value: parse_value(&value)?,
        },
        Commands::Delete { db, key } => Command::Delete { db, key },
        Commands::Ping => Command::Ping,
    })
}

fn parse_value(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(raw)
}

//! CairnKV CLI
//!
//! Command-line interface operating directly on a snapshot/journal pair.

use std::process::ExitCode;

use cairnkv::{Config, Store, Value};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// CairnKV CLI
#[derive(Parser, Debug)]
#[command(name = "cairnkv")]
#[command(about = "Embedded key-value store with a write-ahead journal")]
#[command(version)]
struct Args {
    /// Snapshot file
    #[arg(short, long, default_value = "cairnkv.db")]
    snapshot: String,

    /// Journal file
    #[arg(short, long, default_value = "cairnkv.wal")]
    journal: String,

    /// Flush and fsync the journal after every write
    #[arg(long)]
    sync_every_write: bool,

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
    Set {
        /// The key to set
        key: String,

        /// The value: integer, float, true/false, null, otherwise text
        value: String,

        /// Store the value as text without interpreting it
        #[arg(long)]
        text: bool,
    },

    /// Remove a key
    Unset {
        /// The key to remove
        key: String,
    },

    /// Fold the journal into a fresh snapshot
    Coalesce,

    /// Print key count and what the open-time replay recovered
    Stats,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,cairnkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> cairnkv::Result<()> {
    let mut builder = Config::builder()
        .snapshot_path(&args.snapshot)
        .journal_path(&args.journal);
    if args.sync_every_write {
        builder = builder.sync_every_write();
    }

    let store = Store::open_with_config(builder.build())?;

    match args.command {
        Commands::Get { key } => match store.get(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(not found)"),
        },
        Commands::Set { key, value, text } => {
            let value = if text { Value::Text(value) } else { parse_value(&value) };
            store.set(key, value)?;
        }
        Commands::Unset { key } => {
            store.unset(&key)?;
        }
        Commands::Coalesce => store.coalesce()?,
        Commands::Stats => {
            let recovery = store.recovery_stats();
            println!("keys:             {}", store.len()?);
            println!("records replayed: {}", recovery.records_applied);
            println!("  sets:           {}", recovery.sets);
            println!("  unsets:         {}", recovery.unsets);
            println!("journal bytes:    {}", recovery.bytes_read);
        }
    }

    store.flush()?;
    store.close()
}

/// Interpret a command-line argument as the narrowest matching value
fn parse_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    // "inf" and "nan" parse as f64 but are meant as text
    if let Some(x) = raw.parse::<f64>().ok().filter(|x| x.is_finite()) {
        return Value::Float(x);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("42"), Value::Int(42));
        assert_eq!(parse_value("2.5"), Value::Float(2.5));
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("hello"), Value::Text("hello".to_string()));
    }

    #[test]
    fn test_parse_value_non_finite_is_text() {
        for raw in ["inf", "-inf", "infinity", "nan", "NaN"] {
            assert_eq!(parse_value(raw), Value::Text(raw.to_string()));
        }
    }
}

//! docstack command-line tool
//!
//! Runs schema-validated document operations against a local SQLite file.
//!
//! Usage:
//!   docstack --config docstack.toml --user ann --role editor add post '{"title":"Hi"}'
//!   docstack get post post:hi
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::Result;
use clap::Parser;
use docstack_cli::{App, Caller, Command, Config};
use docstack_model::Role;
use std::path::PathBuf;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "docstack")]
#[command(about = "Schema-driven document store")]
struct Args {
    /// Path to the config file with engine settings and entity schemas
    #[arg(short, long, default_value = "docstack.toml")]
    config: PathBuf,

    /// Path to the SQLite database
    #[arg(long, default_value = "docstack.db")]
    db: PathBuf,

    /// Caller: an encoded key or a plain user name
    #[arg(short, long)]
    user: Option<String>,

    /// Caller role
    #[arg(short, long, default_value = "guest")]
    role: Role,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = Config::load(&args.config)?;
    let app = App::open(config, &args.db)?;
    debug!(command = ?args.command, "Running command");

    let caller = Caller {
        user: args.user,
        role: args.role,
    };
    let output = app.run(args.command, &caller)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

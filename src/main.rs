mod commands;

use clap::{Parser, Subcommand};
use ejson::key::{DEFAULT_KEYDIR, KEYDIR_ENV};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ejson")]
#[command(version)]
#[command(about = "Manage encrypted secrets using public key encryption", long_about = None)]
struct Cli {
    /// Directory containing EJSON keys
    #[arg(short, long, global = true, env = KEYDIR_ENV, default_value = DEFAULT_KEYDIR)]
    keydir: PathBuf,

    /// Enable debug logging (overridden by EJSON_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// (Re-)encrypt one or more EJSON files in place
    #[command(visible_alias = "e")]
    Encrypt {
        /// Files to encrypt
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Decrypt an EJSON file
    #[command(visible_alias = "d")]
    Decrypt {
        /// File to decrypt
        file: PathBuf,

        /// Print output to the provided file, rather than stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read the private key from stdin
        #[arg(long)]
        key_from_stdin: bool,

        /// For array documents, print only the first element that decrypts
        #[arg(long)]
        immediate: bool,
    },

    /// Generate a new EJSON keypair
    #[command(visible_alias = "g")]
    Keygen {
        /// Write the private key to the keydir and print only the public key
        #[arg(short, long)]
        write: bool,
    },

    /// Print the `environment` entries of an EJSON file as shell exports
    Env {
        /// File to read
        file: PathBuf,

        /// Read the private key from stdin
        #[arg(long)]
        key_from_stdin: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("EJSON_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("ejson=debug")
        } else {
            EnvFilter::new("ejson=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Encrypt { files } => commands::encrypt(&files),
        Commands::Decrypt {
            file,
            output,
            key_from_stdin,
            immediate,
        } => commands::decrypt(
            &file,
            output.as_deref(),
            &cli.keydir,
            key_from_stdin,
            immediate,
        ),
        Commands::Keygen { write } => commands::keygen(&cli.keydir, write),
        Commands::Env {
            file,
            key_from_stdin,
        } => commands::env(&file, &cli.keydir, key_from_stdin),
    }
}

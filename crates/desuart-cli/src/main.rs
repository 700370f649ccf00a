use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use desuart_core::config::{HarnessConfig, PacingSettings};
use desuart_core::protocol::{list_ports, Connection, ConnectionConfig, Mode};

mod commands;
mod shell;

/// Host-side test harness for a DES core reached over a serial port.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port (e.g. /dev/ttyUSB0 or COM3)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate [default: 115200]
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Response timeout in milliseconds [default: 2000]
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Delay after each of the mode, block and key writes, 0 disables [default: 10]
    #[arg(long, global = true)]
    write_delay_ms: Option<u64>,

    /// Delay between writing a request and reading the response [default: 100]
    #[arg(long, global = true)]
    processing_delay_ms: Option<u64>,

    /// Delay after opening the port [default: 100]
    #[arg(long, global = true)]
    settle_delay_ms: Option<u64>,

    /// Config file (defaults to <config dir>/desuart/config.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports
    Ports,
    /// Encrypt one block on the board
    Encrypt {
        /// Plaintext, 16 hex characters
        block: String,
        /// Key, 16 hex characters
        key: String,
    },
    /// Decrypt one block on the board
    Decrypt {
        /// Ciphertext, 16 hex characters
        block: String,
        /// Key, 16 hex characters
        key: String,
    },
    /// Encrypt then decrypt, and check the plaintext comes back
    Roundtrip {
        /// Plaintext, 16 hex characters
        block: String,
        /// Key, 16 hex characters
        key: String,
    },
    /// Send raw hex bytes, optionally reading a reply
    Send {
        /// Hex data, even number of characters
        data: String,
        /// Number of bytes to read back
        #[arg(short, long)]
        receive: Option<usize>,
    },
    /// Known-answer test plus random round trips
    Selftest {
        /// Number of random vectors after the known-answer test
        #[arg(short = 'n', long, default_value_t = 8)]
        count: usize,
        /// Seed for reproducible vectors
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Interactive menu (default)
    Shell,
}

impl Cli {
    /// Flags as a config layer to put over the file
    fn overrides(&self) -> HarnessConfig {
        HarnessConfig {
            port: self.port.clone(),
            baud_rate: self.baud,
            timeout_ms: self.timeout_ms,
            pacing: PacingSettings {
                settle_delay_ms: self.settle_delay_ms,
                inter_write_delay_ms: self.write_delay_ms,
                processing_delay_ms: self.processing_delay_ms,
            },
        }
    }

    fn connection_config(&self) -> Result<ConnectionConfig> {
        let file = HarnessConfig::discover(self.config.as_deref())
            .context("Failed to load configuration")?;
        Ok(file.merge(self.overrides()).to_connection_config())
    }
}

fn setup_logging(verbosity: &Verbosity<WarnLevel>) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbose);

    let config = cli.connection_config()?;
    tracing::debug!(?config, "resolved connection settings");

    match cli.command.unwrap_or(Command::Shell) {
        Command::Ports => commands::ports(cli.json),
        Command::Encrypt { block, key } => {
            commands::transform(&config, &block, &key, Mode::Encrypt, cli.json)
        }
        Command::Decrypt { block, key } => {
            commands::transform(&config, &block, &key, Mode::Decrypt, cli.json)
        }
        Command::Roundtrip { block, key } => commands::round_trip(&config, &block, &key, cli.json),
        Command::Send { data, receive } => commands::send(&config, &data, receive, cli.json),
        Command::Selftest { count, seed } => commands::selftest(&config, count, seed, cli.json),
        Command::Shell => {
            if cli.json {
                bail!("--json is not supported by the interactive shell");
            }
            let stdin = io::stdin();
            let mut shell = shell::Shell::new(
                stdin.lock(),
                io::stdout(),
                config,
                Box::new(|config: &ConnectionConfig| Connection::open(config.clone())),
                Box::new(list_ports),
            );
            shell.run().context("Interactive session failed")
        }
    }
}

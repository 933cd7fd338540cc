use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "certimate-rs")]
#[command(version)]
#[command(about = "Certificate orchestration engine: inspect, dedup-match, validate and notify")]
#[command(long_about = None)]
pub struct Cli {
    /// Config file path (default: ~/.config/certimate-rs/config.yaml)
    #[arg(long, env = "CERTIMATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output raw tab-separated values (no formatting)
    #[arg(short, long)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a PEM certificate chain and show its fields
    Inspect {
        /// PEM file holding the full chain, leaf first
        file: PathBuf,
        /// Private key PEM file to pair with the chain
        #[arg(long)]
        key: Option<PathBuf>,
    },
    /// Check whether two PEM files hold the same certificate
    Compare {
        a: PathBuf,
        b: PathBuf,
        /// Compare leaf certificates only, ignoring the rest of the chains
        #[arg(long)]
        leaf: bool,
    },
    /// Validate a certificate or private key
    Validate {
        #[command(subcommand)]
        command: ValidateCommands,
    },
    /// Bundle a certificate chain and its private key into a zip archive
    Export {
        /// PEM file holding the full chain, leaf first
        file: PathBuf,
        /// Private key PEM file
        #[arg(long)]
        key: PathBuf,
        /// Archive format (only PEM is supported)
        #[arg(long, default_value = "PEM")]
        format: String,
        /// Directory the archive is written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// List providers of the built-in capability registry
    Providers,
    /// Send a message through a registered notifier
    Notify {
        /// Notifier provider id
        #[arg(long, default_value = "wecombot")]
        provider: String,
        /// Provider option as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        subject: String,
        body: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completion {
        #[command(subcommand)]
        command: CompletionCommands,
    },
    /// Internal completion helpers (hidden)
    #[command(hide = true)]
    CompletionHelper {
        #[command(subcommand)]
        command: CompletionHelperCommands,
    },
}

#[derive(Subcommand)]
pub enum ValidateCommands {
    /// Certificate must parse and not be expired; prints its domains
    Cert { file: PathBuf },
    /// Private key must be a PKCS#8, PKCS#1 or SEC1 PEM block
    Key { file: PathBuf },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as YAML
    Show,
    /// Print the resolved config file path
    Path,
}

#[derive(Subcommand)]
pub enum CompletionCommands {
    /// Generate bash completion script
    Bash,
    /// Generate zsh completion script
    Zsh,
    /// Generate fish completion script
    Fish,
    /// Generate PowerShell completion script
    PowerShell,
}

impl CompletionCommands {
    pub fn shell(&self) -> Shell {
        match self {
            CompletionCommands::Bash => Shell::Bash,
            CompletionCommands::Zsh => Shell::Zsh,
            CompletionCommands::Fish => Shell::Fish,
            CompletionCommands::PowerShell => Shell::PowerShell,
        }
    }
}

#[derive(Subcommand)]
pub enum CompletionHelperCommands {
    /// List notifier provider ids for completion
    Notifiers,
}

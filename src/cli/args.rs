//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--shop-id <ID>` / `SHOP_ID`: Shop to operate on
//! - `--api-base <URL>` / `SHOP_API_BASE`: API endpoint
//! - `--token <TOKEN>` / `SHOP_API_TOKEN`: API token
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output; implies --no-progress
//! - `--no-progress`: Do not draw progress bars

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::types::{Entity, ExportFormat, LengthUnit, WeightUnit};

/// shop - bulk exports, imports and file transfer for your online shop
#[derive(Parser, Debug)]
#[command(name = "shop")]
#[command(author, version, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Shop to operate on (overrides the config file)
    #[arg(long, global = true, env = "SHOP_ID", value_name = "ID")]
    pub shop_id: Option<String>,

    /// API base URL (overrides the config file)
    #[arg(long, global = true, env = "SHOP_API_BASE", value_name = "URL")]
    pub api_base: Option<String>,

    /// API token (overrides the token stored by `shop auth`)
    #[arg(
        long,
        global = true,
        env = "SHOP_API_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub token: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-progress
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Do not draw progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Export an entity to a local file
    #[command(
        name = "export",
        long_about = "Export all records of an entity to a local file.\n\n\
            Starts a bulk export on the server, waits for the export task while \
            drawing its progress, then downloads the result file. Row-level problems \
            reported by the task are listed under 'Errors:' and do not fail the command.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Export products as CSV to ./products.csv
    shop export products

    # Export orders as a spreadsheet to a chosen path
    shop export orders --format xlsx --out ~/reports/orders.xlsx"
    )]
    Export {
        /// Entity to export
        #[arg(value_enum)]
        entity: Entity,

        /// File format
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Destination path (default: <entity>.<format> in the current directory)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Import an entity from a local file
    #[command(
        name = "import",
        long_about = "Import records of an entity from a local file.\n\n\
            Uploads the file, starts a bulk import referencing it and waits for the \
            import task. Row-level problems reported by the task are listed under \
            'Errors:'; the rows without problems are still imported.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Import products measured in inches and pounds
    shop import products ./products.csv --length-unit in --weight-unit lb

    # Use the units from the config file
    shop import inventory ./stock.csv"
    )]
    Import {
        /// Entity to import
        #[arg(value_enum)]
        entity: Entity,

        /// File to upload
        file: PathBuf,

        /// Unit of length columns (default: config `units.length`, else cm)
        #[arg(long, value_enum)]
        length_unit: Option<LengthUnit>,

        /// Unit of weight columns (default: config `units.weight`, else kg)
        #[arg(long, value_enum)]
        weight_unit: Option<WeightUnit>,
    },

    /// Inspect background tasks
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },

    /// Transfer stored files
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },

    /// Get, set, or list configuration values
    #[command(
        name = "config",
        after_help = "\
KEYS:
    shop_id               Default shop
    api_base              API base URL
    polling.interval_ms   Delay between task lookups (min 100)
    polling.timeout_secs  Give up waiting for a task after this long
    display.progress      Draw progress bars (true/false)
    units.length          Default import length unit
    units.weight          Default import weight unit"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Store or remove the API token
    #[command(
        name = "auth",
        long_about = "Store or remove the API token for the configured API host.\n\n\
            The token is read from --token (or SHOP_API_TOKEN) or prompted for \
            without echo, and saved in ~/.shopcli/secrets.toml with owner-only \
            permissions. The token is never printed.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Prompt for a token
    shop auth

    # Non-interactive
    shop auth --token tok_live_xxxx

    # Check whether a token is stored
    shop auth --status

    # Remove the stored token
    shop auth --logout"
    )]
    Auth {
        /// Show whether a token is stored
        #[arg(long, conflicts_with = "logout")]
        status: bool,

        /// Remove the stored token
        #[arg(long)]
        logout: bool,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    shop completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    shop completion zsh >> ~/.zshrc

    # Fish
    shop completion fish > ~/.config/fish/completions/shop.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Task subcommands.
#[derive(Subcommand, Debug)]
pub enum TasksAction {
    /// Wait for a task to finish, drawing its progress
    Wait {
        /// Task id
        task_id: String,
    },
}

/// File subcommands.
#[derive(Subcommand, Debug)]
pub enum FilesAction {
    /// Download a stored file
    Download {
        /// File id
        file_id: String,
        /// Destination path
        dest: PathBuf,
    },
    /// Upload a local file as private storage and print its id
    Upload {
        /// File to upload
        path: PathBuf,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// List all configuration values
    List,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

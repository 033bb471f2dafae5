// src/main.rs
//! swup - software updater CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use swup::{bundle, config, UpdaterConfig};

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "swup")]
#[command(version)]
#[command(about = "Software updater for image-based OS installs", long_about = None)]
struct Cli {
    /// Target filesystem root
    #[arg(long = "path", global = true, default_value = "/")]
    path: PathBuf,

    /// Mutable state directory
    #[arg(long = "statedir", global = true, default_value = config::DEFAULT_STATE_DIR)]
    statedir: PathBuf,

    /// Content server URL (or local mirror path)
    #[arg(long = "url", global = true)]
    url: Option<String>,

    /// Version server URL (defaults to the content URL)
    #[arg(long = "versionurl", global = true)]
    versionurl: Option<String>,

    /// Skip MoM signature verification
    #[arg(long = "nosigcheck", global = true)]
    nosigcheck: bool,

    /// Ed25519 public key used to verify the MoM
    #[arg(long = "pubkey", global = true)]
    pubkey: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all installable bundles
    List,

    /// Install one or more bundles
    ///
    /// Bundles named on the command line are installed together with
    /// every bundle they transitively include. If the install is
    /// interrupted after it started committing files, the system is
    /// left partially installed; the next run reports the interrupted
    /// install and running it again converges the system.
    Install {
        /// Bundle name(s)
        #[arg(required = true)]
        bundles: Vec<String>,
    },

    /// Remove an installed bundle
    ///
    /// Files shared with bundles that stay installed are kept. Removing
    /// os-core or a bundle required by another installed bundle is
    /// refused.
    Remove {
        /// Bundle name
        bundle: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let content_url = cli
        .url
        .clone()
        .unwrap_or_else(|| config::DEFAULT_CONTENT_URL.to_string());
    let version_url = cli
        .versionurl
        .clone()
        .or_else(|| cli.url.clone())
        .unwrap_or_else(|| config::DEFAULT_VERSION_URL.to_string());

    let config = UpdaterConfig {
        path_prefix: cli.path,
        state_dir: cli.statedir,
        content_url,
        version_url,
        sig_check: !cli.nosigcheck,
        pubkey_path: cli.pubkey,
        ..Default::default()
    };

    match cli.command {
        Some(Commands::List) => match bundle::list_bundles(&config) {
            Ok(names) => {
                for name in names {
                    println!("{name}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        },

        Some(Commands::Install { bundles }) => {
            match bundle::install_bundles(&config, &bundles) {
                Ok(()) => {
                    println!("Bundle(s) installation done.");
                    ExitCode::SUCCESS
                }
                Err(e) => fail(e),
            }
        }

        Some(Commands::Remove { bundle }) => match bundle::remove_bundle(&config, &bundle) {
            Ok(()) => {
                println!("Success: Bundle removed");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: Bundle remove failed");
                fail(e)
            }
        },

        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "swup", &mut io::stdout());
            ExitCode::SUCCESS
        }

        None => {
            println!("swup software updater v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'swup --help' for usage information");
            ExitCode::SUCCESS
        }
    }
}

fn fail(e: swup::Error) -> ExitCode {
    eprintln!("Error: {e}");
    ExitCode::from(e.exit_code())
}

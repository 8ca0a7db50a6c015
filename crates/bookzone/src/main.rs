// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! BookZone - buyer-seller messaging server.
//!
//! This is the binary entry point for the messaging service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod config_cmd;
mod serve;
mod shutdown;

/// BookZone - buyer-seller messaging server.
#[derive(Parser, Debug)]
#[command(name = "bookzone", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the messaging gateway.
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration (tokens redacted).
    Show,
    /// Load and validate configuration, then exit.
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => bookzone_config::load_and_validate_path(path),
        None => bookzone_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            bookzone_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("bookzone: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => match config_cmd::render_effective(&config) {
                Ok(rendered) => print!("{rendered}"),
                Err(e) => {
                    eprintln!("bookzone: failed to render config: {e}");
                    std::process::exit(1);
                }
            },
            ConfigAction::Validate => println!("{}", config_cmd::summary(&config)),
        },
        None => {
            println!("bookzone: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = bookzone_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn cli_parses_config_subcommand() {
        let cli = Cli::parse_from(["bookzone", "--config", "x.toml", "config", "validate"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Validate
            })
        ));
    }
}

// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lumina - real-time customer support engine.
//!
//! This is the binary entry point for the Lumina server.

use clap::{Parser, Subcommand};

mod serve;
mod shutdown;

/// Lumina - real-time customer support engine.
#[derive(Parser, Debug)]
#[command(name = "lumina", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Lumina support server.
    Serve,
    /// Print the effective configuration and exit.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match lumina_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            lumina_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(err) = serve::run_serve(config).await {
                eprintln!("lumina serve failed: {err}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(err) => {
                eprintln!("failed to render config: {err}");
                std::process::exit(1);
            }
        },
        None => {
            println!("lumina: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // Verify config loads with defaults (no config file needed).
        let config = lumina_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn effective_config_renders_as_toml() {
        let config = lumina_config::load_and_validate_str("").unwrap();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[server]"));
        assert!(rendered.contains("[routing]"));
    }
}

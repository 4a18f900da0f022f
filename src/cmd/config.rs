//! Configuration view and validation commands — `config-review config`.

use anyhow::Result;
use std::path::{Path, PathBuf};

use config_review::review_config::{ReviewConfig, ReviewToml};

use super::super::ConfigCommands;

fn print_toml(toml: &ReviewToml) {
    println!("[compare]");
    match &toml.compare.current_epoch {
        Some(epoch) => println!("  current_epoch = \"{}\"", epoch),
        None => println!("  current_epoch = (detected from the new tree)"),
    }
    println!("  volatile_fields = {:?}", toml.compare.volatile_fields);
    println!("  extensions = {:?}", toml.compare.extensions);
    println!();

    println!("[permissions]");
    for (root, allowed) in &toml.permissions {
        println!("  \"{}\" = {:?}", root, allowed);
    }
    println!();

    println!("[review]");
    println!("  marker = \"{}\"", toml.review.marker);
    if let Some(approver) = &toml.review.approver {
        println!("  approver = \"{}\"", approver);
    }
    println!("  dismiss_message = \"{}\"", toml.review.dismiss_message);
    println!();

    println!("[github]");
    println!("  api_url = \"{}\"", toml.github.api_url);
    if let Some(repository) = &toml.github.repository {
        println!("  repository = \"{}\"", repository);
    }
    println!();
}

pub fn cmd_config(
    project_dir: &Path,
    config_path: Option<PathBuf>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let config = ReviewConfig::with_cli_args(project_dir.to_path_buf(), config_path)?;
    let config_path = &config.config_path;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Config Review Configuration");
            println!("===========================");
            println!();

            println!("Project dir: {}", config.project_dir.display());
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No review.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            print_toml(&config.toml);

            println!("Effective values (with env/CLI overrides):");
            println!("  api_url = \"{}\"", config.toml.api_url());
            match config.repository() {
                Some(repository) => println!("  repository = \"{}\"", repository),
                None => println!("  repository = (not set)"),
            }
            println!(
                "  token = {}",
                if config.token().is_some() { "set" } else { "(not set)" }
            );
            println!(
                "  unlisted features = {}",
                if config.has_wildcard() {
                    "governed by the wildcard root"
                } else {
                    "never auto-approved"
                }
            );
            println!();

            if !config_path.exists() {
                println!("Run 'config-review config init' to create a review.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No review.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("review.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                std::fs::create_dir_all(parent)?;
            }

            ReviewToml::default().save(config_path)?;

            println!("Created review.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [compare] current_epoch, volatile_fields, extensions");
            println!("  - [permissions] feature roots and their auto-approvable sub-paths");
            println!("  - [review] marker, approver, dismiss_message");
            println!("  - [github] api_url, repository");
            println!();
        }
    }

    Ok(())
}

use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;

use super::entries::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# habit configuration

# Whose records are read and written
# owner_id: your-user-id

# Unit for water (oz, ml, l, cup) and the daily goal in that unit
volume_unit: oz
water_goal: 64

# How a failed delete is undone: snapshot (whole list) or entry (just the entry)
rollback: snapshot

# Remote store
# server:
#   url: http://localhost:8080
#   api_key: your-api-key
#   timeout_secs: 15
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        match &config.owner_id.value {
                            Some(owner) => println!("owner_id: {}", owner),
                            None => println!("owner_id: (not set)"),
                        }
                        println!("  source: {}", config.owner_id.source);
                        println!();

                        println!("volume_unit: {}", config.volume_unit.value);
                        println!("  source: {}", config.volume_unit.source);
                        println!();

                        println!("water_goal: {}", config.water_goal.value);
                        println!("  source: {}", config.water_goal.source);
                        println!();

                        println!("rollback: {}", config.rollback.value);
                        println!("  source: {}", config.rollback.source);
                        println!();

                        println!(
                            "server.url: {}",
                            config.server.url.as_deref().unwrap_or("(not set)")
                        );
                        println!(
                            "server.api_key: {}",
                            if config.server.api_key.is_some() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                        println!("server.timeout_secs: {}", config.server.timeout_secs);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = config
                    .config_file
                    .clone()
                    .unwrap_or_else(Config::default_config_path);

                // Check if config already exists
                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'habit config show' to view current configuration.");
                    return Ok(());
                }

                // Create parent directory
                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, DEFAULT_CONFIG).unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.water_goal.value, 64.0);
        assert!(config.owner_id.value.is_none());
    }
}

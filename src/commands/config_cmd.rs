use clap::{Args, Subcommand};

use shopdesk::config::Config;

use super::OutputFormat;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show,
}

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        format: OutputFormat,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show => {
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

                        println!("port: {}", config.port.value);
                        println!("  source: {}", config.port.source);
                        println!();

                        println!("mirror_root: {}", config.mirror_root.value.display());
                        println!("  source: {}", config.mirror_root.source);
                        println!();

                        println!(
                            "username: {}",
                            config.username.value.as_deref().unwrap_or("(none)")
                        );
                        println!("  source: {}", config.username.source);
                        println!(
                            "password: {}",
                            if config.password.is_some() { "(set)" } else { "(none)" }
                        );
                        println!();

                        println!("servers: {}", config.servers.value.len());
                        println!("  source: {}", config.servers.source);
                        for s in &config.servers.value {
                            println!("  - {} ({}:{}{})", s.id, s.host, s.port, s.base_path);
                        }
                        println!();

                        println!("currencies: {}", config.currencies.value.len());
                        println!("  source: {}", config.currencies.source);
                        for c in &config.currencies.value {
                            println!("  - {} ({}, economy {})", c.id, c.name, c.economy);
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

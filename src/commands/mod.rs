mod backup;
mod config_cmd;
mod entry;
mod shop;

use clap::{Args, ValueEnum};
use serde::Serialize;
use shopdesk_core::Receipt;

pub use backup::{list_backups, restore};
pub use config_cmd::ConfigCommand;
pub use entry::EntryCommand;
pub use shop::{create_shop, delete_shop, list_currencies, list_servers, list_shops, show_grid, show_shop};

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// A shop on a configured server.
#[derive(Args, Clone)]
pub struct ShopRef {
    /// Server ID
    pub server: String,
    /// Shop ID (file name without .json)
    pub shop: String,
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_receipt(
    receipt: &Receipt,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => print_json(receipt)?,
        OutputFormat::Text => {
            let mut line = format!("Shop '{}' {}", receipt.shop_id, receipt.status);
            if let Some(backup) = &receipt.backup {
                line.push_str(&format!(" (backup: {})", backup));
            }
            if let Some(source) = &receipt.source {
                line.push_str(&format!(" (from: {})", source));
            }
            println!("{}", line);
        }
    }
    Ok(())
}

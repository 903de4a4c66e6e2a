use shopdesk_core::ShopStore;

use super::{print_json, print_receipt, OutputFormat, ShopRef};

pub async fn list_backups(
    store: &ShopStore,
    target: &ShopRef,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let backups = store.list_backups(&target.server, &target.shop).await?;
    match format {
        OutputFormat::Json => print_json(&backups)?,
        OutputFormat::Text => {
            if backups.is_empty() {
                println!("No backups for '{}'.", target.shop);
                return Ok(());
            }
            println!("{:<48} {:>10}  MODIFIED", "NAME", "SIZE");
            for b in &backups {
                println!(
                    "{:<48} {:>10}  {}",
                    b.name,
                    b.size,
                    b.modify_time.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}

/// Restores the named backup, or the newest one when no name is given.
pub async fn restore(
    store: &ShopStore,
    target: &ShopRef,
    backup: Option<&str>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let receipt = match backup {
        Some(name) => {
            store
                .restore_named(&target.server, &target.shop, name)
                .await?
        }
        None => store.restore_latest(&target.server, &target.shop).await?,
    };
    print_receipt(&receipt, format)
}

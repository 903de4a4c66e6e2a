use clap::{Args, Subcommand};
use shopdesk_core::{Catalog, EntryDraft, Price, ShopDocument, ShopError, ShopStore};

use super::{print_receipt, OutputFormat, ShopRef};

#[derive(Args)]
pub struct EntryCommand {
    #[command(flatten)]
    pub target: ShopRef,

    #[command(subcommand)]
    pub command: EntrySubcommand,
}

#[derive(Subcommand)]
pub enum EntrySubcommand {
    /// Create or replace an entry
    Set {
        /// Entry ID
        id: String,

        /// Item reference
        #[arg(long)]
        item: String,

        /// Slot (0-53)
        #[arg(long)]
        slot: i64,

        /// Page for a new entry
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Existing entry this one replaces (renames it)
        #[arg(long)]
        replace: Option<String>,

        /// Buy price (0 or omitted: not buyable)
        #[arg(long)]
        buy: Option<f64>,

        /// Currency for the buy price (default: first configured)
        #[arg(long)]
        buy_currency: Option<String>,

        /// Sell price (0 or omitted: not sellable)
        #[arg(long)]
        sell: Option<f64>,

        /// Currency for the sell price (default: first configured)
        #[arg(long)]
        sell_currency: Option<String>,

        /// Display item override
        #[arg(long)]
        display_item: Option<String>,

        /// Display name override
        #[arg(long)]
        display_name: Option<String>,

        /// Display lore line (can be repeated)
        #[arg(long = "lore", value_name = "LINE")]
        lore: Vec<String>,
    },

    /// Remove an entry
    Rm {
        /// Entry ID
        id: String,
    },

    /// Copy an entry under a new ID
    Dup {
        /// Entry to copy
        id: String,

        /// ID of the copy
        new_id: String,

        /// Slot of the copy
        #[arg(long)]
        slot: i64,
    },

    /// Move an entry to another slot
    Move {
        /// Entry ID
        id: String,

        /// Target slot
        #[arg(long)]
        slot: i64,
    },

    /// Set the pages an entry appears on
    Pages {
        /// Entry ID
        id: String,

        /// Page numbers
        #[arg(required = true, num_args = 1..)]
        pages: Vec<i64>,
    },
}

/// Resolves an editor amount and optional currency into a price.
fn resolve_price(
    catalog: &Catalog,
    amount: Option<f64>,
    currency: Option<&str>,
) -> Result<Option<Price>, ShopError> {
    if amount.is_none() {
        return Ok(None);
    }
    let currency = match currency {
        Some(c) => c.to_string(),
        None => catalog
            .currencies()
            .first()
            .map(|c| c.id.clone())
            .ok_or_else(|| ShopError::InvalidEntry("no currencies configured".into()))?,
    };
    if catalog.currency(&currency).is_none() {
        return Err(ShopError::InvalidEntry(format!(
            "unknown currency: {}",
            currency
        )));
    }
    catalog.price(amount, &currency)
}

impl EntrySubcommand {
    /// Applies the edit to a loaded document.
    pub fn apply(&self, catalog: &Catalog, doc: &mut ShopDocument) -> Result<String, ShopError> {
        match self {
            EntrySubcommand::Set {
                id,
                item,
                slot,
                page,
                replace,
                buy,
                buy_currency,
                sell,
                sell_currency,
                display_item,
                display_name,
                lore,
            } => {
                let previous = match replace {
                    Some(old) if !doc.entries.contains(old) => {
                        return Err(ShopError::EntryNotFound(old.clone()))
                    }
                    Some(old) => Some(old.as_str()),
                    None if doc.entries.contains(id.trim()) => Some(id.trim()),
                    None => None,
                };
                let draft = EntryDraft {
                    page: *page,
                    buy: resolve_price(catalog, *buy, buy_currency.as_deref())?,
                    sell: resolve_price(catalog, *sell, sell_currency.as_deref())?,
                    display_item: display_item.clone().unwrap_or_default(),
                    display_name: display_name.clone().unwrap_or_default(),
                    display_lore: lore.clone(),
                    ..EntryDraft::new(id.clone(), item.clone(), *slot)
                };
                let entry = doc.upsert_entry(previous, draft)?;
                Ok(format!("Set entry '{}' in slot {}", entry.id, slot))
            }
            EntrySubcommand::Rm { id } => {
                doc.remove_entry(id)?;
                Ok(format!("Removed entry '{}'", id))
            }
            EntrySubcommand::Dup { id, new_id, slot } => {
                let copy = doc.duplicate_entry(id, new_id, *slot)?;
                Ok(format!("Copied '{}' to '{}' in slot {}", id, copy.id, slot))
            }
            EntrySubcommand::Move { id, slot } => {
                doc.move_entry(id, *slot)?;
                Ok(format!("Moved '{}' to slot {}", id, slot))
            }
            EntrySubcommand::Pages { id, pages } => {
                doc.set_pages(id, pages)?;
                Ok(format!("Entry '{}' now on pages {:?}", id, pages))
            }
        }
    }
}

impl EntryCommand {
    pub async fn run(
        &self,
        store: &ShopStore,
        format: OutputFormat,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut doc = store
            .load_shop(&self.target.server, &self.target.shop)
            .await?;
        let message = self.command.apply(store.catalog(), &mut doc)?;

        let receipt = store
            .save_document(&self.target.server, &self.target.shop, &doc)
            .await?;
        if let OutputFormat::Text = format {
            println!("{}", message);
        }
        print_receipt(&receipt, format)
    }
}

use shopdesk_core::{grid_map, matches_filter, next_page, pages_of, Entry, ShopStore};
use std::io::{self, Write};

use super::{print_json, print_receipt, OutputFormat, ShopRef};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub fn list_servers(store: &ShopStore, format: OutputFormat) -> CmdResult {
    let servers = store.list_servers();
    match format {
        OutputFormat::Json => print_json(&servers)?,
        OutputFormat::Text => {
            if servers.is_empty() {
                println!("No servers configured.");
                return Ok(());
            }
            println!("{:<16} {:<24} {:<32} PATH", "ID", "NAME", "HOST");
            println!("{}", "-".repeat(90));
            for s in servers {
                println!(
                    "{:<16} {:<24} {:<32} {}",
                    s.id,
                    s.name,
                    format!("{}:{}", s.host, s.port),
                    s.base_path
                );
            }
        }
    }
    Ok(())
}

pub fn list_currencies(store: &ShopStore, format: OutputFormat) -> CmdResult {
    let currencies = store.list_currencies();
    match format {
        OutputFormat::Json => print_json(&currencies)?,
        OutputFormat::Text => {
            if currencies.is_empty() {
                println!("No currencies configured.");
                return Ok(());
            }
            for c in currencies {
                println!("{:<16} {:<24} economy: {}", c.id, c.name, c.economy);
            }
        }
    }
    Ok(())
}

pub async fn list_shops(store: &ShopStore, server: &str, format: OutputFormat) -> CmdResult {
    let shops = store.list_shops(server).await?;
    match format {
        OutputFormat::Json => print_json(&shops)?,
        OutputFormat::Text => {
            if shops.is_empty() {
                println!("No shops found on '{}'.", server);
                return Ok(());
            }
            for shop in &shops {
                println!("{:<32} {}", shop.id, shop.file);
            }
            println!("\n{} shop(s)", shops.len());
        }
    }
    Ok(())
}

fn price_label(entry: &Entry) -> String {
    let fmt = |p: &shopdesk_core::Price| format!("{} {}", p.price, p.currency);
    match (&entry.buy, &entry.sell) {
        (None, None) => "-".to_string(),
        (Some(b), None) => format!("buy {}", fmt(b)),
        (None, Some(s)) => format!("sell {}", fmt(s)),
        (Some(b), Some(s)) => format!("buy {} / sell {}", fmt(b), fmt(s)),
    }
}

pub async fn show_shop(store: &ShopStore, target: &ShopRef, format: OutputFormat) -> CmdResult {
    match format {
        OutputFormat::Json => {
            let raw = store.load_raw(&target.server, &target.shop).await?;
            print_json(&raw)?;
        }
        OutputFormat::Text => {
            let doc = store.load_shop(&target.server, &target.shop).await?;
            println!("{}", doc.title);
            println!("{}", "=".repeat(doc.title.chars().count().max(8)));
            if let Some(kind) = doc.kind() {
                println!("Type: {}", kind);
            }
            println!("Entries: {}", doc.entries.len());
            println!("Pages: {:?}", pages_of(&doc.entries));
            println!();
            for entry in &doc.entries {
                let pages: Vec<String> = entry.pages.iter().map(|p| p.to_string()).collect();
                let slot = entry.slot.map_or_else(|| "-".to_string(), |s| s.to_string());
                println!(
                    "{:<20} {:<28} slot {:>2}  pages {:<8} {}",
                    entry.id,
                    entry.item,
                    slot,
                    pages.join(","),
                    price_label(entry)
                );
            }
        }
    }
    Ok(())
}

pub async fn show_grid(
    store: &ShopStore,
    target: &ShopRef,
    page: u32,
    filter: Option<&str>,
    format: OutputFormat,
) -> CmdResult {
    let doc = store.load_shop(&target.server, &target.shop).await?;
    let grid = grid_map(page, &doc.entries);

    if let OutputFormat::Json = format {
        return print_json(&grid);
    }

    let highlight: Vec<&str> = match filter {
        Some(term) => doc
            .entries
            .iter()
            .filter(|e| matches_filter(e, term))
            .map(|e| e.id.as_str())
            .collect(),
        None => Vec::new(),
    };

    println!(
        "{} - page {} of {:?} (next new page: {})\n",
        doc.title,
        grid.page(),
        pages_of(&doc.entries),
        next_page(&doc.entries)
    );
    for row in grid.rows() {
        let cells: Vec<String> = row
            .iter()
            .map(|ids| {
                let mark = if ids.iter().any(|id| highlight.contains(&id.as_str())) {
                    "*"
                } else {
                    " "
                };
                match ids.len() {
                    0 => format!(" {:<10}", "."),
                    1 => format!("{}{:<10.10}", mark, ids[0]),
                    n => format!("{}{:<10.10}", mark, format!("!{}", n)),
                }
            })
            .collect();
        println!("{}", cells.join(" "));
    }

    let stats = grid.stats();
    println!(
        "\n{} filled, {} empty, {} conflict(s)",
        stats.filled, stats.empty, stats.conflicts
    );
    for conflict in grid.conflicts() {
        println!("  slot {}: {}", conflict.slot, conflict.ids.join(", "));
    }
    Ok(())
}

pub async fn create_shop(
    store: &ShopStore,
    target: &ShopRef,
    title: Option<&str>,
    format: OutputFormat,
) -> CmdResult {
    let receipt = store.create_shop(&target.server, &target.shop, title).await?;
    print_receipt(&receipt, format)
}

pub async fn delete_shop(
    store: &ShopStore,
    target: &ShopRef,
    force: bool,
    format: OutputFormat,
) -> CmdResult {
    if !force {
        print!(
            "Delete shop '{}' on '{}'? A backup is kept. [y/N] ",
            target.shop, target.server
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let receipt = store.delete_shop(&target.server, &target.shop).await?;
    print_receipt(&receipt, format)
}

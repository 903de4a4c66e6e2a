//! Page and slot projection of a shop's entries.
//!
//! A page is a 6x9 grid of 54 slots. Entries name the slot they occupy and
//! the pages they appear on. Nothing stops two entries from claiming the same
//! slot on the same page; such slots are reported as conflicts.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::ShopError;
use crate::models::{Entries, Entry};

pub const ROWS: usize = 6;
pub const COLUMNS: usize = 9;
pub const SLOT_COUNT: usize = ROWS * COLUMNS;

/// Validates a user-supplied slot number.
pub fn checked_slot(slot: i64) -> Result<u8, ShopError> {
    if (0..SLOT_COUNT as i64).contains(&slot) {
        Ok(slot as u8)
    } else {
        Err(ShopError::InvalidEntry(format!(
            "slot must be between 0 and {}, got {}",
            SLOT_COUNT - 1,
            slot
        )))
    }
}

/// All pages referenced by any entry, sorted. Page 1 is always present.
pub fn pages_of(entries: &Entries) -> Vec<u32> {
    let mut pages = BTreeSet::from([1]);
    for entry in entries {
        pages.extend(entry.pages.iter().copied());
    }
    pages.into_iter().collect()
}

/// The page number a freshly added page gets.
pub fn next_page(entries: &Entries) -> u32 {
    pages_of(entries).last().copied().unwrap_or(1).saturating_add(1)
}

/// Slot occupancy of one page. Ids appear in entry order; entries without a
/// usable slot are left out.
pub fn grid_map(page: u32, entries: &Entries) -> Grid {
    let mut buckets = vec![Vec::new(); SLOT_COUNT];
    for entry in entries.iter().filter(|e| e.on_page(page)) {
        if let Some(slot) = entry.slot {
            buckets[slot as usize].push(entry.id.clone());
        }
    }
    Grid { page, buckets }
}

/// Case-insensitive match of `term` against an entry's id or item.
pub fn matches_filter(entry: &Entry, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    entry.id.to_lowercase().contains(&term) || entry.item.to_lowercase().contains(&term)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub slot: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub filled: usize,
    pub empty: usize,
    pub conflicts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    page: u32,
    buckets: Vec<Vec<String>>,
}

impl Grid {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn buckets(&self) -> &[Vec<String>] {
        &self.buckets
    }

    pub fn bucket(&self, slot: usize) -> &[String] {
        self.buckets.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn conflicts(&self) -> Vec<Conflict> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(slot, ids)| Conflict {
                slot,
                ids: ids.clone(),
            })
            .collect()
    }

    pub fn stats(&self) -> PageStats {
        let filled = self.buckets.iter().filter(|ids| !ids.is_empty()).count();
        let conflicts = self.buckets.iter().filter(|ids| ids.len() > 1).count();
        PageStats {
            filled,
            empty: self.buckets.len() - filled,
            conflicts,
        }
    }

    /// Rows of the grid, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Vec<String>]> {
        self.buckets.chunks(COLUMNS)
    }
}

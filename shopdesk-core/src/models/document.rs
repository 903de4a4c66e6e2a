use serde_json::{Map, Value};

use super::entry::{DisplayOverride, Entry, EntryDraft, Field};
use crate::error::ShopError;
use crate::grid::checked_slot;

pub const DEFAULT_TITLE: &str = "New Shop";
pub const DEFAULT_TYPE: &str = "GENERIC_9x6";

/// Entries of a shop in document order, keyed by entry id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entries(Vec<Entry>);

impl Entries {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.0.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entry> {
        self.0.iter_mut().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Inserts an entry. An entry with the same id is replaced in place and
    /// returned; otherwise the entry goes to the end.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        match self.0.iter().position(|e| e.id == entry.id) {
            Some(idx) => Some(std::mem::replace(&mut self.0[idx], entry)),
            None => {
                self.0.push(entry);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Entry> {
        let idx = self.0.iter().position(|e| e.id == id)?;
        Some(self.0.remove(idx))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.0.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.id.as_str())
    }
}

impl<'a> IntoIterator for &'a Entries {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Entry> for Entries {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut entries = Entries::new();
        for entry in iter {
            entries.insert(entry);
        }
        entries
    }
}

/// Parses the `entries` object of a shop document.
///
/// A missing or `null` entries field yields no entries.
pub fn parse_entries(entries: Option<&Value>) -> Result<Entries, ShopError> {
    let obj = match entries {
        None | Some(Value::Null) => return Ok(Entries::new()),
        Some(Value::Object(obj)) => obj,
        Some(_) => {
            return Err(ShopError::MalformedDocument(
                "entries must be an object".into(),
            ))
        }
    };

    obj.iter()
        .map(|(id, value)| Entry::from_value(id, value))
        .collect()
}

/// Rebuilds a document from the loaded original and the edited entries.
///
/// Top-level keys other than `title` and `entries` come from `original`
/// untouched.
pub fn build_document(original: &Map<String, Value>, title: &str, entries: &Entries) -> Value {
    let mut out = original.clone();
    out.insert("title".into(), Value::String(title.to_string()));

    let built: Map<String, Value> = entries
        .iter()
        .map(|e| (e.id.clone(), e.to_value()))
        .collect();
    out.insert("entries".into(), Value::Object(built));

    Value::Object(out)
}

/// A shop document opened for editing.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopDocument {
    pub title: String,
    pub entries: Entries,
    original: Map<String, Value>,
}

impl ShopDocument {
    pub fn from_value(value: Value) -> Result<Self, ShopError> {
        let original = match value {
            Value::Object(obj) => obj,
            _ => {
                return Err(ShopError::MalformedDocument(
                    "shop document must be a JSON object".into(),
                ))
            }
        };

        let title = original
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let entries = parse_entries(original.get("entries"))?;

        Ok(Self {
            title,
            entries,
            original,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ShopError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// The document template written when a shop is created.
    pub fn template(title: Option<&str>) -> Value {
        let title = title.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TITLE);
        let mut out = Map::new();
        out.insert("title".into(), Value::String(title.to_string()));
        out.insert("type".into(), Value::String(DEFAULT_TYPE.into()));
        out.insert("entries".into(), Value::Object(Map::new()));
        Value::Object(out)
    }

    /// The document exactly as it was loaded.
    pub fn original(&self) -> &Map<String, Value> {
        &self.original
    }

    /// The shop's `type` field.
    pub fn kind(&self) -> Option<&str> {
        self.original.get("type").and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        build_document(&self.original, &self.title, &self.entries)
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Creates or replaces an entry from editor input.
    ///
    /// When `previous_id` names an existing entry its raw fields and pages
    /// carry over, and the entry is re-inserted at the end under the draft's
    /// id. Otherwise a new entry is placed on `draft.page`.
    pub fn upsert_entry(
        &mut self,
        previous_id: Option<&str>,
        draft: EntryDraft,
    ) -> Result<&Entry, ShopError> {
        let id = draft.id.trim().to_string();
        if id.is_empty() {
            return Err(ShopError::InvalidEntry("entry ID required".into()));
        }
        let slot = checked_slot(draft.slot)?;
        if draft.page == 0 {
            return Err(ShopError::InvalidEntry("pages start at 1".into()));
        }
        if previous_id != Some(id.as_str()) && self.entries.contains(&id) {
            return Err(ShopError::InvalidEntry(format!(
                "entry '{}' already exists",
                id
            )));
        }

        let previous = previous_id.and_then(|p| self.entries.remove(p));
        let mut entry = match previous {
            Some(entry) => entry,
            None => Entry::new(id.clone(), "", slot, draft.page),
        };

        for field in [Field::Item, Field::Buy, Field::Sell, Field::Display] {
            entry.touch(field);
        }
        entry.id = id.clone();
        entry.item = draft.item;
        entry.slot = Some(slot);
        if entry.pages.is_empty() {
            entry.pages = vec![draft.page];
        }
        entry.buy = draft.buy;
        entry.sell = draft.sell;
        entry.display = DisplayOverride {
            item: draft.display_item,
            name: draft.display_name,
            lore: draft
                .display_lore
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        };

        self.entries.insert(entry);
        self.entries
            .get(&id)
            .ok_or_else(|| ShopError::EntryNotFound(id.clone()))
    }

    pub fn remove_entry(&mut self, id: &str) -> Result<Entry, ShopError> {
        self.entries
            .remove(id)
            .ok_or_else(|| ShopError::EntryNotFound(id.to_string()))
    }

    /// Copies an entry under a new id onto another slot of the same pages.
    pub fn duplicate_entry(&mut self, id: &str, new_id: &str, slot: i64) -> Result<&Entry, ShopError> {
        let new_id = new_id.trim();
        if new_id.is_empty() {
            return Err(ShopError::InvalidEntry("entry ID required".into()));
        }
        let slot = checked_slot(slot)?;
        if self.entries.contains(new_id) {
            return Err(ShopError::InvalidEntry(format!(
                "entry '{}' already exists",
                new_id
            )));
        }

        let mut copy = self
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| ShopError::EntryNotFound(id.to_string()))?;
        copy.id = new_id.to_string();
        copy.slot = Some(slot);

        self.entries.insert(copy);
        self.entries
            .get(new_id)
            .ok_or_else(|| ShopError::EntryNotFound(new_id.to_string()))
    }

    /// Moves an entry to another slot, leaving its pages alone.
    pub fn move_entry(&mut self, id: &str, slot: i64) -> Result<(), ShopError> {
        let slot = checked_slot(slot)?;
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ShopError::EntryNotFound(id.to_string()))?;
        entry.slot = Some(slot);
        Ok(())
    }

    /// Replaces the pages an entry appears on.
    pub fn set_pages(&mut self, id: &str, pages: &[i64]) -> Result<(), ShopError> {
        let mut checked: Vec<u32> = Vec::with_capacity(pages.len());
        for page in pages {
            let page = u32::try_from(*page)
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| ShopError::InvalidEntry(format!("invalid page: {}", page)))?;
            if !checked.contains(&page) {
                checked.push(page);
            }
        }
        if checked.is_empty() {
            return Err(ShopError::InvalidEntry(
                "an entry needs at least one page".into(),
            ));
        }

        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ShopError::EntryNotFound(id.to_string()))?;
        entry.pages = checked;
        entry.touch(Field::Page);
        Ok(())
    }
}

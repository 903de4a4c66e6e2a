use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

use crate::error::ShopError;
use crate::grid::SLOT_COUNT;

/// A buy or sell price.
///
/// Keys inside the price object that the editor does not know about are kept
/// in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub price: Number,
    pub economy: String,
    pub currency: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Price {
    pub fn new(price: Number, economy: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            price,
            economy: economy.into(),
            currency: currency.into(),
            extra: Map::new(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let price: Price = serde_json::from_value(value.clone()).ok()?;
        match price.price.as_f64() {
            Some(p) if p >= 0.0 => Some(price),
            _ => None,
        }
    }

    /// Reads an optional price field. `Err(())` means the stored value has a
    /// shape the editor does not understand.
    ///
    /// Historical documents store prices as arrays; only the first element is
    /// kept and the rest are dropped. Saving writes the single object back.
    fn from_field(value: Option<&Value>) -> Result<Option<Self>, ()> {
        let value = match value {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(items)) => match items.first() {
                None | Some(Value::Null) => return Ok(None),
                Some(first) => first,
            },
            Some(v) => v,
        };
        Self::from_value(value).map(Some).ok_or(())
    }

    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("price".into(), Value::Number(self.price.clone()));
        out.insert("economy".into(), Value::String(self.economy.clone()));
        out.insert("currency".into(), Value::String(self.currency.clone()));
        for (key, value) in &self.extra {
            if !out.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }
        Value::Object(out)
    }
}

/// Display override shown instead of the underlying item.
///
/// Holds whatever the document had, untrimmed. Normalization happens when
/// the entry is written back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayOverride {
    pub item: String,
    pub name: String,
    pub lore: Vec<String>,
}

impl DisplayOverride {
    fn from_field(value: Option<&Value>) -> Result<Self, ()> {
        let obj = match value {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Object(obj)) => obj,
            Some(_) => return Err(()),
        };
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let lore = match obj.get("lore") {
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self {
            item: text("item"),
            name: text("name"),
            lore,
        })
    }

    /// The normalized `display` object, or `None` when nothing is set.
    pub fn to_value(&self) -> Option<Value> {
        let item = self.item.trim();
        let name = self.name.trim();
        let lore: Vec<Value> = self
            .lore
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Value::String(l.clone()))
            .collect();

        if item.is_empty() && name.is_empty() && lore.is_empty() {
            return None;
        }

        let mut out = Map::new();
        if !item.is_empty() {
            out.insert("item".into(), Value::String(item.to_string()));
        }
        if !name.is_empty() {
            out.insert("name".into(), Value::String(name.to_string()));
        }
        if !lore.is_empty() {
            out.insert("lore".into(), Value::Array(lore));
        }
        Some(Value::Object(out))
    }

    pub fn is_empty(&self) -> bool {
        self.to_value().is_none()
    }
}

/// Entry fields that can be stored in a shape the editor does not model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Item,
    Page,
    Buy,
    Sell,
    Display,
}

impl Field {
    fn key(self) -> &'static str {
        match self {
            Field::Item => "item",
            Field::Page => "page",
            Field::Buy => "buy",
            Field::Sell => "sell",
            Field::Display => "display",
        }
    }
}

/// One item placement in a shop.
///
/// Loading never rejects an entry object. A known field whose stored value
/// does not fit the model is left in `raw` exactly as it was and written back
/// untouched until an edit replaces it. A missing or out-of-range slot loads
/// as `None`; such an entry occupies no grid slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub item: String,
    pub slot: Option<u8>,
    pub pages: Vec<u32>,
    pub buy: Option<Price>,
    pub sell: Option<Price>,
    pub display: DisplayOverride,
    /// The entry object as it was loaded, including keys the editor ignores.
    pub raw: Map<String, Value>,
    opaque: BTreeSet<Field>,
}

impl Entry {
    /// A fresh entry as the editor creates it.
    pub fn new(id: impl Into<String>, item: impl Into<String>, slot: u8, page: u32) -> Self {
        let mut raw = Map::new();
        raw.insert("type".into(), Value::String("ITEM".into()));
        Self {
            id: id.into(),
            item: item.into(),
            slot: Some(slot),
            pages: vec![page],
            buy: None,
            sell: None,
            display: DisplayOverride::default(),
            raw,
            opaque: BTreeSet::new(),
        }
    }

    pub fn from_value(id: &str, value: &Value) -> Result<Self, ShopError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ShopError::malformed(id, "entry must be an object"))?;
        let mut opaque = BTreeSet::new();
        let mut keep = |field: Field| {
            tracing::debug!(entry = %id, key = field.key(), "keeping unrecognized value as-is");
            opaque.insert(field);
        };

        let item = match obj.get("item") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                keep(Field::Item);
                String::new()
            }
        };

        let slot = obj
            .get("slot")
            .and_then(Value::as_u64)
            .filter(|s| *s < SLOT_COUNT as u64)
            .map(|s| s as u8);

        let pages = parse_pages(obj.get("page")).unwrap_or_else(|()| {
            keep(Field::Page);
            vec![1]
        });
        let buy = Price::from_field(obj.get("buy")).unwrap_or_else(|()| {
            keep(Field::Buy);
            None
        });
        let sell = Price::from_field(obj.get("sell")).unwrap_or_else(|()| {
            keep(Field::Sell);
            None
        });
        let display = DisplayOverride::from_field(obj.get("display")).unwrap_or_else(|()| {
            keep(Field::Display);
            DisplayOverride::default()
        });

        Ok(Self {
            id: id.to_string(),
            item,
            slot,
            pages,
            buy,
            sell,
            display,
            raw: obj.clone(),
            opaque,
        })
    }

    /// Whether `field` was loaded in a shape the editor keeps as-is.
    pub fn is_opaque(&self, field: Field) -> bool {
        self.opaque.contains(&field)
    }

    /// Marks `field` as edited so the modeled value is written back.
    pub fn touch(&mut self, field: Field) {
        self.opaque.remove(&field);
    }

    /// Overlays the known fields onto the retained raw object.
    pub fn to_value(&self) -> Value {
        let mut out = self.raw.clone();
        if !self.is_opaque(Field::Item) {
            out.insert("item".into(), Value::String(self.item.clone()));
        }
        if let Some(slot) = self.slot {
            out.insert("slot".into(), Value::from(slot));
        }
        if !self.is_opaque(Field::Page) {
            out.insert(
                "page".into(),
                Value::Array(self.pages.iter().map(|p| Value::from(*p)).collect()),
            );
        }
        if !self.is_opaque(Field::Buy) {
            set_or_remove(&mut out, "buy", self.buy.as_ref().map(Price::to_value));
        }
        if !self.is_opaque(Field::Sell) {
            set_or_remove(&mut out, "sell", self.sell.as_ref().map(Price::to_value));
        }
        if !self.is_opaque(Field::Display) {
            set_or_remove(&mut out, "display", self.display.to_value());
        }

        Value::Object(out)
    }

    pub fn on_page(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }
}

fn set_or_remove(obj: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    match value {
        Some(v) => {
            obj.insert(key.to_string(), v);
        }
        None => {
            obj.shift_remove(key);
        }
    }
}

fn parse_pages(value: Option<&Value>) -> Result<Vec<u32>, ()> {
    let items = match value {
        None | Some(Value::Null) => return Ok(vec![1]),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(()),
    };

    let mut pages: Vec<u32> = Vec::with_capacity(items.len());
    for item in items {
        let page = item
            .as_u64()
            .filter(|p| *p >= 1 && *p <= u32::MAX as u64)
            .ok_or(())? as u32;
        if !pages.contains(&page) {
            pages.push(page);
        }
    }

    if pages.is_empty() {
        pages.push(1);
    }
    Ok(pages)
}

/// Editor input for creating or replacing an entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDraft {
    pub id: String,
    pub item: String,
    pub slot: i64,
    /// Page a brand-new entry is placed on.
    pub page: u32,
    pub buy: Option<Price>,
    pub sell: Option<Price>,
    pub display_item: String,
    pub display_name: String,
    pub display_lore: Vec<String>,
}

impl EntryDraft {
    pub fn new(id: impl Into<String>, item: impl Into<String>, slot: i64) -> Self {
        Self {
            id: id.into(),
            item: item.into(),
            slot,
            page: 1,
            ..Default::default()
        }
    }
}

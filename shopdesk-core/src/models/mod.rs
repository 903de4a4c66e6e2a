mod document;
mod entry;

pub use document::{build_document, parse_entries, Entries, ShopDocument, DEFAULT_TITLE, DEFAULT_TYPE};
pub use entry::{DisplayOverride, Entry, EntryDraft, Field, Price};

//! Mapping of canonical items onto the sink's typed property vocabulary.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use hubmirror_core::{PropertyNames, SyncItem};

/// Maximum characters in one rich-text run.
pub const MAX_TEXT_CHARS: usize = 2000;
/// Maximum characters in a select option name.
pub const MAX_SELECT_CHARS: usize = 100;

/// One typed property value. `None` means "explicitly empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Title(String),
    Number(Option<u64>),
    Select(Option<String>),
    Url(Option<String>),
    Date(Option<DateTime<Utc>>),
}

/// Property name → value, ready to be written to a page.
pub type PropertySet = BTreeMap<String, FieldValue>;

impl FieldValue {
    /// Wire representation of this value.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Title(text) if text.is_empty() => json!({ "title": [] }),
            FieldValue::Title(text) => json!({
                "title": [{ "type": "text", "text": { "content": text } }]
            }),
            FieldValue::Number(n) => json!({ "number": n }),
            FieldValue::Select(Some(name)) => json!({ "select": { "name": name } }),
            FieldValue::Select(None) => json!({ "select": null }),
            FieldValue::Url(url) => json!({ "url": url }),
            FieldValue::Date(Some(at)) => json!({
                "date": { "start": at.to_rfc3339_opts(SecondsFormat::Secs, true) }
            }),
            FieldValue::Date(None) => json!({ "date": null }),
        }
    }
}

/// Wire representation of a whole property set.
pub fn to_json_properties(set: &PropertySet) -> Value {
    let map: Map<String, Value> = set
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect();
    Value::Object(map)
}

/// Converts items into property sets using configured property names.
#[derive(Debug, Clone, Default)]
pub struct PropertyMapper {
    names: PropertyNames,
}

impl PropertyMapper {
    pub fn new(names: PropertyNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &PropertyNames {
        &self.names
    }

    /// Total over every item: absent or unusable values map to empty fields.
    pub fn map(&self, item: &SyncItem) -> PropertySet {
        let n = &self.names;
        let mut set = PropertySet::new();
        set.insert(n.title.clone(), FieldValue::Title(clip(item.title.trim(), MAX_TEXT_CHARS)));
        set.insert(n.number.clone(), FieldValue::Number(Some(item.number)));
        set.insert(
            n.repository.clone(),
            FieldValue::Select(item.repository.as_deref().and_then(select_name)),
        );
        set.insert(n.author.clone(), FieldValue::Select(select_name(&item.author)));
        set.insert(n.state.clone(), FieldValue::Select(select_name(item.state.as_str())));
        set.insert(n.url.clone(), FieldValue::Url(non_blank(&item.url)));
        set.insert(n.date.clone(), FieldValue::Date(item.timestamp));
        set
    }
}

/// Select option names may not contain commas and are length-limited.
fn select_name(raw: &str) -> Option<String> {
    let cleaned = raw.replace(',', " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(clip(cleaned, MAX_SELECT_CHARS))
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

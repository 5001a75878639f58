//! The recovered-structure data model.
//!
//! A [`StructureRecord`] is one decoded DMI/SMBIOS structure instance. It is
//! created fresh for every resolution request and owned exclusively by the
//! caller; the pipeline keeps no reference after returning. The JSON
//! rendering is lossless: fields, strings, and raw bytes all survive a
//! round trip through text (bytes as space-separated uppercase hex).

use crate::error::Result;
use crate::raw;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Handle-keyed map of recovered structures, as returned by every query
pub type HandleMap = BTreeMap<String, StructureRecord>;

/// A single field value: text, an ordered list, or a nested mapping
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Plain text value
    Text(String),
    /// Ordered list of values
    List(Vec<FieldValue>),
    /// Nested name/value mapping
    Map(BTreeMap<String, FieldValue>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One decoded DMI/SMBIOS structure instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureRecord {
    /// DMI type id of the structure
    pub type_id: u8,
    /// Opaque structure handle, unique within one table snapshot
    pub handle: String,
    /// Declared byte length of the fixed-format header+data region
    pub size: usize,
    /// Named field values recovered for this structure
    pub fields: BTreeMap<String, FieldValue>,
    /// String-section entries; externally 1-indexed and contiguous
    pub strings: Vec<String>,
    /// The fixed-format header+data region, kept independently of `fields`
    #[serde(serialize_with = "serialize_raw_bytes")]
    pub raw_bytes: Option<Bytes>,
}

impl StructureRecord {
    /// Creates an empty record for the given type and handle
    pub fn new(type_id: u8, handle: impl Into<String>) -> Self {
        Self {
            type_id,
            handle: handle.into(),
            size: 0,
            fields: BTreeMap::new(),
            strings: Vec::new(),
            raw_bytes: None,
        }
    }

    /// Returns the string at the given 1-based index, per the SMBIOS
    /// string-section convention (index 0 means "no string")
    pub fn string(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.strings.get(i))
            .map(String::as_str)
    }

    /// Inserts a text field
    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Attaches the raw header+data region, mirroring it into the
    /// `Header and Data` field as hex text
    pub fn attach_raw_bytes(&mut self, bytes: Vec<u8>) {
        self.insert_field("Header and Data", raw::render_hex(&bytes));
        self.raw_bytes = Some(Bytes::from(bytes));
    }
}

fn serialize_raw_bytes<S>(value: &Option<Bytes>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(bytes) => serializer.serialize_some(&raw::render_hex(bytes)),
        None => serializer.serialize_none(),
    }
}

/// Renders a handle-keyed record map as a JSON document
pub fn to_json(records: &HandleMap, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(records)?
    } else {
        serde_json::to_string(records)?
    };
    Ok(rendered)
}

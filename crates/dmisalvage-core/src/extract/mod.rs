//! Field-map extraction from undecoded structure views.
//!
//! When a source has no field layout for a type, its document or serialized
//! view still carries everything the table held. This module rebuilds
//! handle-keyed [`StructureRecord`]s from those views: [`from_document`]
//! walks the element tree, and [`from_text`] pattern-scans the serialized
//! text when no tree is available.

mod text;

use crate::document::{Document, Element};
use crate::raw;
use crate::record::{HandleMap, StructureRecord};
use std::collections::BTreeMap;
use tracing::debug;

pub use text::from_text;

/// Tags recognized as string-section entries
const STRING_TAGS: [&str; 2] = ["String", "Record"];

/// Tag recognized as a run of raw header+data bytes
const ROW_TAG: &str = "Row";

fn is_string_tag(name: &str) -> bool {
    STRING_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag))
}

fn is_row_tag(name: &str) -> bool {
    name.eq_ignore_ascii_case(ROW_TAG)
}

/// Rebuilds records for one type id from a document view.
///
/// Structure elements are those whose `type` attribute equals the decimal
/// type id. For each one, the `handle` and `size` attributes (size defaults
/// to 0 when absent or non-numeric) seed the record, string and row children
/// fill `strings` and `raw_bytes`, and every other child becomes a field
/// entry, with its attributes flattened to `{tag}_{attr}` entries.
///
/// Returns `None` when the document holds no matching elements.
pub fn from_document(document: &Document, type_id: u8) -> Option<HandleMap> {
    let matches = document.structures(type_id);
    if matches.is_empty() {
        return None;
    }

    let mut records = HandleMap::new();
    for element in matches {
        let Some(handle) = element.get_attr("handle") else {
            debug!("skipping type {} element without a handle", type_id);
            continue;
        };
        let record = record_from_element(element, type_id, handle);
        records.insert(record.handle.clone(), record);
    }

    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}

fn record_from_element(element: &Element, type_id: u8, handle: &str) -> StructureRecord {
    let mut record = StructureRecord::new(type_id, handle);
    record.size = element
        .get_attr("size")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    let mut row_hex = String::new();
    let mut strings: BTreeMap<usize, String> = BTreeMap::new();
    let mut sequence = 0usize;

    for child in element.elements() {
        if is_string_tag(&child.name) {
            sequence += 1;
            let index = child
                .get_attr("index")
                .and_then(|value| value.parse().ok())
                .unwrap_or(sequence);
            strings.insert(index, child.text_content());
        } else if is_row_tag(&child.name) {
            if !row_hex.is_empty() {
                row_hex.push(' ');
            }
            row_hex.push_str(child.text_content().trim());
        } else {
            record.insert_field(child.name.clone(), child.text_content());
            for (attr, value) in &child.attrs {
                record.insert_field(format!("{}_{}", child.name, attr), value.clone());
            }
        }
    }

    if !row_hex.is_empty() {
        match raw::bytes_from_hex(&row_hex) {
            Ok(bytes) => record.attach_raw_bytes(bytes),
            Err(e) => debug!("dropping unparsable row data for handle {}: {}", handle, e),
        }
    }

    record.strings = strings.into_values().collect();
    record
}

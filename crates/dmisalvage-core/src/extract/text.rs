//! Last-resort extraction from serialized text.
//!
//! When no document tree is available, the serialized rendition of a
//! source's output is scanned with four independent patterns: handle
//! tokens, size tokens, row tokens holding hex byte pairs, and indexed
//! string tokens.
//!
//! The scans are correlated positionally: the Nth handle pairs with the Nth
//! size, and the rows and strings pooled across the whole text attach to the
//! first produced record, on the assumption that the text covers exactly one
//! logical group of instances of the requested type. That assumption cannot
//! be verified from the text itself: a serialization that interleaves other
//! types' rows or strings in the same blob, or whose handle and size counts
//! diverge, will associate data with the wrong record. Prefer the document
//! view whenever the source can produce one.

use crate::record::{HandleMap, StructureRecord};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::trace;

static HANDLE_RE: OnceLock<Regex> = OnceLock::new();
static SIZE_RE: OnceLock<Regex> = OnceLock::new();
static ROW_RE: OnceLock<Regex> = OnceLock::new();
static STRING_RE: OnceLock<Regex> = OnceLock::new();
static HEX_PAIR_RE: OnceLock<Regex> = OnceLock::new();

fn handle_re() -> &'static Regex {
    HANDLE_RE.get_or_init(|| {
        Regex::new(r#"handle="(0[xX][0-9A-Fa-f]+)""#).expect("hard-coded pattern")
    })
}

fn size_re() -> &'static Regex {
    SIZE_RE.get_or_init(|| Regex::new(r#"size="([0-9]+)""#).expect("hard-coded pattern"))
}

fn row_re() -> &'static Regex {
    ROW_RE.get_or_init(|| Regex::new(r"(?is)<row\b[^>]*>([^<]*)</row>").expect("hard-coded pattern"))
}

fn string_re() -> &'static Regex {
    STRING_RE.get_or_init(|| {
        Regex::new(r#"(?is)<(?:string|record)\b[^>]*\bindex="([0-9]+)"[^>]*>([^<]*)</(?:string|record)>"#)
            .expect("hard-coded pattern")
    })
}

fn hex_pair_re() -> &'static Regex {
    HEX_PAIR_RE.get_or_init(|| Regex::new(r"0[xX]([0-9A-Fa-f]{1,2})\b").expect("hard-coded pattern"))
}

/// Rebuilds records for one type id by pattern-scanning serialized text.
///
/// Produces one record per handle token found; the Nth handle pairs with
/// the Nth size token (0 when absent), and all pooled row bytes and indexed
/// strings attach to the first record. Strings with empty or
/// whitespace-only text are dropped. Returns `None` when the text holds no
/// handle tokens at all.
pub fn from_text(text: &str, type_id: u8) -> Option<HandleMap> {
    let handles: Vec<&str> = handle_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if handles.is_empty() {
        return None;
    }

    let sizes: Vec<usize> = size_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().parse().unwrap_or(0))
        .collect();

    let mut pooled_bytes: Vec<u8> = Vec::new();
    for caps in row_re().captures_iter(text) {
        let Some(body) = caps.get(1) else { continue };
        for pair in hex_pair_re().captures_iter(body.as_str()) {
            if let Some(value) = pair
                .get(1)
                .and_then(|m| u8::from_str_radix(m.as_str(), 16).ok())
            {
                pooled_bytes.push(value);
            }
        }
    }

    let mut pooled_strings: BTreeMap<usize, String> = BTreeMap::new();
    for caps in string_re().captures_iter(text) {
        let (Some(index), Some(body)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if body.as_str().trim().is_empty() {
            continue;
        }
        if let Ok(index) = index.as_str().parse::<usize>() {
            pooled_strings.insert(index, body.as_str().trim().to_string());
        }
    }

    trace!(
        "text scan for type {}: {} handles, {} sizes, {} row bytes, {} strings",
        type_id,
        handles.len(),
        sizes.len(),
        pooled_bytes.len(),
        pooled_strings.len()
    );

    let mut records = HandleMap::new();
    for (position, handle) in handles.iter().enumerate() {
        let mut record = StructureRecord::new(type_id, *handle);
        record.size = sizes.get(position).copied().unwrap_or(0);
        if position == 0 {
            if !pooled_bytes.is_empty() {
                record.attach_raw_bytes(pooled_bytes.clone());
            }
            record.strings = pooled_strings.values().cloned().collect();
        }
        records.insert(record.handle.clone(), record);
    }

    Some(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_handle_tokens_yields_none() {
        assert!(from_text("<Structure type=\"200\"/>", 200).is_none());
        assert!(from_text("", 200).is_none());
    }

    #[test]
    fn test_single_instance_with_rows_and_no_strings() {
        let text = r#"<Structure type="200" handle="0x00C8">
            <Row>0x48 0x45 0x4C 0x4C 0x4F</Row>
        </Structure>"#;

        let records = from_text(text, 200).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records["0x00C8"];
        assert_eq!(record.type_id, 200);
        assert_eq!(record.size, 0);
        assert_eq!(record.raw_bytes.as_deref(), Some(&b"HELLO"[..]));
        assert_eq!(
            record.fields.get("Header and Data"),
            Some(&FieldValue::Text("48 45 4C 4C 4F".to_string()))
        );
        assert!(record.strings.is_empty());
    }

    #[test]
    fn test_rows_pool_across_elements() {
        let text = r#"handle="0x0080" size="6"
            <Row>0x01 0x02</Row>
            <Row>0x03</Row>
            <Row>0xFF</Row>"#;

        let records = from_text(text, 128).unwrap();
        let record = &records["0x0080"];
        assert_eq!(record.size, 6);
        assert_eq!(record.raw_bytes.as_deref(), Some(&[0x01, 0x02, 0x03, 0xFF][..]));
    }

    #[test]
    fn test_positional_handle_size_pairing() {
        let text = r#"
            <Structure type="200" handle="0x00C8" size="9"/>
            <Structure type="200" handle="0x00C9" size="5"/>
            <Structure type="200" handle="0x00CA"/>
        "#;

        let records = from_text(text, 200).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records["0x00C8"].size, 9);
        assert_eq!(records["0x00C9"].size, 5);
        assert_eq!(records["0x00CA"].size, 0);
    }

    #[test]
    fn test_pooled_data_attaches_to_first_record_only() {
        let text = r#"
            handle="0x00C8" handle="0x00C9"
            <Row>0xAA 0xBB</Row>
            <String index="1">shared</String>
        "#;

        let records = from_text(text, 200).unwrap();
        assert_eq!(records["0x00C8"].strings, vec!["shared"]);
        assert!(records["0x00C8"].raw_bytes.is_some());
        assert!(records["0x00C9"].strings.is_empty());
        assert!(records["0x00C9"].raw_bytes.is_none());
    }

    #[test]
    fn test_blank_string_tokens_dropped() {
        let text = r#"
            handle="0x0090"
            <String index="1">   </String>
            <String index="2">kept</String>
            <Record index="3">also kept</Record>
        "#;

        let records = from_text(text, 144).unwrap();
        assert_eq!(records["0x0090"].strings, vec!["kept", "also kept"]);
    }

    #[test]
    fn test_row_tag_attributes_and_case_tolerated() {
        let text = r#"handle="0x0091" <ROW offset="0">0x10 0x20</ROW>"#;
        let records = from_text(text, 145).unwrap();
        assert_eq!(records["0x0091"].raw_bytes.as_deref(), Some(&[0x10, 0x20][..]));
    }
}

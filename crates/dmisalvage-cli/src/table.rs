//! Dump-file structure tables.
//!
//! A dump file is the raw SMBIOS structure-table stream: for each structure
//! a 4-byte header (type, declared length, 16-bit little-endian handle),
//! `length - 4` bytes of formatted data, then the null-terminated string
//! section ending in a double null.
//!
//! The walker keeps each structure as opaque bytes plus its string section
//! and decodes no fields, so every query against a [`DumpTable`] exercises
//! the document and text fallback tiers of the resolver.

use bytes::{Buf, Bytes};
use dmisalvage_core::document::{Document, Element};
use dmisalvage_core::source::{DiagnosticsSink, StructureSource};
use dmisalvage_core::{Error, HandleMap, Result};
use tracing::{debug, trace};

/// End-of-table structure type; walking stops after it
const END_OF_TABLE: u8 = 127;

/// Bytes rendered per `Row` element in the document view
const ROW_WIDTH: usize = 16;

/// One undecoded structure from the dump
#[derive(Debug, Clone)]
struct RawStructure {
    type_id: u8,
    handle: u16,
    /// Header and formatted data, exactly as read (4-byte header included)
    formatted: Vec<u8>,
    /// String-section entries in table order
    strings: Vec<String>,
}

/// A structure-table snapshot read from a dump file
#[derive(Debug, Clone)]
pub struct DumpTable {
    structures: Vec<RawStructure>,
}

impl DumpTable {
    /// Walks a structure-table byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedTable`] when the stream ends inside a
    /// header, a declared formatted region, or an unterminated string
    /// section, and when a declared length is below the 4-byte header size.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let total = data.len();
        let mut buf = Bytes::copy_from_slice(data);
        let mut structures = Vec::new();

        while buf.has_remaining() {
            let offset = total - buf.remaining();
            if buf.remaining() < 4 {
                return Err(Error::truncated_table(
                    offset,
                    format!("{} bytes left, header needs 4", buf.remaining()),
                ));
            }

            let type_id = buf.get_u8();
            let length = buf.get_u8() as usize;
            let handle = buf.get_u16_le();

            if length < 4 {
                return Err(Error::truncated_table(
                    offset,
                    format!("declared length {} below header size", length),
                ));
            }
            let body_len = length - 4;
            if buf.remaining() < body_len {
                return Err(Error::truncated_table(
                    offset,
                    format!(
                        "formatted region needs {} bytes, {} left",
                        body_len,
                        buf.remaining()
                    ),
                ));
            }

            let mut formatted = Vec::with_capacity(length);
            formatted.push(type_id);
            formatted.push(length as u8);
            formatted.extend_from_slice(&handle.to_le_bytes());
            formatted.extend_from_slice(&buf.copy_to_bytes(body_len));

            let strings = read_string_section(&mut buf, total)?;

            trace!(
                "structure type {} handle 0x{:04X} at offset {}: {} formatted bytes, {} strings",
                type_id,
                handle,
                offset,
                formatted.len(),
                strings.len()
            );

            structures.push(RawStructure {
                type_id,
                handle,
                formatted,
                strings,
            });

            // Anything after the end-of-table marker is padding.
            if type_id == END_OF_TABLE {
                break;
            }
        }

        debug!("walked {} structures from dump", structures.len());
        Ok(Self { structures })
    }

    /// Number of structures in the snapshot
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Returns true if the dump held no structures
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    fn element_for(structure: &RawStructure) -> Element {
        let mut element = Element::new("Structure")
            .attr("type", structure.type_id.to_string())
            .attr("handle", format!("0x{:04X}", structure.handle))
            .attr("size", structure.formatted.len().to_string());

        for chunk in structure.formatted.chunks(ROW_WIDTH) {
            let tokens: Vec<String> = chunk.iter().map(|b| format!("0x{:02X}", b)).collect();
            element = element.element(Element::new("Row").text(tokens.join(" ")));
        }
        for (position, text) in structure.strings.iter().enumerate() {
            element = element.element(
                Element::new("String")
                    .attr("index", (position + 1).to_string())
                    .text(text),
            );
        }
        element
    }
}

/// Reads one string section: null-terminated runs ending in a double null.
///
/// A structure with no strings is followed by the bare terminator pair,
/// which is consumed whole.
fn read_string_section(buf: &mut Bytes, total: usize) -> Result<Vec<String>> {
    let offset = total - buf.remaining();

    if !buf.has_remaining() {
        return Err(Error::truncated_table(offset, "missing string section"));
    }

    // Empty section: the terminator pair immediately follows the formatted
    // region.
    if buf.chunk()[0] == 0 {
        buf.get_u8();
        if buf.has_remaining() && buf.chunk()[0] == 0 {
            buf.get_u8();
        }
        return Ok(Vec::new());
    }

    let mut strings = Vec::new();
    loop {
        let mut current = Vec::new();
        loop {
            if !buf.has_remaining() {
                return Err(Error::truncated_table(offset, "unterminated string section"));
            }
            match buf.get_u8() {
                0 => break,
                byte => current.push(byte),
            }
        }
        if current.is_empty() {
            // The empty run after the last string: the second null of the
            // terminator.
            break;
        }
        strings.push(String::from_utf8_lossy(&current).into_owned());
    }

    Ok(strings)
}

impl StructureSource for DumpTable {
    fn query_by_type(&mut self, type_id: u8, sink: &mut DiagnosticsSink) -> Result<HandleMap> {
        // Dump sources carry no field layouts; the document and text tiers
        // do the recovery.
        sink.debug(format!(
            "dump source holds no field decoder for type {}",
            type_id
        ));
        Ok(HandleMap::new())
    }

    fn document_by_type(
        &mut self,
        type_id: u8,
        sink: &mut DiagnosticsSink,
    ) -> Result<Option<Document>> {
        let matching: Vec<&RawStructure> = self
            .structures
            .iter()
            .filter(|s| s.type_id == type_id)
            .collect();
        if matching.is_empty() {
            sink.debug(format!("no structures of type {} in dump", type_id));
            return Ok(None);
        }

        let mut root = Element::new("dmisalvage").attr("version", env!("CARGO_PKG_VERSION"));
        for structure in matching {
            root = root.element(Self::element_for(structure));
        }
        Ok(Some(Document::new(root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds one structure: header, body, string section.
    fn structure(type_id: u8, handle: u16, body: &[u8], strings: &[&str]) -> Vec<u8> {
        let mut out = vec![type_id, (body.len() + 4) as u8];
        out.extend_from_slice(&handle.to_le_bytes());
        out.extend_from_slice(body);
        if strings.is_empty() {
            out.extend_from_slice(&[0, 0]);
        } else {
            for s in strings {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            out.push(0);
        }
        out
    }

    fn sample_dump() -> Vec<u8> {
        let mut dump = structure(200, 0x00C8, &[0x10, 0x20, 0x30], &["ACME", "X100"]);
        dump.extend(structure(200, 0x00C9, &[0x11], &[]));
        dump.extend(structure(1, 0x0001, &[0xAA; 8], &["Vendor"]));
        dump.extend(structure(END_OF_TABLE, 0xFEFF, &[], &[]));
        dump
    }

    #[test]
    fn test_walk_counts_structures() {
        let table = DumpTable::from_bytes(&sample_dump()).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_walk_stops_after_end_of_table() {
        let mut dump = sample_dump();
        dump.extend_from_slice(&[0x00; 7]); // padding
        let table = DumpTable::from_bytes(&dump).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_walk_rejects_truncated_body() {
        let dump = vec![200, 10, 0xC8, 0x00, 0x01];
        let err = DumpTable::from_bytes(&dump).unwrap_err();
        assert!(matches!(err, Error::TruncatedTable { .. }));
    }

    #[test]
    fn test_walk_rejects_undersized_length() {
        let dump = vec![200, 3, 0xC8, 0x00];
        let err = DumpTable::from_bytes(&dump).unwrap_err();
        assert!(matches!(err, Error::TruncatedTable { .. }));
    }

    #[test]
    fn test_walk_rejects_unterminated_strings() {
        let dump = vec![200, 4, 0xC8, 0x00, b'A', b'B'];
        let err = DumpTable::from_bytes(&dump).unwrap_err();
        assert!(matches!(err, Error::TruncatedTable { .. }));
    }

    #[test]
    fn test_document_view_carries_rows_and_strings() {
        let mut table = DumpTable::from_bytes(&sample_dump()).unwrap();
        let mut sink = DiagnosticsSink::new();

        let document = table.document_by_type(200, &mut sink).unwrap().unwrap();
        let matches = document.structures(200);
        assert_eq!(matches.len(), 2);

        let first = matches[0];
        assert_eq!(first.get_attr("handle"), Some("0x00C8"));
        assert_eq!(first.get_attr("size"), Some("7"));
        let serialized = document.serialize();
        assert!(serialized.contains("<Row>0xC8 0x07 0xC8 0x00 0x10 0x20 0x30</Row>"));
        assert!(serialized.contains(r#"<String index="1">ACME</String>"#));
        assert!(serialized.contains(r#"<String index="2">X100</String>"#));
    }

    #[test]
    fn test_document_view_none_for_absent_type() {
        let mut table = DumpTable::from_bytes(&sample_dump()).unwrap();
        let mut sink = DiagnosticsSink::new();

        assert!(table.document_by_type(42, &mut sink).unwrap().is_none());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_structured_query_is_always_empty() {
        let mut table = DumpTable::from_bytes(&sample_dump()).unwrap();
        let mut sink = DiagnosticsSink::new();

        assert!(table.query_by_type(1, &mut sink).unwrap().is_empty());
        assert!(!sink.is_empty());
    }
}

//! Structure sources and the diagnostics sink.
//!
//! A [`StructureSource`] is the decoding backend the resolver degrades
//! through: it may answer a structured query with decoded records, hand back
//! a document view, or at minimum serialize what it holds as text. Sources
//! report warnings and debug notes by appending to a caller-owned
//! [`DiagnosticsSink`] rather than into any process-wide buffer, which makes
//! the resolver's draining discipline an explicit, testable contract.

use crate::classify;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::record::HandleMap;
use tracing::{debug, warn};

/// Severity of a source diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something unexpected that did not stop the operation
    Warning,
    /// Progress or detail notes
    Debug,
}

/// One diagnostic message emitted by a structure source
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Message severity
    pub severity: Severity,
    /// Message text
    pub message: String,
}

impl Diagnostic {
    /// Creates a warning diagnostic
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    /// Creates a debug diagnostic
    pub fn debug(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Debug,
            message: message.into(),
        }
    }
}

/// Append-only buffer of source diagnostics, owned by the caller context.
///
/// The resolver drains the sink after every tier so that noise from an
/// expected-to-fail tier cannot leak into later output. Use from multiple
/// threads requires external exclusion around drains; the pipeline itself is
/// single-threaded.
#[derive(Debug, Default)]
pub struct DiagnosticsSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticsSink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one diagnostic
    pub fn append(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Appends a warning
    pub fn warning(&mut self, message: impl Into<String>) {
        self.append(Diagnostic::warning(message));
    }

    /// Appends a debug note
    pub fn debug(&mut self, message: impl Into<String>) {
        self.append(Diagnostic::debug(message));
    }

    /// Removes and returns everything accumulated so far
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }

    /// Returns the accumulated diagnostics without removing them
    pub fn peek(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Returns true if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of buffered diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drains the sink into the tracing subscriber, warnings at `warn`
    /// level and the rest at `debug` level
    pub fn log_messages(&mut self) {
        for diagnostic in self.drain() {
            match diagnostic.severity {
                Severity::Warning => warn!("{}", diagnostic.message),
                Severity::Debug => debug!("{}", diagnostic.message),
            }
        }
    }
}

/// A backend holding one structure-table snapshot.
///
/// Implementations answer what they can: a source without field layouts for
/// a type returns an empty map from [`query_by_type`](Self::query_by_type)
/// and lets the document and serialized views carry the data instead. All
/// methods may append diagnostics to the sink as a side effect.
pub trait StructureSource {
    /// Structured query: decoded records for one type id, keyed by handle.
    /// An empty map means the source has nothing decodable for this type.
    fn query_by_type(&mut self, type_id: u8, sink: &mut DiagnosticsSink) -> Result<HandleMap>;

    /// Document view: a hierarchical rendition of the structures of one
    /// type, or `None` if the source holds none
    fn document_by_type(
        &mut self,
        type_id: u8,
        sink: &mut DiagnosticsSink,
    ) -> Result<Option<Document>>;

    /// Structured query over a whole section, merging every member type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSection`] for a label missing from the
    /// section table.
    fn query_by_section(&mut self, section: &str, sink: &mut DiagnosticsSink) -> Result<HandleMap> {
        let types =
            classify::section_types(section).ok_or_else(|| Error::unknown_section(section))?;
        let mut merged = HandleMap::new();
        for &type_id in types {
            merged.extend(self.query_by_type(type_id, sink)?);
        }
        Ok(merged)
    }

    /// Serialized view: the document view rendered as text, or `None` if no
    /// document exists for this type
    fn serialized_by_type(
        &mut self,
        type_id: u8,
        sink: &mut DiagnosticsSink,
    ) -> Result<Option<String>> {
        Ok(self
            .document_by_type(type_id, sink)?
            .map(|document| document.serialize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StructureRecord;

    #[test]
    fn test_sink_append_peek_drain() {
        let mut sink = DiagnosticsSink::new();
        assert!(sink.is_empty());

        sink.warning("no layout for type 200");
        sink.debug("scanning string section");
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.peek()[0].severity, Severity::Warning);

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].message, "scanning string section");
        assert!(sink.is_empty());
        assert!(sink.drain().is_empty());
    }

    struct TypeEcho;

    impl StructureSource for TypeEcho {
        fn query_by_type(
            &mut self,
            type_id: u8,
            _sink: &mut DiagnosticsSink,
        ) -> Result<HandleMap> {
            let mut map = HandleMap::new();
            let handle = format!("0x{:04X}", u16::from(type_id));
            map.insert(handle.clone(), StructureRecord::new(type_id, handle));
            Ok(map)
        }

        fn document_by_type(
            &mut self,
            _type_id: u8,
            _sink: &mut DiagnosticsSink,
        ) -> Result<Option<Document>> {
            Ok(None)
        }
    }

    #[test]
    fn test_query_by_section_merges_member_types() {
        let mut source = TypeEcho;
        let mut sink = DiagnosticsSink::new();

        let merged = source.query_by_section("memory", &mut sink).unwrap();
        assert_eq!(merged.len(), 9);
        assert!(merged.contains_key("0x0005"));
        assert!(merged.contains_key("0x0025")); // type 37
    }

    #[test]
    fn test_query_by_section_rejects_unknown_label() {
        let mut source = TypeEcho;
        let mut sink = DiagnosticsSink::new();

        let err = source.query_by_section("ethernet", &mut sink).unwrap_err();
        assert!(matches!(err, Error::UnknownSection { .. }));
    }

    #[test]
    fn test_serialized_by_type_defaults_to_none_without_document() {
        let mut source = TypeEcho;
        let mut sink = DiagnosticsSink::new();
        assert!(source.serialized_by_type(4, &mut sink).unwrap().is_none());
    }
}

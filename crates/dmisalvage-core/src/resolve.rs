//! Tiered resolution of structure types.
//!
//! For every requested type id the resolver walks a fixed ladder of
//! strategies: structured query, document walk, text scan. The first tier
//! producing a non-empty map wins and later tiers never run. A tier's
//! failure (empty result or recoverable error) is absorbed locally; only
//! exhaustion of the whole ladder yields a "no data" resolution, which is a
//! value, not an error.
//!
//! Diagnostics emitted by a tier are drained from the sink immediately
//! after that tier completes and discarded unless verbose mode is active.
//! Without this, warnings from an expected-to-fail structured query on an
//! OEM type would keep surfacing for types that are legitimately absent.

use crate::classify;
use crate::error::{Error, Result};
use crate::extract;
use crate::raw;
use crate::record::HandleMap;
use crate::source::{Diagnostic, DiagnosticsSink, StructureSource};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// One rung of the resolution ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Structured query against the source
    Structured,
    /// Document view walked by the document extractor
    Document,
    /// Serialized text scanned by the text extractor
    Text,
}

impl Tier {
    /// All tiers in resolution order
    pub const ALL: [Tier; 3] = [Tier::Structured, Tier::Document, Tier::Text];

    /// Returns the tier name as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Structured => "structured",
            Tier::Document => "document",
            Tier::Text => "text",
        }
    }
}

/// Outcome of running one tier
enum TierOutcome {
    /// The tier produced a non-empty record map
    Found(HandleMap),
    /// The tier found nothing; fall through to the next
    NotFound,
    /// The request itself is invalid; no further tier is tried
    InputError(Error),
}

/// Result of one resolution request.
///
/// "No data" is an empty map with `tier` set to `None`, distinguishable
/// from a successful resolution of a structure that happens to carry no
/// fields. `diagnostics` is populated only under verbose mode, in tier
/// order.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Recovered records, keyed by handle
    pub records: HandleMap,
    /// The tier that produced the records; `None` when every tier came up
    /// empty, and also for merged section resolutions
    pub tier: Option<Tier>,
    /// Diagnostics preserved under verbose mode
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Returns true if any record was recovered
    pub fn has_data(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Type ids that produced data, grouped by range class
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AvailableTypes {
    /// Specification-defined ids with data
    pub standard: Vec<u8>,
    /// Specification-reserved ids with data
    pub reserved: Vec<u8>,
    /// Vendor/OEM ids with data
    pub oem: Vec<u8>,
}

/// Tiered resolver over one structure source
#[derive(Debug)]
pub struct Resolver<S> {
    source: S,
    verbose: bool,
}

impl<S: StructureSource> Resolver<S> {
    /// Creates a resolver over the given source
    pub fn new(source: S) -> Self {
        Self {
            source,
            verbose: false,
        }
    }

    /// Enables or disables verbose mode, which preserves per-tier
    /// diagnostics on the returned resolutions
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Consumes the resolver and returns the source
    pub fn into_source(self) -> S {
        self.source
    }

    /// Resolves one type id through the tier ladder.
    ///
    /// # Errors
    ///
    /// Only input errors surface here; tier failures are absorbed and an
    /// exhausted ladder returns a "no data" resolution.
    pub fn resolve_type(&mut self, type_id: u8, sink: &mut DiagnosticsSink) -> Result<Resolution> {
        let mut diagnostics = Vec::new();

        for tier in Tier::ALL {
            let outcome = self.run_tier(tier, type_id, sink);

            // Drain the tier's noise before the next one runs.
            let drained = sink.drain();
            if self.verbose {
                diagnostics.extend(drained);
            }

            match outcome {
                TierOutcome::Found(mut records) => {
                    debug!(
                        "type {} resolved via {} tier ({} records)",
                        type_id,
                        tier.as_str(),
                        records.len()
                    );
                    if tier != Tier::Structured {
                        reconstruct_strings(&mut records);
                    }
                    return Ok(Resolution {
                        records,
                        tier: Some(tier),
                        diagnostics,
                    });
                }
                TierOutcome::NotFound => {
                    trace!("type {}: {} tier found nothing", type_id, tier.as_str());
                }
                TierOutcome::InputError(e) => return Err(e),
            }
        }

        debug!("type {}: no data in any tier", type_id);
        Ok(Resolution {
            records: HandleMap::new(),
            tier: None,
            diagnostics,
        })
    }

    /// Resolves every member type of a section and merges the results,
    /// keyed by handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSection`] for a label missing from the
    /// section table, before any tier runs.
    pub fn resolve_section(&mut self, name: &str, sink: &mut DiagnosticsSink) -> Result<Resolution> {
        let types = classify::section_types(name).ok_or_else(|| Error::unknown_section(name))?;

        let mut merged = Resolution::default();
        for &type_id in types {
            let resolution = self.resolve_type(type_id, sink)?;
            merged.records.extend(resolution.records);
            merged.diagnostics.extend(resolution.diagnostics);
        }
        Ok(merged)
    }

    /// Resolves every vendor/OEM type id and collects the non-empty results
    pub fn scan_oem_types(
        &mut self,
        sink: &mut DiagnosticsSink,
    ) -> Result<BTreeMap<u8, HandleMap>> {
        let mut found = BTreeMap::new();
        for type_id in classify::oem_type_ids() {
            let resolution = self.resolve_type(type_id, sink)?;
            if resolution.has_data() {
                found.insert(type_id, resolution.records);
            }
        }
        Ok(found)
    }

    /// Probes the whole type domain and reports which ids produced data,
    /// grouped by range class
    pub fn list_available_types(&mut self, sink: &mut DiagnosticsSink) -> Result<AvailableTypes> {
        let mut available = AvailableTypes::default();
        for type_id in 0..=u8::MAX {
            if self.resolve_type(type_id, sink)?.has_data() {
                match classify::classify(type_id) {
                    classify::TypeClass::Standard => available.standard.push(type_id),
                    classify::TypeClass::Reserved => available.reserved.push(type_id),
                    classify::TypeClass::Oem => available.oem.push(type_id),
                }
            }
        }
        Ok(available)
    }

    fn run_tier(&mut self, tier: Tier, type_id: u8, sink: &mut DiagnosticsSink) -> TierOutcome {
        let result = match tier {
            Tier::Structured => self
                .source
                .query_by_type(type_id, sink)
                .map(|records| (!records.is_empty()).then_some(records)),
            Tier::Document => match self.source.document_by_type(type_id, sink) {
                Ok(Some(document)) => Ok(extract::from_document(&document, type_id)),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            },
            Tier::Text => match self.source.serialized_by_type(type_id, sink) {
                Ok(Some(text)) => Ok(extract::from_text(&text, type_id)),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(Some(records)) if !records.is_empty() => TierOutcome::Found(records),
            Ok(_) => TierOutcome::NotFound,
            Err(e) if e.is_recoverable() => {
                sink.warning(format!(
                    "{} tier failed for type {}: {}",
                    tier.as_str(),
                    type_id,
                    e
                ));
                TierOutcome::NotFound
            }
            Err(e) => TierOutcome::InputError(e),
        }
    }
}

/// Runs string-table recovery over records an extractor produced.
///
/// A record whose raw region extends past its declared formatted size may
/// carry its string section inline; recover it without disturbing strings a
/// tier already found. A zero size means the formatted boundary is unknown,
/// in which case no recovery is attempted.
fn reconstruct_strings(records: &mut HandleMap) {
    for record in records.values_mut() {
        if !record.strings.is_empty() || record.size == 0 {
            continue;
        }
        let Some(bytes) = record.raw_bytes.as_deref() else {
            continue;
        };
        if bytes.len() <= record.size {
            continue;
        }
        let recovered = raw::string_table(bytes, record.size);
        if !recovered.is_empty() {
            trace!(
                "recovered {} strings from raw bytes of handle {}",
                recovered.len(),
                record.handle
            );
            record.strings = recovered;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Element};
    use crate::record::StructureRecord;
    use pretty_assertions::assert_eq;

    /// Scripted source: answers each tier from canned data and counts calls.
    #[derive(Default)]
    struct Scripted {
        structured: Option<HandleMap>,
        structured_error: Option<fn() -> Error>,
        document: Option<Document>,
        serialized: Option<String>,
        structured_calls: usize,
        document_calls: usize,
        serialized_calls: usize,
        warning_on_query: Option<&'static str>,
    }

    impl StructureSource for Scripted {
        fn query_by_type(&mut self, _type_id: u8, sink: &mut DiagnosticsSink) -> Result<HandleMap> {
            self.structured_calls += 1;
            if let Some(message) = self.warning_on_query {
                sink.warning(message);
            }
            if let Some(make) = self.structured_error {
                return Err(make());
            }
            Ok(self.structured.clone().unwrap_or_default())
        }

        fn document_by_type(
            &mut self,
            _type_id: u8,
            _sink: &mut DiagnosticsSink,
        ) -> Result<Option<Document>> {
            self.document_calls += 1;
            Ok(self.document.clone())
        }

        fn serialized_by_type(
            &mut self,
            _type_id: u8,
            _sink: &mut DiagnosticsSink,
        ) -> Result<Option<String>> {
            self.serialized_calls += 1;
            match (&self.serialized, &self.document) {
                (Some(text), _) => Ok(Some(text.clone())),
                (None, Some(document)) => Ok(Some(document.serialize())),
                (None, None) => Ok(None),
            }
        }
    }

    fn processor_map() -> HandleMap {
        let mut map = HandleMap::new();
        let mut record = StructureRecord::new(4, "0x0004");
        record.insert_field("Version", "x");
        map.insert("0x0004".to_string(), record);
        map
    }

    #[test]
    fn test_structured_tier_short_circuits() {
        let mut resolver = Resolver::new(Scripted {
            structured: Some(processor_map()),
            ..Default::default()
        });
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(4, &mut sink).unwrap();
        assert_eq!(resolution.tier, Some(Tier::Structured));
        assert_eq!(resolution.records.len(), 1);

        let record = &resolution.records["0x0004"];
        assert_eq!(record.type_id, 4);
        assert_eq!(record.string(1), None);
        assert!(record.raw_bytes.is_none());

        let source = resolver.into_source();
        assert_eq!(source.structured_calls, 1);
        assert_eq!(source.document_calls, 0);
        assert_eq!(source.serialized_calls, 0);
    }

    #[test]
    fn test_document_tier_runs_when_structured_empty() {
        let document = Document::new(
            Element::new("dmisalvage").element(
                Element::new("Structure")
                    .attr("type", "200")
                    .attr("handle", "0x00C8")
                    .attr("size", "5")
                    .element(Element::new("Row").text("0x48 0x45 0x4C 0x4C 0x4F")),
            ),
        );
        let mut resolver = Resolver::new(Scripted {
            document: Some(document),
            ..Default::default()
        });
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(200, &mut sink).unwrap();
        assert_eq!(resolution.tier, Some(Tier::Document));
        assert_eq!(
            resolution.records["0x00C8"].raw_bytes.as_deref(),
            Some(&b"HELLO"[..])
        );

        let source = resolver.into_source();
        assert_eq!(source.structured_calls, 1);
        assert_eq!(source.document_calls, 1);
        assert_eq!(source.serialized_calls, 0);
    }

    #[test]
    fn test_text_tier_is_last_resort() {
        let text = r#"<Structure type="200" handle="0x00C8">
            <Row>0x48 0x45 0x4C 0x4C 0x4F</Row>
        </Structure>"#;
        let mut resolver = Resolver::new(Scripted {
            serialized: Some(text.to_string()),
            ..Default::default()
        });
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(200, &mut sink).unwrap();
        assert_eq!(resolution.tier, Some(Tier::Text));

        let record = &resolution.records["0x00C8"];
        assert_eq!(record.handle, "0x00C8");
        assert_eq!(
            record.fields.get("Header and Data"),
            Some(&crate::record::FieldValue::Text("48 45 4C 4C 4F".to_string()))
        );
        assert!(record.strings.is_empty());
    }

    #[test]
    fn test_exhausted_ladder_reports_no_data() {
        let mut resolver = Resolver::new(Scripted::default());
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(201, &mut sink).unwrap();
        assert!(!resolution.has_data());
        assert_eq!(resolution.tier, None);

        let source = resolver.into_source();
        assert_eq!(source.structured_calls, 1);
        assert_eq!(source.document_calls, 1);
        assert_eq!(source.serialized_calls, 1);
    }

    #[test]
    fn test_failed_tier_diagnostics_are_drained() {
        let mut resolver = Resolver::new(Scripted {
            warning_on_query: Some("no layout for type 200"),
            ..Default::default()
        });
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(200, &mut sink).unwrap();
        assert!(sink.is_empty());
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_verbose_mode_preserves_drained_diagnostics() {
        let mut resolver = Resolver::new(Scripted {
            warning_on_query: Some("no layout for type 200"),
            ..Default::default()
        })
        .verbose(true);
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(200, &mut sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(resolution.diagnostics.len(), 1);
        assert_eq!(resolution.diagnostics[0].message, "no layout for type 200");
    }

    #[test]
    fn test_recoverable_source_error_falls_through() {
        let document = Document::new(
            Element::new("root").element(
                Element::new("Structure")
                    .attr("type", "210")
                    .attr("handle", "0x00D2"),
            ),
        );
        let mut resolver = Resolver::new(Scripted {
            structured_error: Some(|| Error::source("decoder crashed")),
            document: Some(document),
            ..Default::default()
        });
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(210, &mut sink).unwrap();
        assert_eq!(resolution.tier, Some(Tier::Document));
    }

    #[test]
    fn test_strings_recovered_from_raw_section() {
        // Raw region: 4-byte header + string section "ACME\0X100\0\0",
        // declared size 4.
        let document = Document::new(
            Element::new("root").element(
                Element::new("Structure")
                    .attr("type", "220")
                    .attr("handle", "0x00DC")
                    .attr("size", "4")
                    .element(Element::new("Row").text(
                        "0xDC 0x04 0x10 0x00 0x41 0x43 0x4D 0x45 0x00 0x58 0x31 0x30 0x30 0x00 0x00",
                    )),
            ),
        );
        let mut resolver = Resolver::new(Scripted {
            document: Some(document),
            ..Default::default()
        });
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(220, &mut sink).unwrap();
        assert_eq!(resolution.records["0x00DC"].strings, vec!["ACME", "X100"]);
    }

    #[test]
    fn test_resolve_section_merges_members() {
        let mut resolver = Resolver::new(Scripted::default());
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_section("memory", &mut sink).unwrap();
        assert!(!resolution.has_data());

        // One structured probe per member type id.
        assert_eq!(resolver.into_source().structured_calls, 9);
    }

    #[test]
    fn test_resolve_section_keys_merged_records_by_handle() {
        // The scripted source answers every member type with the same
        // handle; the merged map must hold it once.
        let mut resolver = Resolver::new(Scripted {
            structured: Some(processor_map()),
            ..Default::default()
        });
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_section("memory", &mut sink).unwrap();
        assert!(resolution.has_data());
        assert_eq!(resolution.records.len(), 1);
        assert!(resolution.records.contains_key("0x0004"));
    }

    #[test]
    fn test_resolve_section_unknown_label() {
        let mut resolver = Resolver::new(Scripted::default());
        let mut sink = DiagnosticsSink::new();

        let err = resolver.resolve_section("ethernet", &mut sink).unwrap_err();
        assert!(matches!(err, Error::UnknownSection { .. }));
        assert_eq!(resolver.into_source().structured_calls, 0);
    }

    #[test]
    fn test_scan_oem_types_collects_only_nonempty() {
        let mut resolver = Resolver::new(Scripted::default());
        let mut sink = DiagnosticsSink::new();

        let found = resolver.scan_oem_types(&mut sink).unwrap();
        assert!(found.is_empty());
        assert_eq!(resolver.into_source().structured_calls, 128);
    }

    #[test]
    fn test_list_available_types_groups_by_class() {
        // A source that answers every structured query groups the whole
        // domain into its three range classes.
        let mut resolver = Resolver::new(Scripted {
            structured: Some(processor_map()),
            ..Default::default()
        });
        let mut sink = DiagnosticsSink::new();

        let available = resolver.list_available_types(&mut sink).unwrap();
        assert_eq!(available.standard.len(), 47);
        assert_eq!(available.reserved.len(), 81);
        assert_eq!(available.oem.len(), 128);
        assert_eq!(available.standard.first(), Some(&0));
        assert_eq!(available.oem.last(), Some(&255));
    }
}

//! # dmisalvage-core
//!
//! A library for recovering DMI/SMBIOS structures that have no statically
//! known field layout, principally the vendor/OEM range (types 128-255)
//! and the specification-reserved range (47-127).
//!
//! For such types a structured query returns nothing useful, so the
//! resolver degrades through a fixed ladder: structured query, serialized
//! document walk, pattern scan over the serialized text, and finally
//! string-table reconstruction from the recovered raw bytes.
//!
//! ## Architecture
//!
//! - [`resolve`]: the tier ladder and its draining discipline
//! - [`extract`]: document- and text-based field-map recovery
//! - [`raw`]: hex normalization, string-table extraction, hex+ASCII dumps
//! - [`classify`]: static type/section reference tables
//! - [`source`]: the structure-source trait and the diagnostics sink
//! - [`document`]: the closed element/text tree sources serialize into
//! - [`record`]: the recovered-structure model with lossless JSON rendering
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```
//! use dmisalvage_core::{extract, raw};
//!
//! // Serialized view of an OEM structure no decoder has a layout for.
//! let text = r#"<Structure type="200" handle="0x00C8" size="4">
//!     <Row>0x01 0x02 0x48 0x69 0x00 0x00</Row>
//! </Structure>"#;
//!
//! let records = extract::from_text(text, 200).expect("handle token present");
//! let record = &records["0x00C8"];
//! assert_eq!(record.size, 4);
//! assert_eq!(
//!     raw::render_hex(record.raw_bytes.as_deref().unwrap_or(&[])),
//!     "01 02 48 69 00 00"
//! );
//! ```
//!
//! ## Extensibility
//!
//! Implement [`StructureSource`] to plug any table backend into the
//! resolver: a live firmware reader, a dump-file walker, or a test stub.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod classify;
pub mod document;
pub mod error;
pub mod extract;
pub mod raw;
pub mod record;
pub mod resolve;
pub mod source;

// Re-export primary types for convenience
pub use classify::TypeClass;
pub use error::{Error, Result};
pub use record::{FieldValue, HandleMap, StructureRecord};
pub use resolve::{AvailableTypes, Resolution, Resolver, Tier};
pub use source::{Diagnostic, DiagnosticsSink, Severity, StructureSource};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

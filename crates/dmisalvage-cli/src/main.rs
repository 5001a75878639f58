//! dmisalvage - Recover DMI/SMBIOS structures with no known field layout
//!
//! This tool walks an SMBIOS structure-table dump and runs each requested
//! type through the tiered recovery pipeline: structured query, document
//! walk, text scan, raw-byte string reconstruction. Dump sources carry no
//! field decoders, so everything it prints came out of the fallback tiers.

mod table;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use dmisalvage_core::raw::HexDump;
use dmisalvage_core::{
    classify, DiagnosticsSink, FieldValue, Resolution, Resolver, Severity, StructureRecord,
};
use std::fs;
use std::path::PathBuf;
use table::DumpTable;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Recover DMI/SMBIOS structures with no known field layout from table dumps
#[derive(Parser, Debug)]
#[command(name = "dmisalvage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to an SMBIOS structure-table dump file
    #[arg(short, long)]
    dump_file: PathBuf,

    /// DMI type id to resolve (repeatable)
    #[arg(short = 't', long = "type", value_name = "ID")]
    types: Vec<u8>,

    /// Section name to resolve (repeatable)
    #[arg(short, long = "section", value_name = "NAME")]
    sections: Vec<String>,

    /// Probe every type id (0-255) instead of sections
    #[arg(long, conflicts_with_all = ["types", "sections", "oem_scan"])]
    all_types: bool,

    /// Probe the vendor/OEM range (128-255) only
    #[arg(long, conflicts_with_all = ["types", "sections"])]
    oem_scan: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Show hex+ASCII dumps of recovered raw bytes
    #[arg(long)]
    raw: bool,

    /// Verbosity level (-v, -vv, -vvv); also surfaces per-tier diagnostics
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Output format for recovered structures
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// One JSON document over all queries
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let data = fs::read(&cli.dump_file)
        .with_context(|| format!("failed to read dump file: {}", cli.dump_file.display()))?;
    debug!("Read {} bytes from {}", data.len(), cli.dump_file.display());

    let dump = DumpTable::from_bytes(&data)
        .with_context(|| format!("failed to walk structure table: {}", cli.dump_file.display()))?;
    if dump.is_empty() {
        bail!("dump file holds no structures: {}", cli.dump_file.display());
    }
    info!("Walked {} structures from {}", dump.len(), cli.dump_file.display());

    let mut resolver = Resolver::new(dump).verbose(cli.verbose > 0);
    let mut sink = DiagnosticsSink::new();
    let mut report = Report::new(cli.format, cli.raw);

    if cli.all_types || cli.oem_scan {
        let ids: Vec<u8> = if cli.all_types {
            (0..=u8::MAX).collect()
        } else {
            classify::oem_type_ids().collect()
        };
        let mut found = 0usize;
        for type_id in ids {
            let resolution = resolver.resolve_type(type_id, &mut sink)?;
            emit_diagnostics(&resolution);
            if resolution.has_data() {
                found += 1;
                report.add_type(type_id, &resolution)?;
            }
        }
        if found == 0 {
            info!("No types produced data");
        }
    } else if !cli.types.is_empty() || !cli.sections.is_empty() {
        let invalid: Vec<&str> = cli
            .sections
            .iter()
            .map(String::as_str)
            .filter(|name| classify::section_types(name).is_none())
            .collect();
        if !invalid.is_empty() {
            let valid: Vec<&str> = classify::section_names().collect();
            bail!(
                "unknown sections: {} (valid sections: {})",
                invalid.join(", "),
                valid.join(", ")
            );
        }

        for name in &cli.sections {
            let resolution = resolver.resolve_section(name, &mut sink)?;
            emit_diagnostics(&resolution);
            report.add_section(name, &resolution)?;
        }
        for &type_id in &cli.types {
            let resolution = resolver.resolve_type(type_id, &mut sink)?;
            emit_diagnostics(&resolution);
            report.add_type(type_id, &resolution)?;
        }
    } else {
        // Default: every known section.
        for name in classify::section_names() {
            let resolution = resolver.resolve_section(name, &mut sink)?;
            emit_diagnostics(&resolution);
            report.add_section(name, &resolution)?;
        }
    }

    report.finish()
}

/// Forwards preserved per-tier diagnostics to the tracing subscriber
fn emit_diagnostics(resolution: &Resolution) {
    for diagnostic in &resolution.diagnostics {
        match diagnostic.severity {
            Severity::Warning => warn!("{}", diagnostic.message),
            Severity::Debug => debug!("{}", diagnostic.message),
        }
    }
}

/// Accumulates query results and renders them in the selected format
struct Report {
    format: OutputFormat,
    show_raw: bool,
    json: serde_json::Map<String, serde_json::Value>,
}

impl Report {
    fn new(format: OutputFormat, show_raw: bool) -> Self {
        Self {
            format,
            show_raw,
            json: serde_json::Map::new(),
        }
    }

    fn add_type(&mut self, type_id: u8, resolution: &Resolution) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                let title = format!("DMI TYPE {}: {}", type_id, classify::type_name(type_id));
                self.print_group(&title, resolution);
            }
            OutputFormat::Json => {
                self.json.insert(
                    type_id.to_string(),
                    serde_json::to_value(&resolution.records)?,
                );
            }
        }
        Ok(())
    }

    fn add_section(&mut self, name: &str, resolution: &Resolution) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                let title = format!("SECTION: {}", name.to_uppercase());
                self.print_group(&title, resolution);
            }
            OutputFormat::Json => {
                self.json
                    .insert(name.to_string(), serde_json::to_value(&resolution.records)?);
            }
        }
        Ok(())
    }

    fn print_group(&self, title: &str, resolution: &Resolution) {
        println!();
        println!("{}", "=".repeat(70));
        println!("{}", title);
        println!("{}", "=".repeat(70));

        if !resolution.has_data() {
            println!("  (no data available)");
            return;
        }

        for (count, record) in resolution.records.values().enumerate() {
            self.print_record(count + 1, record);
        }
        println!();
        println!("Total entries: {}", resolution.records.len());
    }

    fn print_record(&self, position: usize, record: &StructureRecord) {
        println!();
        println!("[{}] Handle: {}", position, record.handle);
        println!(
            "  Type: {} ({})",
            record.type_id,
            classify::type_name(record.type_id)
        );
        println!("  Size: {}", record.size);
        for (name, value) in &record.fields {
            print_field("  ", name, value);
        }
        if !record.strings.is_empty() {
            println!("  Strings:");
            for (index, string) in record.strings.iter().enumerate() {
                println!("    {}: {}", index + 1, string);
            }
        }
        if self.show_raw {
            if let Some(bytes) = record.raw_bytes.as_deref() {
                println!("  Raw bytes:");
                for line in HexDump::new().format(bytes).lines() {
                    println!("    {}", line);
                }
            }
        }
    }

    fn finish(self) -> Result<()> {
        if matches!(self.format, OutputFormat::Json) {
            let document = serde_json::Value::Object(self.json);
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Ok(())
    }
}

/// Renders one field with nesting, lists as `- item` lines
fn print_field(indent: &str, name: &str, value: &FieldValue) {
    match value {
        FieldValue::Text(text) => println!("{}{}: {}", indent, name, text),
        FieldValue::List(items) => {
            println!("{}{}:", indent, name);
            for item in items {
                match item {
                    FieldValue::Text(text) => println!("{}  - {}", indent, text),
                    other => print_field(&format!("{}  ", indent), "-", other),
                }
            }
        }
        FieldValue::Map(entries) => {
            println!("{}{}:", indent, name);
            for (key, nested) in entries {
                print_field(&format!("{}  ", indent), key, nested);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

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

    #[test]
    fn test_dump_file_roundtrip_through_resolver() {
        let mut dump = structure(200, 0x00C8, &[0x01, 0x02], &["ACME"]);
        dump.extend(structure(127, 0xFFFE, &[], &[]));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&dump).unwrap();

        let data = fs::read(file.path()).unwrap();
        let table = DumpTable::from_bytes(&data).unwrap();
        let mut resolver = Resolver::new(table);
        let mut sink = DiagnosticsSink::new();

        let resolution = resolver.resolve_type(200, &mut sink).unwrap();
        assert!(resolution.has_data());

        let record = &resolution.records["0x00C8"];
        assert_eq!(record.type_id, 200);
        assert_eq!(record.size, 6);
        assert_eq!(
            record.raw_bytes.as_deref(),
            Some(&[0xC8, 0x06, 0xC8, 0x00, 0x01, 0x02][..])
        );
        assert_eq!(record.strings, vec!["ACME"]);

        // The dump source answers no structured queries, so nothing for an
        // absent type.
        let missing = resolver.resolve_type(42, &mut sink).unwrap();
        assert!(!missing.has_data());
    }

    #[test]
    fn test_json_report_keys() {
        let mut dump = structure(200, 0x00C8, &[0x01], &[]);
        dump.extend(structure(127, 0xFFFE, &[], &[]));

        let table = DumpTable::from_bytes(&dump).unwrap();
        let mut resolver = Resolver::new(table);
        let mut sink = DiagnosticsSink::new();
        let resolution = resolver.resolve_type(200, &mut sink).unwrap();

        let mut report = Report::new(OutputFormat::Json, false);
        report.add_type(200, &resolution).unwrap();

        let value = serde_json::Value::Object(report.json.clone());
        assert_eq!(value["200"]["0x00C8"]["type_id"], 200);
        assert_eq!(value["200"]["0x00C8"]["raw_bytes"], "C8 05 C8 00 01");
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

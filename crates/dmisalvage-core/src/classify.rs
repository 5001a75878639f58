//! Static DMI type and section classification tables.
//!
//! Everything in this module is a pure lookup: type id to range class, type
//! id to display name, section label to the tuple of member type ids. The
//! tables are reference data only; nothing here touches a structure source.

/// Range class of a DMI type id.
///
/// The SMBIOS specification splits the 8-bit type domain into three ranges:
/// types it defines itself, types it reserves for future use, and types left
/// to the platform vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Specification-defined types (0-46)
    Standard,
    /// Specification-reserved types (47-127)
    Reserved,
    /// Vendor/OEM-defined types (128-255)
    Oem,
}

impl TypeClass {
    /// Returns the class name as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeClass::Standard => "standard",
            TypeClass::Reserved => "reserved",
            TypeClass::Oem => "oem",
        }
    }
}

/// Highest specification-defined type id
pub const STANDARD_MAX: u8 = 46;

/// Highest specification-reserved type id
pub const RESERVED_MAX: u8 = 127;

/// First vendor/OEM type id
pub const OEM_START: u8 = 128;

/// Display names for the specification-defined types, indexed by type id.
static STANDARD_NAMES: [&str; 47] = [
    "BIOS Information",
    "System Information",
    "Base Board Information",
    "Chassis Information",
    "Processor Information",
    "Memory Controller Information",
    "Memory Module Information",
    "Cache Information",
    "Port Connector Information",
    "System Slots",
    "On Board Devices Information",
    "OEM Strings",
    "System Configuration Options",
    "BIOS Language Information",
    "Group Associations",
    "System Event Log",
    "Physical Memory Array",
    "Memory Device",
    "32-bit Memory Error Information",
    "Memory Array Mapped Address",
    "Memory Device Mapped Address",
    "Built-in Pointing Device",
    "Portable Battery",
    "System Reset",
    "Hardware Security",
    "System Power Controls",
    "Voltage Probe",
    "Cooling Device",
    "Temperature Probe",
    "Electrical Current Probe",
    "Out-of-band Remote Access",
    "Boot Integrity Services",
    "System Boot Information",
    "64-bit Memory Error Information",
    "Management Device",
    "Management Device Component",
    "Management Device Threshold Data",
    "Memory Channel",
    "IPMI Device Information",
    "System Power Supply",
    "Additional Information",
    "Onboard Devices Extended Information",
    "Management Controller Host Interface",
    "TPM Device",
    "Processor Additional Information",
    "Firmware Inventory Information",
    "String Property",
];

/// Reserved-range ids the specification names anyway.
static RESERVED_NAMES: &[(u8, &str)] = &[(126, "Inactive"), (127, "End Of Table")];

/// OEM ids with names observed in vendor firmware.
static OEM_NAMES: &[(u8, &str)] = &[(130, "OEM Slot Information")];

/// Section labels and the type ids they aggregate.
static SECTIONS: &[(&str, &[u8])] = &[
    ("bios", &[0, 13]),
    ("system", &[1, 12, 15, 23, 32]),
    ("baseboard", &[2, 10]),
    ("chassis", &[3]),
    ("processor", &[4]),
    ("memory", &[5, 6, 16, 17, 18, 19, 20, 33, 37]),
    ("cache", &[7]),
    ("connector", &[8]),
    ("slot", &[9]),
];

/// Classifies a type id by range membership.
///
/// The three ranges partition the whole `u8` domain; every id belongs to
/// exactly one class.
pub fn classify(type_id: u8) -> TypeClass {
    match type_id {
        0..=STANDARD_MAX => TypeClass::Standard,
        47..=RESERVED_MAX => TypeClass::Reserved,
        _ => TypeClass::Oem,
    }
}

/// Returns true if the type id is specification-defined
pub fn is_standard_type(type_id: u8) -> bool {
    classify(type_id) == TypeClass::Standard
}

/// Returns true if the type id is in the vendor/OEM range
pub fn is_oem_type(type_id: u8) -> bool {
    classify(type_id) == TypeClass::Oem
}

/// Returns the display name for a type id.
///
/// Known names are consulted first (specification names, then the OEM name
/// table); ids with no known name get a placeholder synthesized from their
/// range class, e.g. `"OEM Type 200"`.
pub fn type_name(type_id: u8) -> String {
    if let Some(name) = STANDARD_NAMES.get(type_id as usize) {
        return (*name).to_string();
    }
    if let Some((_, name)) = RESERVED_NAMES.iter().find(|(id, _)| *id == type_id) {
        return (*name).to_string();
    }
    if let Some((_, name)) = OEM_NAMES.iter().find(|(id, _)| *id == type_id) {
        return (*name).to_string();
    }
    match classify(type_id) {
        TypeClass::Standard => format!("Unknown Type {}", type_id),
        TypeClass::Reserved => format!("Reserved Type {}", type_id),
        TypeClass::Oem => format!("OEM Type {}", type_id),
    }
}

/// Returns the member type ids of a section, or `None` for an unknown label
pub fn section_types(name: &str) -> Option<&'static [u8]> {
    SECTIONS
        .iter()
        .find(|(label, _)| *label == name)
        .map(|(_, types)| *types)
}

/// Returns all known section labels in table order
pub fn section_names() -> impl Iterator<Item = &'static str> {
    SECTIONS.iter().map(|(label, _)| *label)
}

/// Returns the vendor/OEM type id range
pub fn oem_type_ids() -> std::ops::RangeInclusive<u8> {
    OEM_START..=u8::MAX
}

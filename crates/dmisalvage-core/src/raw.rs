//! Raw byte reconstruction.
//!
//! The lowest tier of the recovery pipeline works on plain byte buffers: it
//! normalizes hex-token text back into bytes, recovers the embedded string
//! table using the SMBIOS string-section convention, and renders hex+ASCII
//! dumps for display.
//!
//! ## String-section convention
//!
//! A string-capable structure is followed by zero or more null-terminated
//! strings and a final empty string, so the section always ends in a double
//! null:
//!
//! ```text
//! [header + formatted data][String 1\0][String 2\0]\0
//! ```

use crate::error::{Error, Result};

/// Printable ASCII range used by both the string scanner and the dump
/// formatter (space through tilde, inclusive).
fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// Normalizes hex-token text into bytes.
///
/// Tokens are whitespace-separated, with an optional `0x`/`0X` prefix, and
/// may carry more than one byte each (`"4845"` is two bytes). A token with a
/// non-hex digit, or a text whose total nibble count is odd, is rejected
/// outright; no partial byte sequence is ever produced.
///
/// # Errors
///
/// Returns [`Error::InvalidHexToken`] or [`Error::OddNibbleCount`] for text
/// that cannot be normalized.
pub fn bytes_from_hex(text: &str) -> Result<Vec<u8>> {
    let mut nibbles: Vec<u8> = Vec::new();

    for token in text.split_whitespace() {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);

        if digits.is_empty() {
            return Err(Error::invalid_hex_token(token));
        }

        for c in digits.chars() {
            let nibble = c
                .to_digit(16)
                .ok_or_else(|| Error::invalid_hex_token(token))?;
            nibbles.push(nibble as u8);
        }
    }

    if nibbles.len() % 2 != 0 {
        return Err(Error::odd_nibble_count(nibbles.len()));
    }

    Ok(nibbles
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect())
}

/// Renders bytes as space-separated two-digit uppercase hex
pub fn render_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", byte));
    }
    out
}

/// Recovers the embedded string table from a structure's byte buffer.
///
/// Scanning starts after the fixed-format region (`formatted_len` bytes). A
/// string begins at the first printable ASCII byte; once started, bytes
/// accumulate until a null terminates the string, which is emitted with
/// lossy UTF-8 decoding. A null seen while the accumulator is empty is the
/// double-null terminator: scanning stops immediately. Non-printable bytes
/// outside a string are skipped; an unterminated trailing run is dropped.
pub fn string_table(data: &[u8], formatted_len: usize) -> Vec<String> {
    let mut strings = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for &byte in data.iter().skip(formatted_len) {
        if byte == 0x00 {
            if current.is_empty() {
                break;
            }
            strings.push(String::from_utf8_lossy(&current).into_owned());
            current.clear();
        } else if !current.is_empty() || is_printable(byte) {
            current.push(byte);
        }
    }

    strings
}

/// Hex+ASCII dump formatter.
///
/// Each line carries an 8-hex-digit offset, the hex byte values padded to a
/// fixed column width, and an ASCII rendering with `.` standing in for
/// non-printable bytes:
///
/// ```text
/// 00000000  48 65 6C 6C 6F 00 00                              Hello..
/// ```
#[derive(Debug, Clone)]
pub struct HexDump {
    bytes_per_line: usize,
}

impl Default for HexDump {
    fn default() -> Self {
        Self { bytes_per_line: 16 }
    }
}

impl HexDump {
    /// Creates a formatter with the default 16 bytes per line
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of bytes rendered per line (minimum 1)
    pub fn bytes_per_line(mut self, count: usize) -> Self {
        self.bytes_per_line = count.max(1);
        self
    }

    /// Formats the byte buffer; empty input yields an empty string
    pub fn format(&self, data: &[u8]) -> String {
        let width = self.bytes_per_line;
        let hex_column = width * 3 - 1;
        let mut out = String::new();

        for (line, chunk) in data.chunks(width).enumerate() {
            let hex = render_hex(chunk);
            let ascii: String = chunk
                .iter()
                .map(|&b| if is_printable(b) { b as char } else { '.' })
                .collect();
            out.push_str(&format!(
                "{:08X}  {:<3$}  {}\n",
                line * width,
                hex,
                ascii,
                hex_column
            ));
        }

        out
    }
}

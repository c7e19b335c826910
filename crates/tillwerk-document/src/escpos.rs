// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ESC/POS receipt encoder.
//
// Turns a `ReceiptDocument` into the command stream understood by 58mm/80mm
// thermal printers. Only the vendor-neutral subset is used: initialise,
// alignment, character-size emphasis and partial cut. Text is ASCII, one byte
// per character, laid out on a fixed 32-column grid.
//
// The byte layout is part of the printer contract and must stay bit-exact.

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{LineItem, ReceiptDocument};

/// Column width used for two-column alignment.
pub const LINE_WIDTH: usize = 32;

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const LF: u8 = 0x0A;

/// `ESC @` — reset the printer to power-on state.
pub const INIT: [u8; 2] = [ESC, 0x40];
/// `ESC a 1`
pub const ALIGN_CENTER: [u8; 3] = [ESC, 0x61, 0x01];
/// `ESC a 0`
pub const ALIGN_LEFT: [u8; 3] = [ESC, 0x61, 0x00];
/// `ESC ! 0x30` — double height and double width.
pub const DOUBLE_SIZE: [u8; 3] = [ESC, 0x21, 0x30];
/// `ESC ! 0x10` — double height only.
pub const DOUBLE_HEIGHT: [u8; 3] = [ESC, 0x21, 0x10];
/// `ESC ! 0x00`
pub const NORMAL_SIZE: [u8; 3] = [ESC, 0x21, 0x00];
/// `GS V A 3` — feed three lines and cut, leaving a hinge.
pub const PARTIAL_CUT: [u8; 4] = [GS, 0x56, 0x41, 0x03];

/// Encode a receipt into an ESC/POS byte stream.
///
/// Pure and deterministic: the same document always yields the same bytes.
/// Fails only if the document is structurally invalid (see [`validate`]).
pub fn encode(doc: &ReceiptDocument) -> Result<Vec<u8>> {
    let total = validate(doc)?;
    let mut out = CommandBuffer::with_capacity(256 + doc.items.len() * 40);

    out.raw(&INIT);

    // Header
    out.raw(&ALIGN_CENTER);
    out.raw(&DOUBLE_SIZE);
    out.line(&doc.header);
    out.feed();

    out.raw(&NORMAL_SIZE);
    out.raw(&ALIGN_LEFT);

    let date = doc.timestamp.format("%Y-%m-%d").to_string();
    let time = doc.timestamp.format("%H:%M:%S").to_string();
    out.line(&format!("Date: {date}"));
    out.line(&format!("Time: {time}"));
    out.line(&separator());

    for item in &doc.items {
        out.line(&item_line(item));
        if let Some(note) = item.special_instructions.as_deref() {
            if !note.is_empty() {
                out.line(&format!("  Note: {note}"));
            }
        }
    }

    out.line(&separator());

    if let Some(subtotal) = doc.subtotal.filter(|v| *v != 0.0) {
        out.line(&pad_line("Subtotal:", &format_money(subtotal)));
    }
    if let Some(tax) = doc.tax.filter(|v| *v != 0.0) {
        out.line(&pad_line("Tax:", &format_money(tax)));
    }
    if let Some(discount) = doc.discount.filter(|v| *v != 0.0) {
        out.line(&pad_line("Discount:", &format!("-{}", format_money(discount.abs()))));
    }

    out.raw(&DOUBLE_HEIGHT);
    out.line(&pad_line("TOTAL:", &format_money(total)));
    out.raw(&NORMAL_SIZE);

    // Footer
    out.feed();
    out.raw(&ALIGN_CENTER);
    out.line("Thank You!");
    if !doc.footer.is_empty() {
        out.line(&doc.footer);
    }

    out.feed();
    out.feed();
    out.feed();
    out.raw(&PARTIAL_CUT);

    Ok(out.into_bytes())
}

/// Check that a document can be encoded and return its trusted total.
pub fn validate(doc: &ReceiptDocument) -> Result<f64> {
    let total = doc
        .total
        .ok_or_else(|| TillwerkError::Encoding("total is missing".into()))?;
    if !total.is_finite() {
        return Err(TillwerkError::Encoding(format!("total is not a number: {total}")));
    }

    for (label, value) in [
        ("subtotal", doc.subtotal),
        ("tax", doc.tax),
        ("discount", doc.discount),
    ] {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(TillwerkError::Encoding(format!("{label} is not a number: {v}")));
            }
        }
    }

    for (idx, item) in doc.items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(TillwerkError::Encoding(format!("item {idx} has no name")));
        }
        if item.quantity == 0 {
            return Err(TillwerkError::Encoding(format!(
                "item {idx} ('{}') has zero quantity",
                item.name
            )));
        }
        if !item.unit_price.is_finite() {
            return Err(TillwerkError::Encoding(format!(
                "item {idx} ('{}') has an invalid price",
                item.name
            )));
        }
    }

    Ok(total)
}

/// `"{quantity}x {name}"` left, unit price right.
pub fn item_line(item: &LineItem) -> String {
    let left = format!("{}x {}", item.quantity, ascii(&item.name));
    pad_line(&left, &format_money(item.unit_price))
}

/// Join `left` and `right` with enough spaces to fill [`LINE_WIDTH`].
///
/// When the two do not fit, they are joined with no padding; nothing is
/// wrapped or cut.
pub fn pad_line(left: &str, right: &str) -> String {
    let padding = padding_for(left, right);
    let mut line = String::with_capacity(left.len() + padding + right.len());
    line.push_str(left);
    line.extend(std::iter::repeat_n(' ', padding));
    line.push_str(right);
    line
}

/// Number of spaces between the two columns, never negative.
pub fn padding_for(left: &str, right: &str) -> usize {
    LINE_WIDTH.saturating_sub(left.chars().count() + right.chars().count())
}

/// `$12.50` style, always two decimals. The sign follows the rounded cents,
/// so nothing renders as `-$0.00`.
pub fn format_money(amount: f64) -> String {
    let cents = (amount * 100.0).round();
    let value = (cents / 100.0).abs();
    if cents < 0.0 {
        format!("-${value:.2}")
    } else {
        format!("${value:.2}")
    }
}

/// 32 dashes.
pub fn separator() -> String {
    "-".repeat(LINE_WIDTH)
}

/// Replace anything the printer's base code page cannot show.
pub fn ascii(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_graphic() || c == ' ' {
                c
            } else if c.is_ascii_whitespace() {
                ' '
            } else {
                '?'
            }
        })
        .collect()
}

/// Append-only command buffer.
struct CommandBuffer {
    bytes: Vec<u8>,
}

impl CommandBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    fn raw(&mut self, command: &[u8]) {
        self.bytes.extend_from_slice(command);
    }

    fn line(&mut self, text: &str) {
        self.bytes.extend(ascii(text).bytes());
        self.bytes.push(LF);
    }

    fn feed(&mut self) {
        self.bytes.push(LF);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn sample() -> ReceiptDocument {
        let mut doc = ReceiptDocument::new("Trattoria", 24.50);
        doc.timestamp = DateTime::parse_from_rfc3339("2026-03-01T19:30:05+01:00").unwrap();
        doc.items.push(LineItem::new("Burger", 2, 9.99));
        doc.items.push(LineItem::new("Cola", 1, 2.5).with_note("no ice"));
        doc.subtotal = Some(22.48);
        doc.tax = Some(2.02);
        doc.discount = Some(0.0);
        doc.footer = "See you soon".into();
        doc
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn starts_with_init_and_ends_with_cut() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(&bytes[..2], &[0x1B, 0x40]);
        assert_eq!(&bytes[bytes.len() - 4..], &[0x1D, 0x56, 0x41, 0x03]);
    }

    #[test]
    fn header_block_layout() {
        let bytes = encode(&sample()).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&[0x1B, 0x40]);
        expected.extend_from_slice(&[0x1B, 0x61, 0x01]);
        expected.extend_from_slice(&[0x1B, 0x21, 0x30]);
        expected.extend_from_slice(b"Trattoria\n\n");
        expected.extend_from_slice(&[0x1B, 0x21, 0x00]);
        expected.extend_from_slice(&[0x1B, 0x61, 0x00]);
        expected.extend_from_slice(b"Date: 2026-03-01\nTime: 19:30:05\n");
        expected.extend_from_slice(separator().as_bytes());
        expected.push(LF);
        assert_eq!(&bytes[..expected.len()], &expected[..]);
    }

    #[test]
    fn total_is_double_height_and_reset() {
        let bytes = encode(&sample()).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&[0x1B, 0x21, 0x10]);
        expected.extend_from_slice(pad_line("TOTAL:", "$24.50").as_bytes());
        expected.push(LF);
        expected.extend_from_slice(&[0x1B, 0x21, 0x00]);
        assert!(contains(&bytes, &expected));
    }

    #[test]
    fn footer_tail_layout() {
        let bytes = encode(&sample()).unwrap();
        let mut tail = Vec::new();
        tail.push(LF);
        tail.extend_from_slice(&[0x1B, 0x61, 0x01]);
        tail.extend_from_slice(b"Thank You!\nSee you soon\n\n\n\n");
        tail.extend_from_slice(&[0x1D, 0x56, 0x41, 0x03]);
        assert!(bytes.ends_with(&tail));
    }

    #[test]
    fn burger_line_padding() {
        let left = "2x Burger";
        let right = "$9.99";
        assert_eq!(padding_for(left, right), 32 - 9 - 5);
        let line = item_line(&LineItem::new("Burger", 2, 9.99));
        assert_eq!(line.len(), LINE_WIDTH);
        assert_eq!(line, format!("2x Burger{}$9.99", " ".repeat(18)));
    }

    #[test]
    fn overlong_line_has_zero_padding_and_no_truncation() {
        let name = "Extra Large Margherita With Buffalo Mozzarella";
        let line = item_line(&LineItem::new(name, 1, 129.0));
        assert_eq!(line, format!("1x {name}$129.00"));
        assert!(line.len() > LINE_WIDTH);
    }

    #[test]
    fn notes_and_optional_totals() {
        let bytes = encode(&sample()).unwrap();
        assert!(contains(&bytes, b"  Note: no ice\n"));
        assert!(contains(&bytes, pad_line("Subtotal:", "$22.48").as_bytes()));
        assert!(contains(&bytes, pad_line("Tax:", "$2.02").as_bytes()));
        // Zero discount is omitted.
        assert!(!contains(&bytes, b"Discount:"));
    }

    #[test]
    fn discount_renders_negative() {
        let mut doc = sample();
        doc.discount = Some(3.0);
        let bytes = encode(&doc).unwrap();
        assert!(contains(&bytes, pad_line("Discount:", "-$3.00").as_bytes()));
    }

    #[test]
    fn total_is_rendered_not_recomputed() {
        let mut doc = sample();
        doc.total = Some(1.0);
        let bytes = encode(&doc).unwrap();
        assert!(contains(&bytes, pad_line("TOTAL:", "$1.00").as_bytes()));
    }

    #[test]
    fn missing_total_is_rejected() {
        let mut doc = sample();
        doc.total = None;
        assert!(matches!(encode(&doc), Err(TillwerkError::Encoding(_))));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut doc = sample();
        doc.items[0].quantity = 0;
        assert!(matches!(encode(&doc), Err(TillwerkError::Encoding(_))));
    }

    #[test]
    fn non_ascii_is_replaced_byte_per_char() {
        let mut doc = sample();
        doc.header = "Café".into();
        let bytes = encode(&doc).unwrap();
        assert!(contains(&bytes, b"Caf?\n"));
        assert!(bytes.iter().all(|b| *b < 0x80));
    }

    #[test]
    fn encoding_is_deterministic() {
        let doc = sample();
        assert_eq!(encode(&doc).unwrap(), encode(&doc).unwrap());
    }

    #[test]
    fn money_has_two_decimals() {
        assert_eq!(format_money(5.0), "$5.00");
        assert_eq!(format_money(0.1 + 0.2), "$0.30");
        assert_eq!(format_money(-1.5), "-$1.50");
    }

    #[test]
    fn sub_cent_negatives_render_as_zero() {
        assert_eq!(format_money(-0.001), "$0.00");
        assert_eq!(format_money(-0.004), "$0.00");
        assert_eq!(format_money(-0.0), "$0.00");
        assert_eq!(format_money(-0.006), "-$0.01");
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed-width rendering for print dialogs and spoolers.
//
// Produces the same 32-column layout as the thermal stream, as plain text and
// as a self-contained HTML page sized for an 80mm roll.

use tillwerk_core::error::Result;
use tillwerk_core::types::{ReceiptDocument, RenderedReceipt};

use crate::escpos::{self, LINE_WIDTH, format_money, pad_line, separator};

/// Render a receipt as text and HTML.
pub fn render(doc: &ReceiptDocument) -> Result<RenderedReceipt> {
    let text = render_text(doc)?;
    let title = format!(
        "{} {}",
        escpos::ascii(&doc.header),
        doc.timestamp.format("%Y-%m-%d %H:%M")
    );
    let html = wrap_html(&title, &text);
    Ok(RenderedReceipt { title, text, html })
}

/// Plain 32-column text.
pub fn render_text(doc: &ReceiptDocument) -> Result<String> {
    let total = escpos::validate(doc)?;
    let mut lines: Vec<String> = Vec::new();

    lines.push(center(&escpos::ascii(&doc.header)));
    lines.push(String::new());
    lines.push(format!("Date: {}", doc.timestamp.format("%Y-%m-%d")));
    lines.push(format!("Time: {}", doc.timestamp.format("%H:%M:%S")));
    lines.push(separator());

    for item in &doc.items {
        lines.push(escpos::item_line(item));
        if let Some(note) = item.special_instructions.as_deref().filter(|n| !n.is_empty()) {
            lines.push(format!("  Note: {}", escpos::ascii(note)));
        }
    }
    lines.push(separator());

    if let Some(v) = doc.subtotal.filter(|v| *v != 0.0) {
        lines.push(pad_line("Subtotal:", &format_money(v)));
    }
    if let Some(v) = doc.tax.filter(|v| *v != 0.0) {
        lines.push(pad_line("Tax:", &format_money(v)));
    }
    if let Some(v) = doc.discount.filter(|v| *v != 0.0) {
        lines.push(pad_line("Discount:", &format!("-{}", format_money(v.abs()))));
    }
    lines.push(pad_line("TOTAL:", &format_money(total)));
    lines.push(String::new());
    lines.push(center("Thank You!"));
    if !doc.footer.is_empty() {
        lines.push(center(&escpos::ascii(&doc.footer)));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}

fn center(text: &str) -> String {
    let width = text.chars().count();
    if width >= LINE_WIDTH {
        return text.to_string();
    }
    let left = (LINE_WIDTH - width) / 2;
    format!("{}{}", " ".repeat(left), text)
}

fn wrap_html(title: &str, text: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>@page {{ size: 80mm auto; margin: 4mm; }} \
         body {{ margin: 0; }} \
         pre {{ font-family: 'Courier New', monospace; font-size: 10pt; width: 72mm; }}</style>\
         </head><body><pre>{}</pre></body></html>\n",
        escape_html(title),
        escape_html(text)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

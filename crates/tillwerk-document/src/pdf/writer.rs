// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Receipt PDF writer — an 80mm-wide paginated receipt using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::{Path, PathBuf};

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::ReceiptDocument;
use tracing::{debug, info, instrument};

use crate::escpos::{self, format_money};

/// Roll width.
pub const RECEIPT_WIDTH_MM: f32 = 80.0;

/// Default page length before a new page starts.
const DEFAULT_PAGE_HEIGHT_MM: f32 = 200.0;

const MARGIN_MM: f32 = 4.0;
const FONT_SIZE_PT: f32 = 9.0;
const HEADER_FONT_SIZE_PT: f32 = 12.0;
const LINE_HEIGHT_PT: f32 = 12.0;

/// Courier advance width as a fraction of the font size.
const COURIER_ADVANCE: f32 = 0.6;

/// Width of the quantity column, in characters.
const QTY_COLUMN_CHARS: usize = 4;

/// One positioned run of text on a line.
#[derive(Debug, Clone)]
struct Run {
    x_pt: f32,
    text: String,
    font: BuiltinFont,
    size_pt: f32,
}

/// Writes receipts as 80mm-wide PDFs.
pub struct ReceiptPdfWriter {
    page_height_mm: f32,
}

impl Default for ReceiptPdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptPdfWriter {
    pub fn new() -> Self {
        Self {
            page_height_mm: DEFAULT_PAGE_HEIGHT_MM,
        }
    }

    /// Use a different page length (the width is always 80mm).
    pub fn with_page_height(mut self, height_mm: f32) -> Self {
        self.page_height_mm = height_mm;
        self
    }

    /// Render the receipt and return the PDF bytes.
    #[instrument(skip_all, fields(items = doc.items.len()))]
    pub fn create(&self, doc: &ReceiptDocument) -> Result<Vec<u8>> {
        let total = escpos::validate(doc)?;
        let title = escpos::ascii(&doc.header);
        let lines = layout(doc, total);

        let page_w = Mm(RECEIPT_WIDTH_MM);
        let page_h = Mm(self.page_height_mm);
        let page_h_pt = page_h.into_pt().0;
        let margin_pt = Mm(MARGIN_MM).into_pt().0;
        let usable_height_pt = page_h_pt - 2.0 * margin_pt;
        let lines_per_page = (usable_height_pt / LINE_HEIGHT_PT) as usize;
        if lines_per_page == 0 {
            return Err(TillwerkError::PdfError(format!(
                "page height {}mm leaves no room for text",
                self.page_height_mm
            )));
        }

        let mut pdf = PdfDocument::new(&title);
        let mut pages: Vec<PdfPage> = Vec::new();

        for chunk in lines.chunks(lines_per_page) {
            let mut ops: Vec<Op> = Vec::new();
            for (line_idx, runs) in chunk.iter().enumerate() {
                let y_pt =
                    page_h_pt - margin_pt - LINE_HEIGHT_PT - (line_idx as f32 * LINE_HEIGHT_PT);
                for run in runs {
                    ops.push(Op::StartTextSection);
                    ops.push(Op::SetTextCursor {
                        pos: Point {
                            x: Pt(run.x_pt),
                            y: Pt(y_pt),
                        },
                    });
                    ops.push(Op::SetFontSizeBuiltinFont {
                        size: Pt(run.size_pt),
                        font: run.font.clone(),
                    });
                    ops.push(Op::WriteTextBuiltinFont {
                        items: vec![TextItem::Text(run.text.clone())],
                        font: run.font.clone(),
                    });
                    ops.push(Op::EndTextSection);
                }
            }
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        if pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, Vec::new()));
        }

        pdf.with_pages(pages);

        debug!(lines = lines.len(), pages = pdf.pages.len(), "receipt layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = pdf.save(&PdfSaveOptions::default(), &mut warnings);
        Ok(output)
    }

    /// Render the receipt and write it to `path`.
    pub fn write_to_file(&self, doc: &ReceiptDocument, path: impl AsRef<Path>) -> Result<PathBuf> {
        let bytes = self.create(doc)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "wrote receipt PDF");
        Ok(path.to_path_buf())
    }
}

// -- Layout --------------------------------------------------------------------

fn char_width_pt(size_pt: f32) -> f32 {
    COURIER_ADVANCE * size_pt
}

fn left_edge_pt() -> f32 {
    Mm(MARGIN_MM).into_pt().0
}

fn right_edge_pt() -> f32 {
    Mm(RECEIPT_WIDTH_MM - MARGIN_MM).into_pt().0
}

/// Characters that fit between the margins at body size.
fn columns() -> usize {
    ((right_edge_pt() - left_edge_pt()) / char_width_pt(FONT_SIZE_PT)) as usize
}

fn left(text: impl Into<String>) -> Run {
    Run {
        x_pt: left_edge_pt(),
        text: text.into(),
        font: BuiltinFont::Courier,
        size_pt: FONT_SIZE_PT,
    }
}

fn at_column(col: usize, text: impl Into<String>) -> Run {
    Run {
        x_pt: left_edge_pt() + col as f32 * char_width_pt(FONT_SIZE_PT),
        text: text.into(),
        font: BuiltinFont::Courier,
        size_pt: FONT_SIZE_PT,
    }
}

fn right(text: impl Into<String>, font: BuiltinFont, size_pt: f32) -> Run {
    let text = text.into();
    let width = text.chars().count() as f32 * char_width_pt(size_pt);
    Run {
        x_pt: (right_edge_pt() - width).max(left_edge_pt()),
        text,
        font,
        size_pt,
    }
}

fn centered(text: impl Into<String>, font: BuiltinFont, size_pt: f32) -> Run {
    let text = text.into();
    let width = text.chars().count() as f32 * char_width_pt(size_pt);
    let span = right_edge_pt() - left_edge_pt();
    Run {
        x_pt: left_edge_pt() + ((span - width) / 2.0).max(0.0),
        text,
        font,
        size_pt,
    }
}

fn rule() -> Vec<Run> {
    vec![left("-".repeat(columns()))]
}

fn amount_row(label: &str, amount: String, bold: bool) -> Vec<Run> {
    let font = if bold {
        BuiltinFont::CourierBold
    } else {
        BuiltinFont::Courier
    };
    let mut label_run = left(label);
    label_run.font = font.clone();
    vec![label_run, right(amount, font, FONT_SIZE_PT)]
}

/// Break `text` into pieces of at most `width` characters.
fn chunk_chars(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(width.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// Lay the receipt out as rows of positioned runs.
fn layout(doc: &ReceiptDocument, total: f64) -> Vec<Vec<Run>> {
    let mut lines: Vec<Vec<Run>> = Vec::new();
    let cols = columns();

    lines.push(vec![centered(
        escpos::ascii(&doc.header),
        BuiltinFont::CourierBold,
        HEADER_FONT_SIZE_PT,
    )]);
    lines.push(Vec::new());
    lines.push(vec![
        left(format!("Date: {}", doc.timestamp.format("%Y-%m-%d"))),
        right(
            format!("Time: {}", doc.timestamp.format("%H:%M:%S")),
            BuiltinFont::Courier,
            FONT_SIZE_PT,
        ),
    ]);
    lines.push(rule());
    lines.push(vec![
        left("Qty"),
        at_column(QTY_COLUMN_CHARS, "Item"),
        right("Price", BuiltinFont::Courier, FONT_SIZE_PT),
    ]);
    lines.push(rule());

    for item in &doc.items {
        let price = format_money(item.unit_price);
        // Item names wrap inside their column so prices stay aligned.
        let name_width = cols.saturating_sub(QTY_COLUMN_CHARS + price.len() + 1).max(8);
        let name_parts = chunk_chars(&escpos::ascii(&item.name), name_width);
        for (idx, part) in name_parts.into_iter().enumerate() {
            if idx == 0 {
                lines.push(vec![
                    left(format!("{}x", item.quantity)),
                    at_column(QTY_COLUMN_CHARS, part),
                    right(price.clone(), BuiltinFont::Courier, FONT_SIZE_PT),
                ]);
            } else {
                lines.push(vec![at_column(QTY_COLUMN_CHARS, part)]);
            }
        }
        if let Some(note) = item.special_instructions.as_deref().filter(|n| !n.is_empty()) {
            let note = format!("Note: {}", escpos::ascii(note));
            for part in chunk_chars(&note, cols.saturating_sub(QTY_COLUMN_CHARS + 2)) {
                lines.push(vec![at_column(QTY_COLUMN_CHARS + 2, part)]);
            }
        }
    }

    lines.push(rule());
    if let Some(v) = doc.subtotal.filter(|v| *v != 0.0) {
        lines.push(amount_row("Subtotal", format_money(v), false));
    }
    if let Some(v) = doc.tax.filter(|v| *v != 0.0) {
        lines.push(amount_row("Tax", format_money(v), false));
    }
    if let Some(v) = doc.discount.filter(|v| *v != 0.0) {
        lines.push(amount_row("Discount", format!("-{}", format_money(v.abs())), false));
    }
    lines.push(amount_row("TOTAL", format_money(total), true));
    lines.push(Vec::new());
    lines.push(vec![centered("Thank You!", BuiltinFont::Courier, FONT_SIZE_PT)]);
    if !doc.footer.is_empty() {
        lines.push(vec![centered(
            escpos::ascii(&doc.footer),
            BuiltinFont::Courier,
            FONT_SIZE_PT,
        )]);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillwerk_core::types::LineItem;

    fn sample(items: usize) -> ReceiptDocument {
        let mut doc = ReceiptDocument::new("Bistro", 42.0);
        for i in 0..items {
            doc.items.push(LineItem::new(format!("Dish {i}"), 1, 4.2));
        }
        doc.tax = Some(3.5);
        doc
    }

    #[test]
    fn short_receipt_is_one_page() {
        let bytes = ReceiptPdfWriter::new().create(&sample(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn long_receipt_paginates() {
        let bytes = ReceiptPdfWriter::new()
            .with_page_height(100.0)
            .create(&sample(80))
            .unwrap();
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(parsed.get_pages().len() > 1);
    }

    #[test]
    fn prices_are_right_aligned() {
        let doc = sample(1);
        let lines = layout(&doc, 42.0);
        let item_row = lines
            .iter()
            .find(|runs| runs.iter().any(|r| r.text == "Dish 0"))
            .unwrap();
        let price = item_row.iter().find(|r| r.text == "$4.20").unwrap();
        let end = price.x_pt + price.text.len() as f32 * char_width_pt(FONT_SIZE_PT);
        assert!((end - right_edge_pt()).abs() < 0.01);
    }

    #[test]
    fn long_names_wrap_inside_column() {
        let mut doc = sample(0);
        doc.items.push(LineItem::new("A".repeat(60), 2, 1.0));
        let lines = layout(&doc, 42.0);
        let wrapped: usize = lines
            .iter()
            .filter(|runs| runs.iter().any(|r| r.text.starts_with('A')))
            .count();
        assert!(wrapped >= 2);
    }

    #[test]
    fn missing_total_is_rejected() {
        let mut doc = sample(1);
        doc.total = None;
        assert!(matches!(
            ReceiptPdfWriter::new().create(&doc),
            Err(TillwerkError::Encoding(_))
        ));
    }

    #[test]
    fn writes_file_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("receipt.pdf");
        let written = ReceiptPdfWriter::new().write_to_file(&sample(2), &path).unwrap();
        assert!(written.exists());
    }
}

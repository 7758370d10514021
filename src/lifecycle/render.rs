//! Result document rendering.
//!
//! The document is a plain PDF built from the tally alone: no timestamps,
//! IDs or other incidental data end up in it, so the same votes always
//! render to the same bytes.

use std::fmt::Write;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

use crate::{lifecycle::tally::ElectionTally, model::db::Election};

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 56;
const COUNT_COLUMN: u32 = 470;

/// One line of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Title(String),
    Heading(String),
    Text(String),
    /// A name and its vote count.
    Row(String, u64),
    Blank,
}

impl Line {
    /// Font resource, size and vertical advance.
    fn style(&self) -> (&'static str, u32, u32) {
        match self {
            Line::Title(_) => ("F2", 18, 26),
            Line::Heading(_) => ("F2", 12, 20),
            Line::Text(_) | Line::Row(..) => ("F1", 10, 15),
            Line::Blank => ("F1", 10, 10),
        }
    }
}

/// Render the result document for a closed election.
pub fn render_result(election: &Election, tally: &ElectionTally, closes_at: DateTime<Tz>) -> Vec<u8> {
    write_pdf(&paginate(&result_lines(election, tally, closes_at)))
}

fn result_lines(election: &Election, tally: &ElectionTally, closes_at: DateTime<Tz>) -> Vec<Line> {
    let mut lines = vec![
        Line::Title(election.name.clone()),
        Line::Text(format!("@{}", election.slug)),
        Line::Text(format!(
            "{} - {}",
            long_date(election.start_date),
            long_date(election.end_date)
        )),
        Line::Text(format!(
            "Open from {} to {}",
            hour_label(election.voting_start),
            hour_label(election.voting_end)
        )),
        Line::Text(format!(
            "Official result as of {}",
            closes_at.format("%B %-d, %Y, %-I %p")
        )),
        Line::Blank,
    ];
    for position in &tally.positions {
        lines.push(Line::Heading(position.name.clone()));
        for candidate in &position.candidates {
            lines.push(Line::Row(candidate.name.clone(), candidate.votes));
        }
        lines.push(Line::Row("Abstain".to_string(), position.abstain));
        lines.push(Line::Blank);
    }
    lines
}

fn long_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// `0` -> `12 AM`, `13` -> `1 PM`.
fn hour_label(hour: u32) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let twelve = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{twelve} {suffix}")
}

/// Split lines into pages, returning each page's content stream.
fn paginate(lines: &[Line]) -> Vec<String> {
    let mut pages = Vec::new();
    let mut content = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        let (font, size, advance) = line.style();
        if y < MARGIN + advance {
            pages.push(std::mem::take(&mut content));
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= advance;
        match line {
            Line::Title(text) | Line::Heading(text) | Line::Text(text) => {
                text_op(&mut content, font, size, MARGIN, y, text);
            }
            Line::Row(name, votes) => {
                text_op(&mut content, font, size, MARGIN + 12, y, name);
                text_op(&mut content, font, size, COUNT_COLUMN, y, &votes.to_string());
            }
            Line::Blank => {}
        }
    }
    pages.push(content);
    pages
}

fn text_op(content: &mut String, font: &str, size: u32, x: u32, y: u32, text: &str) {
    // Writing to a `String` cannot fail.
    let _ = writeln!(
        content,
        "BT /{font} {size} Tf {x} {y} Td ({}) Tj ET",
        escape_pdf_text(text)
    );
}

/// Escape text for a PDF literal string in WinAnsiEncoding.
/// Characters outside Latin-1 are replaced with `?`.
fn escape_pdf_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            ' '..='~' => escaped.push(c),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(escaped, "\\{:03o}", c as u32);
            }
            _ => escaped.push('?'),
        }
    }
    escaped
}

/// Assemble a PDF from page content streams.
fn write_pdf(pages: &[String]) -> Vec<u8> {
    // Objects 1-4 are fixed; each page then takes a page and a content object.
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 5 + 2 * i).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{id} 0 R"))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (content, page_id) in pages.iter().zip(&page_ids) {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
/Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            page_id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}endstream",
            content.len()
        ));
    }

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        let _ = write!(pdf, "{} 0 obj\n{object}\nendobj\n", i + 1);
    }
    let xref = pdf.len();
    let _ = write!(pdf, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(pdf, "{offset:010} 00000 n ");
    }
    let _ = write!(
        pdf,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    );
    pdf.into_bytes()
}

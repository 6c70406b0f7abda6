//! services/api/src/report/pdf.rs
//!
//! A sequential PDF emitter. Objects are written to the underlying sink in
//! the order they are composed: header and font objects first, then each
//! page's content stream (with its `/Length` as a forward indirect
//! reference, resolved immediately after the stream), and finally the pages
//! tree, catalog, and cross-reference table. Nothing is buffered beyond the
//! sink itself, which is what lets single-profile reports stream while they
//! are still being composed.
//!
//! Text uses the built-in Helvetica / Helvetica-Bold base fonts with WinAnsi
//! encoding and uncompressed content streams.

use std::io::{self, Write};

pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;
pub const MARGIN: f64 = 72.0;

const CATALOG_ID: u32 = 1;
const PAGES_ID: u32 = 2;
const FONT_REGULAR_ID: u32 = 3;
const FONT_BOLD_ID: u32 = 4;

/// The two fonts every page's resource dictionary exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "/F1",
            Font::Bold => "/F2",
        }
    }
}

struct OpenPage {
    content_id: u32,
    length_id: u32,
    stream_start: u64,
}

/// Writes one PDF document to `out`, page by page.
pub struct PdfWriter<W: Write> {
    out: W,
    offset: u64,
    /// (object id, byte offset) for the cross-reference table.
    offsets: Vec<(u32, u64)>,
    page_ids: Vec<u32>,
    next_id: u32,
    open_page: Option<OpenPage>,
}

impl<W: Write> PdfWriter<W> {
    /// Writes the document header and shared font objects.
    pub fn new(out: W) -> io::Result<Self> {
        let mut writer = Self {
            out,
            offset: 0,
            offsets: Vec::new(),
            page_ids: Vec::new(),
            next_id: FONT_BOLD_ID + 1,
            open_page: None,
        };
        // The binary comment line marks the file as non-ASCII for transports.
        writer.emit(b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n")?;
        writer.font_object(FONT_REGULAR_ID, "Helvetica")?;
        writer.font_object(FONT_BOLD_ID, "Helvetica-Bold")?;
        Ok(writer)
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn begin_object(&mut self, id: u32) -> io::Result<()> {
        self.offsets.push((id, self.offset));
        self.emit(format!("{} 0 obj\n", id).as_bytes())
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn font_object(&mut self, id: u32, base_font: &str) -> io::Result<()> {
        self.begin_object(id)?;
        self.emit(
            format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>\nendobj\n",
                base_font
            )
            .as_bytes(),
        )
    }

    /// Opens a new page and its content stream. The stream length is not yet
    /// known, so it is declared as a reference to an object written in
    /// `end_page`.
    pub fn begin_page(&mut self) -> io::Result<()> {
        debug_assert!(self.open_page.is_none(), "page already open");
        let content_id = self.alloc_id();
        let length_id = self.alloc_id();
        self.begin_object(content_id)?;
        self.emit(format!("<< /Length {} 0 R >>\nstream\n", length_id).as_bytes())?;
        self.open_page = Some(OpenPage {
            content_id,
            length_id,
            stream_start: self.offset,
        });
        Ok(())
    }

    /// Appends raw content-stream operators to the open page.
    pub fn content(&mut self, ops: &str) -> io::Result<()> {
        debug_assert!(self.open_page.is_some(), "no open page");
        self.emit(ops.as_bytes())
    }

    /// Closes the open page: ends the stream, resolves its length, and writes
    /// the page object.
    pub fn end_page(&mut self) -> io::Result<()> {
        let page = self
            .open_page
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no open page"))?;
        let stream_len = self.offset - page.stream_start;
        self.emit(b"endstream\nendobj\n")?;

        self.begin_object(page.length_id)?;
        self.emit(format!("{}\nendobj\n", stream_len).as_bytes())?;

        let page_id = self.alloc_id();
        self.begin_object(page_id)?;
        self.emit(
            format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 {} 0 R /F2 {} 0 R >> >> /Contents {} 0 R >>\nendobj\n",
                PAGES_ID, PAGE_WIDTH, PAGE_HEIGHT, FONT_REGULAR_ID, FONT_BOLD_ID, page.content_id
            )
            .as_bytes(),
        )?;
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Flushes the sink; in streaming mode this hands the buffered bytes to
    /// the transport.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Writes the pages tree, catalog, cross-reference table, and trailer.
    pub fn finish(mut self) -> io::Result<()> {
        debug_assert!(self.open_page.is_none(), "finish with an open page");

        self.begin_object(PAGES_ID)?;
        let kids = self
            .page_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        self.emit(
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>\nendobj\n",
                kids,
                self.page_ids.len()
            )
            .as_bytes(),
        )?;

        self.begin_object(CATALOG_ID)?;
        self.emit(format!("<< /Type /Catalog /Pages {} 0 R >>\nendobj\n", PAGES_ID).as_bytes())?;

        let xref_start = self.offset;
        self.offsets.sort_by_key(|(id, _)| *id);
        let size = self.next_id;
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", size);
        for (_, offset) in &self.offsets {
            xref.push_str(&format!("{:010} 00000 n \n", offset));
        }
        self.emit(xref.as_bytes())?;
        self.emit(
            format!(
                "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
                size, CATALOG_ID, xref_start
            )
            .as_bytes(),
        )?;
        self.out.flush()
    }
}

//=========================================================================================
// Text layout
//=========================================================================================

/// Glyph advance widths for Helvetica, chars 0x20..=0x7e, in 1/1000 em
/// (standard AFM metrics). Used for centering and underlines; the bold face
/// reuses the table, close enough for both purposes.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Approximate width of `text` at `size` points.
pub fn text_width(text: &str, size: f64) -> f64 {
    let units: u32 = encode_winansi(text)
        .iter()
        .map(|&b| match b {
            0x20..=0x7e => u32::from(HELVETICA_WIDTHS[usize::from(b) - 0x20]),
            _ => 556,
        })
        .sum();
    f64::from(units) * size / 1000.0
}

/// Encodes text as WinAnsi bytes. ASCII and Latin-1 pass through; the rupee
/// sign has no glyph in the base-14 fonts and is transliterated to "Rs";
/// anything else becomes '?'.
fn encode_winansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '₹' => bytes.extend_from_slice(b"Rs"),
            _ if (c as u32) < 0x100 => bytes.push(c as u8),
            _ => bytes.push(b'?'),
        }
    }
    bytes
}

/// Escapes WinAnsi bytes into a PDF literal string (the part between
/// parentheses).
fn escape_string(text: &str) -> String {
    let mut escaped = String::new();
    for b in encode_winansi(text) {
        match b {
            b'(' => escaped.push_str("\\("),
            b')' => escaped.push_str("\\)"),
            b'\\' => escaped.push_str("\\\\"),
            0x20..=0x7e => escaped.push(b as char),
            _ => escaped.push_str(&format!("\\{:03o}", b)),
        }
    }
    escaped
}

/// Lays text lines out on pages, top to bottom, opening continuation pages
/// when the cursor reaches the bottom margin.
pub struct PageComposer<'a, W: Write> {
    pdf: &'a mut PdfWriter<W>,
    y: f64,
}

impl<'a, W: Write> PageComposer<'a, W> {
    const LEADING: f64 = 1.3;

    /// Opens the first page.
    pub fn start(pdf: &'a mut PdfWriter<W>) -> io::Result<Self> {
        pdf.begin_page()?;
        Ok(Self {
            pdf,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    /// Closes the current page.
    pub fn finish(self) -> io::Result<()> {
        self.pdf.end_page()
    }

    /// Explicit page break: one per profile boundary in batch reports.
    pub fn page_break(&mut self) -> io::Result<()> {
        self.pdf.end_page()?;
        self.pdf.begin_page()?;
        self.y = PAGE_HEIGHT - MARGIN;
        Ok(())
    }

    fn advance(&mut self, size: f64) -> io::Result<f64> {
        let line_height = size * Self::LEADING;
        if self.y - line_height < MARGIN {
            self.page_break()?;
        }
        self.y -= line_height;
        Ok(self.y)
    }

    fn text_at(&mut self, font: Font, size: f64, x: f64, y: f64, text: &str) -> io::Result<()> {
        self.pdf.content(&format!(
            "BT {} {} Tf 1 0 0 1 {:.2} {:.2} Tm ({}) Tj ET\n",
            font.resource_name(),
            size,
            x,
            y,
            escape_string(text)
        ))
    }

    /// A left-aligned line in the regular face.
    pub fn line(&mut self, text: &str, size: f64) -> io::Result<()> {
        let y = self.advance(size)?;
        self.text_at(Font::Regular, size, MARGIN, y, text)
    }

    /// A horizontally centered line in the bold face (titles).
    pub fn centered(&mut self, text: &str, size: f64) -> io::Result<()> {
        let y = self.advance(size)?;
        let x = (PAGE_WIDTH - text_width(text, size)) / 2.0;
        self.text_at(Font::Bold, size, x.max(MARGIN), y, text)
    }

    /// An underlined bold line (section headings and the user header).
    pub fn heading(&mut self, text: &str, size: f64) -> io::Result<()> {
        let y = self.advance(size)?;
        self.text_at(Font::Bold, size, MARGIN, y, text)?;
        let width = text_width(text, size);
        self.pdf.content(&format!(
            "{:.2} {:.2} m {:.2} {:.2} l 0.7 w S\n",
            MARGIN,
            y - 2.0,
            MARGIN + width,
            y - 2.0
        ))
    }

    /// Vertical whitespace equivalent to `lines` lines at `size`.
    pub fn gap(&mut self, lines: f64, size: f64) -> io::Result<()> {
        self.y -= size * Self::LEADING * lines;
        if self.y < MARGIN {
            self.y = MARGIN;
        }
        Ok(())
    }

    /// Hands buffered bytes to the sink (streaming delivery point).
    pub fn flush(&mut self) -> io::Result<()> {
        self.pdf.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_pages(lines_per_page: &[&[&str]]) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut pdf = PdfWriter::new(&mut buffer).unwrap();
        let mut composer = PageComposer::start(&mut pdf).unwrap();
        for (i, lines) in lines_per_page.iter().enumerate() {
            if i > 0 {
                composer.page_break().unwrap();
            }
            for line in *lines {
                composer.line(line, 10.0).unwrap();
            }
        }
        composer.finish().unwrap();
        pdf.finish().unwrap();
        buffer
    }

    #[test]
    fn document_has_header_trailer_and_pages() {
        let bytes = render_pages(&[&["hello"], &["world"]]);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert_eq!(text.matches("/Type /Page ").count(), 2);
        assert!(text.contains("/Count 2"));
        assert!(text.contains("(hello) Tj"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let bytes = render_pages(&[&["x"]]);
        let text = String::from_utf8_lossy(&bytes);
        let xref_pos = text.rfind("\nxref\n").unwrap() + 1;
        // Every in-use entry must point at an "N 0 obj" line. Offsets are
        // byte positions, so check against the raw bytes.
        let mut checked = 0;
        for line in text[xref_pos..].lines().skip(2) {
            let Some(offset) = line.split(' ').next().and_then(|o| o.parse::<usize>().ok())
            else {
                break;
            };
            if line.ends_with("n ") {
                let tail = &bytes[offset..];
                let line_end = tail.iter().position(|&b| b == b'\n').unwrap();
                let obj_line = std::str::from_utf8(&tail[..line_end]).unwrap();
                assert!(obj_line.ends_with(" 0 obj"), "offset {} mis-aimed", offset);
                checked += 1;
            }
        }
        // header + 2 fonts + content + length + page + pages + catalog minus free entry
        assert!(checked >= 7);
    }

    #[test]
    fn strings_are_escaped_and_transliterated() {
        assert_eq!(escape_string("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_string("₹100"), "Rs100");
    }

    #[test]
    fn long_content_overflows_onto_a_new_page() {
        let lines: Vec<String> = (0..120).map(|i| format!("line {}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let bytes = render_pages(&[&refs]);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.matches("/Type /Page ").count() >= 2);
    }
}

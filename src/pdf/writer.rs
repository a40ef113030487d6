//! Filled-form PDF generation
//!
//! Text is laid out line by line on US Letter pages using the standard
//! Helvetica fonts, then encoded with lopdf. Layout and encoding are kept
//! apart so pagination can be inspected without parsing PDF bytes.

use crate::error::{Error, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// US Letter width in points
pub const PAGE_WIDTH: i64 = 612;
/// US Letter height in points
pub const PAGE_HEIGHT: i64 = 792;
/// Left, top and bottom margin in points
pub const MARGIN: i64 = 40;
/// Vertical advance per drawn or blank line
pub const LINE_HEIGHT: i64 = 12;
/// Gap between the title and the first body line
const TITLE_GAP: i64 = 30;
/// Maximum characters per drawn line
pub const WRAP_WIDTH: usize = 110;
pub const TITLE_FONT_SIZE: i64 = 14;
pub const BODY_FONT_SIZE: i64 = 10;
/// Heading drawn at the top of the first page
pub const TITLE: &str = "AI-Filled Form";
/// Download name for the generated document
pub const FILLED_PDF_FILE_NAME: &str = "AI_Filled_Form.pdf";
pub const FILLED_PDF_MIME_TYPE: &str = "application/pdf";

const TOP: i64 = PAGE_HEIGHT - MARGIN;

/// Standard font used for a drawn line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Regular,
    Bold,
}

impl FontFace {
    fn resource_name(self) -> &'static [u8] {
        match self {
            FontFace::Regular => b"F1",
            FontFace::Bold => b"F2",
        }
    }

    fn base_font(self) -> &'static [u8] {
        match self {
            FontFace::Regular => b"Helvetica",
            FontFace::Bold => b"Helvetica-Bold",
        }
    }
}

/// A single line of text at an absolute position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub face: FontFace,
    pub size: i64,
    pub x: i64,
    /// Baseline, measured from the bottom of the page
    pub y: i64,
    pub text: String,
}

/// Lines placed on one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
}

/// Split a line into segments of at most `width` characters.
///
/// Splits ignore word boundaries. An empty line yields one empty segment.
pub fn wrap_line(line: &str, width: usize) -> Vec<&str> {
    let width = width.max(1);
    let mut segments = Vec::new();
    let mut rest = line;

    while let Some((split, _)) = rest.char_indices().nth(width) {
        let (head, tail) = rest.split_at(split);
        segments.push(head);
        rest = tail;
    }
    segments.push(rest);

    segments
}

/// Lay out the title and body text across as many pages as needed
pub fn layout_pages(text: &str) -> Vec<PageLayout> {
    let mut pages = Vec::new();
    let mut page = PageLayout::default();
    let mut y = TOP;

    page.lines.push(PlacedLine {
        face: FontFace::Bold,
        size: TITLE_FONT_SIZE,
        x: MARGIN,
        y,
        text: TITLE.to_string(),
    });
    y -= TITLE_GAP;

    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if line.trim().is_empty() {
            y -= LINE_HEIGHT;
            continue;
        }

        for segment in wrap_line(line, WRAP_WIDTH) {
            if y < MARGIN {
                pages.push(std::mem::take(&mut page));
                y = TOP;
            }
            page.lines.push(PlacedLine {
                face: FontFace::Regular,
                size: BODY_FONT_SIZE,
                x: MARGIN,
                y,
                text: segment.to_string(),
            });
            y -= LINE_HEIGHT;
        }
    }

    pages.push(page);
    pages
}

/// Render filled form text into a complete in-memory PDF document
pub fn render_filled_pdf(text: &str) -> Result<Vec<u8>> {
    let pages = layout_pages(text);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for face in [FontFace::Regular, FontFace::Bold] {
        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(face.base_font().to_vec()));
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        let font_id = doc.add_object(font);
        fonts.set(face.resource_name(), Object::Reference(font_id));
    }
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    let resources_id = doc.add_object(resources);

    let mut kids = Vec::with_capacity(pages.len());
    for page in &pages {
        let page_id = add_page(&mut doc, page, pages_id, resources_id)?;
        kids.push(Object::Reference(page_id));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(kids.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).map_err(|e| Error::Render {
        reason: format!("Failed to serialize PDF: {}", e),
    })?;

    tracing::debug!(pages = pages.len(), bytes = output.len(), "rendered filled PDF");
    Ok(output)
}

fn add_page(
    doc: &mut Document,
    page: &PageLayout,
    parent: ObjectId,
    resources: ObjectId,
) -> Result<ObjectId> {
    let mut operations = vec![Operation::new("BT", vec![])];
    let mut current_font = None;

    for line in &page.lines {
        if current_font != Some((line.face, line.size)) {
            operations.push(Operation::new(
                "Tf",
                vec![
                    Object::Name(line.face.resource_name().to_vec()),
                    Object::Integer(line.size),
                ],
            ));
            current_font = Some((line.face, line.size));
        }
        operations.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Integer(line.x),
                Object::Integer(line.y),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&line.text),
                StringFormat::Literal,
            )],
        ));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations }.encode().map_err(|e| Error::Render {
        reason: format!("Failed to encode page content: {}", e),
    })?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let mut page_dict = Dictionary::new();
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(parent));
    page_dict.set("Contents", Object::Reference(content_id));
    page_dict.set("Resources", Object::Reference(resources));
    page_dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ]),
    );

    Ok(doc.add_object(page_dict))
}

/// WinAnsiEncoding glyphs in 0x80..=0x9F; 0x81, 0x8D, 0x8F, 0x90 and 0x9D are unassigned
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'), // euro sign
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'), // ellipsis
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'), // curly quotes
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'), // bullet
    (0x96, '\u{2013}'), // en dash
    (0x97, '\u{2014}'), // em dash
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'), // trademark
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

/// Map text onto WinAnsiEncoding; characters with no glyph become '?'
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            0x09 => b' ',
            _ => WIN_ANSI_HIGH
                .iter()
                .find(|&&(_, glyph)| glyph == c)
                .map_or(b'?', |&(byte, _)| byte),
        })
        .collect()
}

fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WIN_ANSI_HIGH
                .iter()
                .find(|&&(byte, _)| byte == b)
                .map_or('?', |&(_, glyph)| glyph),
            _ => char::from(b),
        })
        .collect()
}

/// Read back every line drawn by [`render_filled_pdf`], page by page in drawing order
pub fn extract_drawn_lines(pdf: &[u8]) -> Result<Vec<Vec<String>>> {
    let doc = Document::load_mem(pdf).map_err(|e| Error::InvalidPdf {
        reason: e.to_string(),
    })?;

    let mut pages = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let raw = doc.get_page_content(page_id).map_err(|e| Error::InvalidPdf {
            reason: e.to_string(),
        })?;
        let content = Content::decode(&raw).map_err(|e| Error::InvalidPdf {
            reason: e.to_string(),
        })?;

        let lines = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(decode_win_ansi(bytes)),
                _ => None,
            })
            .collect();
        pages.push(lines);
    }

    Ok(pages)
}

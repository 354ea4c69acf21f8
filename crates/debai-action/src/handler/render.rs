//! File writers for generated documents.
//!
//! docx and xlsx are written as minimal zipped OpenXML packages, pdf as a
//! single-font PDF 1.4 file, txt as plain text.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::types::{DocumentFormat, DocumentRequest, Section};

/// Write `request` to `path` in the request's format.
pub fn render(request: &DocumentRequest, path: &Path) -> io::Result<()> {
    match request.format {
        DocumentFormat::Docx => write_docx(request, path),
        DocumentFormat::Xlsx => write_xlsx(request, path),
        DocumentFormat::Pdf => write_pdf(request, path),
        DocumentFormat::Txt => write_txt(request, path),
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}

fn write_package(path: &Path, parts: &[(&str, String)]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in parts {
        writer.start_file(*name, options).map_err(io::Error::other)?;
        writer.write_all(content.as_bytes())?;
    }
    writer.finish().map_err(io::Error::other)?;
    Ok(())
}

// =============================================================================
// docx
// =============================================================================

const DOCX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

const DOCX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCX_DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const DOCX_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:sz w:val="22"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:pPr><w:jc w:val="center"/><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="40"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:before="240" w:after="120"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style>
</w:styles>"#;

fn docx_paragraph(out: &mut String, style: Option<&str>, text: &str) {
    out.push_str("<w:p>");
    if let Some(style) = style {
        let _ = write!(out, r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, style);
    }
    let _ = write!(
        out,
        r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        xml_escape(text)
    );
}

fn docx_body(request: &DocumentRequest) -> String {
    let mut body = String::new();
    docx_paragraph(&mut body, Some("Title"), &request.title);
    for section in &request.sections {
        if let Some(heading) = &section.heading {
            docx_paragraph(&mut body, Some("Heading1"), heading);
        }
        for line in section.body.lines() {
            docx_paragraph(&mut body, None, line);
        }
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    )
}

fn write_docx(request: &DocumentRequest, path: &Path) -> io::Result<()> {
    write_package(
        path,
        &[
            ("[Content_Types].xml", DOCX_CONTENT_TYPES.to_string()),
            ("_rels/.rels", DOCX_ROOT_RELS.to_string()),
            ("word/_rels/document.xml.rels", DOCX_DOCUMENT_RELS.to_string()),
            ("word/styles.xml", DOCX_STYLES.to_string()),
            ("word/document.xml", docx_body(request)),
        ],
    )
}

// =============================================================================
// xlsx
// =============================================================================

const XLSX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const XLSX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const XLSX_WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

/// Rows of a spreadsheet: one per non-empty content line, cells split on
/// `|` when present, otherwise on `,`. Markdown separator rows are skipped.
pub fn sheet_rows(request: &DocumentRequest) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = request
        .sections
        .iter()
        .flat_map(|s| s.body.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(split_cells)
        .filter(|cells| {
            !cells
                .iter()
                .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
        })
        .collect();
    if rows.is_empty() {
        rows.push(vec![request.title.clone()]);
    }
    rows
}

fn split_cells(line: &str) -> Vec<String> {
    if line.contains('|') {
        line.trim_matches('|')
            .split('|')
            .map(|c| c.trim().to_string())
            .collect()
    } else {
        line.split(',').map(|c| c.trim().to_string()).collect()
    }
}

/// Spreadsheet column letters for a zero-based index: A, B, ..., Z, AA.
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned.trim().to_string()
    }
}

fn write_xlsx(request: &DocumentRequest, path: &Path) -> io::Result<()> {
    let mut sheet_data = String::new();
    for (r, row) in sheet_rows(request).iter().enumerate() {
        let _ = write!(sheet_data, r#"<row r="{}">"#, r + 1);
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(c), r + 1);
            if r > 0 && cell.parse::<f64>().is_ok_and(f64::is_finite) {
                let _ = write!(sheet_data, r#"<c r="{}"><v>{}</v></c>"#, reference, cell);
            } else {
                let _ = write!(
                    sheet_data,
                    r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    reference,
                    xml_escape(cell)
                );
            }
        }
        sheet_data.push_str("</row>");
    }

    let worksheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        sheet_data
    );
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        xml_escape(&sheet_name(&request.title))
    );

    write_package(
        path,
        &[
            ("[Content_Types].xml", XLSX_CONTENT_TYPES.to_string()),
            ("_rels/.rels", XLSX_ROOT_RELS.to_string()),
            ("xl/_rels/workbook.xml.rels", XLSX_WORKBOOK_RELS.to_string()),
            ("xl/workbook.xml", workbook),
            ("xl/worksheets/sheet1.xml", worksheet),
        ],
    )
}

// =============================================================================
// pdf
// =============================================================================

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const BODY_SIZE: f32 = 11.0;
const WRAP_COLUMNS: usize = 90;

struct PdfLine {
    text: String,
    size: f32,
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn pdf_lines(request: &DocumentRequest) -> Vec<PdfLine> {
    let mut lines = Vec::new();
    let push = |lines: &mut Vec<PdfLine>, text: &str, size: f32, width: usize| {
        for line in wrap(text, width) {
            lines.push(PdfLine { text: line, size });
        }
    };
    push(&mut lines, &request.title, 18.0, 50);
    lines.push(PdfLine {
        text: String::new(),
        size: BODY_SIZE,
    });
    for Section { heading, body } in &request.sections {
        if let Some(heading) = heading {
            push(&mut lines, heading, 14.0, 65);
        }
        for paragraph in body.lines() {
            push(&mut lines, paragraph, BODY_SIZE, WRAP_COLUMNS);
        }
        lines.push(PdfLine {
            text: String::new(),
            size: BODY_SIZE,
        });
    }
    lines
}

fn pdf_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Content streams, one per page.
fn pdf_pages(lines: &[PdfLine]) -> Vec<String> {
    let mut pages = Vec::new();
    let mut stream = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        let leading = line.size * 1.4;
        if y - leading < MARGIN {
            pages.push(std::mem::take(&mut stream));
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= leading;
        if !line.text.is_empty() {
            let _ = writeln!(
                stream,
                "BT /F1 {} Tf {} {} Td ({}) Tj ET",
                line.size,
                MARGIN,
                y,
                pdf_escape(&line.text)
            );
        }
    }
    pages.push(stream);
    pages
}

fn pdf_document(request: &DocumentRequest) -> Vec<u8> {
    let pages = pdf_pages(&pdf_lines(request));
    // Objects: 1 catalog, 2 page tree, 3 font, then page/content pairs.
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + i * 2).collect();

    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (page_id, stream) in page_ids.iter().zip(&pages) {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH,
            PAGE_HEIGHT,
            page_id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, object);
    }
    let xref = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(out, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref
    );
    out.into_bytes()
}

fn write_pdf(request: &DocumentRequest, path: &Path) -> io::Result<()> {
    std::fs::write(path, pdf_document(request))
}

// =============================================================================
// txt
// =============================================================================

fn write_txt(request: &DocumentRequest, path: &Path) -> io::Result<()> {
    let mut out = String::new();
    let _ = writeln!(out, "{}", request.title);
    let _ = writeln!(out, "{}\n", "=".repeat(request.title.chars().count()));
    for section in &request.sections {
        if let Some(heading) = &section.heading {
            let _ = writeln!(out, "{}", heading);
            let _ = writeln!(out, "{}", "-".repeat(heading.chars().count()));
        }
        let _ = writeln!(out, "{}\n", section.body);
    }
    std::fs::write(path, out.trim_end().to_string() + "\n")
}

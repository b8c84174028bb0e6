use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::errors::AppError;

/// Extracts plain text from an uploaded resume. PDFs go through `pdf-extract`, DOCX files
/// are read from their `word/document.xml` part; anything else must be UTF-8 text.
pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
    let text = if is_pdf(file_name, bytes) {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| AppError::Validation(format!("Could not read PDF: {e}")))?
    } else if is_docx(file_name, bytes) {
        extract_docx_text(bytes)?
    } else {
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            AppError::Validation("Resume must be a PDF, DOCX or UTF-8 text file".to_string())
        })?
    };

    let text = normalize(&text);
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "No text could be extracted from the resume".to_string(),
        ));
    }
    Ok(text)
}

fn is_pdf(file_name: &str, bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF") || file_name.to_lowercase().ends_with(".pdf")
}

fn is_docx(file_name: &str, bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || file_name.to_lowercase().ends_with(".docx")
}

fn extract_docx_text(bytes: &[u8]) -> Result<String, AppError> {
    let invalid = |e: &dyn std::fmt::Display| AppError::Validation(format!("Could not read DOCX: {e}"));

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| invalid(&e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| invalid(&e))?
        .read_to_string(&mut xml)
        .map_err(|e| invalid(&e))?;

    document_paragraphs(&xml).map_err(|e| invalid(&e))
}

/// One line per `w:p` paragraph, built from its `w:t` runs.
fn document_paragraphs(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.decode()?),
            Event::GeneralRef(r) if in_text => {
                if let Some(c) = r.resolve_char_ref()? {
                    out.push(c);
                } else if let Some(s) = quick_xml::escape::resolve_predefined_entity(&r.decode()?) {
                    out.push_str(s);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Normalizes line endings and collapses runs of blank lines to one.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.replace("\r\n", "\n").replace('\r', "\n").lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! DOCX paragraph extraction
//!
//! Reads `word/document.xml` out of the ZIP container and collects the text
//! runs of each `<w:p>` paragraph.

use std::io::{Cursor, Read};

use quick_xml::events::Event;

use crate::error::{IngestError, Result};

/// Extract paragraphs from DOCX bytes, one string per paragraph (empty ones included)
pub fn extract_paragraphs(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IngestError::Docx(format!("not a ZIP container: {}", e)))?;

    let mut doc_xml = String::new();
    {
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|_| IngestError::Docx("missing word/document.xml".to_string()))?;
        entry
            .read_to_string(&mut doc_xml)
            .map_err(|e| IngestError::Docx(format!("failed to read document.xml: {}", e)))?;
    }

    let mut reader = quick_xml::Reader::from_str(&doc_xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" => in_text = true,
                b"tab" if in_paragraph => current.push('\t'),
                b"br" if in_paragraph => current.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(String::new()),
                b"tab" if in_paragraph => current.push('\t'),
                b"br" if in_paragraph => current.push('\n'),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    if in_paragraph {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                    in_paragraph = false;
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| IngestError::Docx(format!("bad text run: {}", err)))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(IngestError::Docx(format!("XML parse error: {}", e)).into()),
            _ => {}
        }
    }

    Ok(paragraphs)
}

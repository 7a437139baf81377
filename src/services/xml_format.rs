use crate::constants::defaults::RAW_PREFIX;
use crate::errors::PipelineError;
use crate::utils::fs_atomic::atomic_write_text_file;
use quick_xml::events::{BytesDecl, Event};
use quick_xml::{Reader, Writer};
use std::path::{Path, PathBuf};

const INDENT_WIDTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedXml {
    pub content: String,
    /// The fragment did not parse and `content` is the untouched input.
    pub raw: bool,
    pub parse_error: Option<String>,
}

impl FormattedXml {
    pub fn file_name(&self, base: &str) -> String {
        if self.raw {
            format!("{}{}", RAW_PREFIX, base)
        } else {
            base.to_string()
        }
    }
}

/// Never fails: a fragment that does not parse comes back marked `raw`.
pub fn format(fragment: &str) -> FormattedXml {
    match pretty_print(fragment) {
        Ok(content) => FormattedXml {
            content,
            raw: false,
            parse_error: None,
        },
        Err(err) => FormattedXml {
            content: fragment.to_string(),
            raw: true,
            parse_error: Some(err.message),
        },
    }
}

pub fn pretty_print(fragment: &str) -> Result<String, PipelineError> {
    let trimmed = fragment.trim();
    roxmltree::Document::parse(trimmed)
        .map_err(|err| PipelineError::xml_parse(format!("Malformed XML: {}", err)))?;

    let mut reader = Reader::from_str(trimmed);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|err| PipelineError::xml_parse(format!("Failed to write XML: {}", err)))?;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| PipelineError::xml_parse(format!("Malformed XML: {}", err)))?;
        match event {
            Event::Eof => break,
            Event::Decl(_) => continue,
            // Only layout whitespace is replaced; text with content keeps its padding.
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => continue,
            event => writer
                .write_event(event)
                .map_err(|err| PipelineError::xml_parse(format!("Failed to write XML: {}", err)))?,
        }
    }

    let mut content = String::from_utf8(writer.into_inner())
        .map_err(|err| PipelineError::xml_parse(format!("Formatted XML is not UTF-8: {}", err)))?;
    content.push('\n');
    Ok(content)
}

pub fn save(dir: &Path, base: &str, formatted: &FormattedXml) -> Result<PathBuf, PipelineError> {
    let path = dir.join(formatted.file_name(base));
    atomic_write_text_file(&path, &formatted.content).map_err(|err| {
        PipelineError::internal(format!("Failed to write {}: {}", path.display(), err))
    })?;
    Ok(path)
}

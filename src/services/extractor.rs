use crate::constants::extraction::{MARKER, MARKER_OCCURRENCE};
use crate::errors::PipelineError;
use once_cell::sync::Lazy;
use regex::Regex;

static OPEN_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(\?xml\b|[A-Za-z_][\w.\-]*(?::[A-Za-z_][\w.\-]*)?)").expect("open tag regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFragment {
    pub text: String,
    /// 1-indexed line in the decompressed log.
    pub line_number: usize,
    /// Which marker occurrence the line was (always the second).
    pub occurrence: usize,
    pub occurrences_total: usize,
    pub root: String,
    /// False when no closing root tag was found and the rest of the line was taken.
    pub closed: bool,
}

pub fn marker_lines(text: &str) -> Vec<(usize, &str)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| line.contains(MARKER))
        .map(|(index, line)| (index + 1, line))
        .collect()
}

pub fn extract(text: &str) -> Result<ExtractedFragment, PipelineError> {
    let lines = marker_lines(text);
    if lines.len() < MARKER_OCCURRENCE {
        return Err(PipelineError::not_found(format!(
            "insufficient marker occurrences: {} line(s) contain {:?}, need {}",
            lines.len(),
            MARKER,
            MARKER_OCCURRENCE
        )));
    }
    let (line_number, line) = lines[MARKER_OCCURRENCE - 1];
    let (fragment, root, closed) = fragment_from_line(line).ok_or_else(|| {
        PipelineError::not_found(format!(
            "no XML element follows {:?} on line {}",
            MARKER, line_number
        ))
    })?;

    Ok(ExtractedFragment {
        text: fragment.to_string(),
        line_number,
        occurrence: MARKER_OCCURRENCE,
        occurrences_total: lines.len(),
        root,
        closed,
    })
}

/// Cuts from the first tag after the marker to the last closing tag of the root element.
fn fragment_from_line(line: &str) -> Option<(&str, String, bool)> {
    let marker_at = line.find(MARKER)?;
    let tail = &line[marker_at + MARKER.len()..];

    let mut start = None;
    let mut root = None;
    for caps in OPEN_TAG_RE.captures_iter(tail) {
        let whole = caps.get(0)?;
        start.get_or_insert(whole.start());
        let name = caps.get(1)?.as_str();
        if name.starts_with('?') {
            continue;
        }
        root = Some(name.to_string());
        break;
    }
    let start = start?;
    let root = root?;

    let body = &tail[start..];
    let closing = format!("</{}>", root);
    let end = body.rfind(&closing).or_else(|| {
        body.to_ascii_lowercase()
            .rfind(&closing.to_ascii_lowercase())
    });
    match end {
        Some(pos) => Some((body[..pos + closing.len()].trim(), root, true)),
        None => Some((body.trim(), root, false)),
    }
}

#[cfg(test)]
mod tests {
    use super::extract;
    use crate::errors::ErrorKind;

    fn log_with_markers(total_lines: usize, markers: &[(usize, &str)]) -> String {
        (1..=total_lines)
            .map(|n| {
                markers
                    .iter()
                    .find(|(line, _)| *line == n)
                    .map(|(_, content)| content.to_string())
                    .unwrap_or_else(|| format!("2024-01-01 INFO filler line {}", n))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn selects_the_second_marker_line() {
        let text = log_with_markers(
            25,
            &[
                (3, "Response: <first/>"),
                (9, "Response: <second/>"),
                (20, "Response: <third/>"),
            ],
        );
        let fragment = extract(&text).expect("fragment");
        assert_eq!(fragment.line_number, 9);
        assert_eq!(fragment.occurrence, 2);
        assert_eq!(fragment.occurrences_total, 3);
        assert_eq!(fragment.text, "<second/>");
    }

    #[test]
    fn fewer_than_two_markers_is_not_found() {
        for markers in [vec![], vec![(2, "Response: <only/>")]] {
            let text = log_with_markers(5, &markers);
            let err = extract(&text).expect_err("not enough markers");
            assert_eq!(err.kind, ErrorKind::NotFound);
            assert!(err.message.contains("insufficient marker occurrences"));
        }
    }

    #[test]
    fn cuts_at_the_last_closing_envelope_tag() {
        let line = concat!(
            "[2024-05-06 10:00:01] bipro.INFO: Response: ",
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
            "<soap:Body><x>1</x></soap:Body></soap:Envelope> {\"ctx\":[]} []"
        );
        let text = format!("Response: <ignored/>\n{}\n", line);
        let fragment = extract(&text).expect("fragment");
        assert_eq!(fragment.root, "soap:Envelope");
        assert!(fragment.closed);
        assert!(fragment.text.starts_with("<soap:Envelope"));
        assert!(fragment.text.ends_with("</soap:Envelope>"));
    }

    #[test]
    fn keeps_a_leading_xml_declaration() {
        let text = "Response: <a/>\nResponse: <?xml version=\"1.0\"?><S:Envelope><S:Body/></S:Envelope>\n";
        let fragment = extract(text).expect("fragment");
        assert_eq!(fragment.root, "S:Envelope");
        assert!(fragment.text.starts_with("<?xml"));
    }

    #[test]
    fn closing_tag_match_falls_back_to_case_insensitive() {
        let text = "Response: x\nResponse: <soap:Envelope><b/></SOAP:ENVELOPE> trailer\n";
        let fragment = extract(text).expect("fragment");
        assert_eq!(fragment.text, "<soap:Envelope><b/></SOAP:ENVELOPE>");
    }

    #[test]
    fn missing_closing_tag_takes_rest_of_line() {
        let text = "Response: x\r\nResponse: <soap:Envelope><soap:Body>truncated   \r\n";
        let fragment = extract(text).expect("fragment");
        assert!(!fragment.closed);
        assert_eq!(fragment.text, "<soap:Envelope><soap:Body>truncated");
    }

    #[test]
    fn tags_before_the_marker_are_ignored() {
        let text = "Response: a\n<meta> Response: <root><v/></root>\n";
        let fragment = extract(text).expect("fragment");
        assert_eq!(fragment.root, "root");
        assert_eq!(fragment.text, "<root><v/></root>");
    }

    #[test]
    fn marker_line_without_xml_is_not_found() {
        let text = "Response: <a/>\nResponse: 500 Internal Server Error\n";
        let err = extract(text).expect_err("no xml");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}

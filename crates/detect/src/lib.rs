//! Content-format detection for the editor's syntax highlighting.
//!
//! Two-tier approach: a cheap structural heuristic acts as the first gate,
//! and a full parse validates the candidate before the result is accepted.
//! The consumer toggles syntax highlighting on the answer, so a false
//! positive mis-highlights plain prose — when in doubt, return `None`.
//!
//! Supported: JSON, HTML, XML, YAML. SQL and Markdown are excluded — they
//! lack heuristics that satisfy the zero-false-positive requirement.

use quick_xml::events::Event;
use quick_xml::Reader;

/// Content-size limit beyond which detection is skipped. Analysing
/// multi-megabyte content is unlikely to be useful for highlighting.
const MAX_DETECT_BYTES: usize = 4 * 1024 * 1024;

/// How much of the prefix the HTML scan looks at.
const HTML_SCAN_BYTES: usize = 512;

/// A detected content format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// Editor language identifier (e.g. `"json"`).
    pub id: &'static str,
    /// Human-readable display name (e.g. `"JSON"`).
    pub name: &'static str,
}

/// Identify the format of `content`, or `None` when nothing can be
/// identified with confidence. Pure function of its argument.
///
/// HTML is tested before XML because HTML can look like malformed XML.
pub fn detect(content: &str) -> Option<Language> {
    let content = content.trim();
    if content.is_empty() || content.len() > MAX_DETECT_BYTES {
        return None;
    }

    if is_html(content) {
        Some(Language { id: "html", name: "HTML" })
    } else if is_json(content) {
        Some(Language { id: "json", name: "JSON" })
    } else if is_xml(content) {
        Some(Language { id: "xml", name: "XML" })
    } else if is_yaml(content) {
        Some(Language { id: "yaml", name: "YAML" })
    } else {
        None
    }
}

/// Doctype or opening html element within the first 512 bytes. HTML5 is not
/// strict XML, so the heuristic match itself is sufficient validation.
fn is_html(s: &str) -> bool {
    let mut end = HTML_SCAN_BYTES.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let prefix = s[..end].to_lowercase();
    prefix.contains("<!doctype html") || prefix.contains("<html")
}

/// Starts with `{` or `[` (heuristic) and parses as strict JSON (validation).
fn is_json(s: &str) -> bool {
    let first = s.as_bytes()[0];
    if first != b'{' && first != b'[' {
        return false;
    }
    serde_json::from_str::<serde_json::Value>(s).is_ok()
}

/// Starts with an XML declaration or an element, and the streaming parser
/// can advance past at least one token.
fn is_xml(s: &str) -> bool {
    if !s.starts_with("<?xml") {
        let bytes = s.as_bytes();
        if bytes.len() < 2 || bytes[0] != b'<' {
            return false;
        }
        let second = bytes[1];
        if !second.is_ascii_alphabetic() && second != b'!' {
            return false;
        }
    }
    let mut reader = Reader::from_str(s);
    !matches!(reader.read_event(), Err(_) | Ok(Event::Eof))
}

/// Starts with a YAML document separator, or its first non-empty line looks
/// like a mapping key; the whole input must then parse to a non-null value.
fn is_yaml(s: &str) -> bool {
    if !s.starts_with("---") && !looks_like_yaml_line(first_non_empty_line(s)) {
        return false;
    }
    matches!(serde_yaml::from_str::<serde_yaml::Value>(s), Ok(v) if !v.is_null())
}

/// A plausible YAML mapping entry: a simple key (no internal spaces, tabs,
/// or slashes) followed by `:` at end of line or by `: ` / `:\t`.
fn looks_like_yaml_line(line: &str) -> bool {
    let Some(idx) = line.find(':') else {
        return false;
    };
    if idx < 1 {
        return false;
    }
    let key = &line[..idx];
    if key.contains([' ', '\t', '/']) {
        return false;
    }
    let rest = &line[idx + 1..];
    rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')
}

/// First non-blank line, scanning at most the first ten lines.
fn first_non_empty_line(s: &str) -> &str {
    for line in s.lines().take(10) {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_of(content: &str) -> &'static str {
        detect(content).map(|l| l.id).unwrap_or("")
    }

    // ========================================================================
    // JSON
    // ========================================================================

    #[test]
    fn test_json_object() {
        assert_eq!(id_of(r#"{"a": 1}"#), "json");
    }

    #[test]
    fn test_json_array() {
        assert_eq!(id_of(r#"[1, 2, 3]"#), "json");
    }

    #[test]
    fn test_json_with_leading_whitespace() {
        assert_eq!(id_of("  \n {\"a\": true}"), "json");
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert_eq!(id_of("{not json at all"), "");
        assert_eq!(id_of("{\"a\": 1,}"), "");
    }

    #[test]
    fn test_bare_scalar_is_not_json() {
        // Valid JSON values, but they fail the `{`/`[` heuristic on purpose.
        assert_eq!(id_of("42"), "");
        assert_eq!(id_of("\"quoted\""), "");
    }

    // ========================================================================
    // HTML
    // ========================================================================

    #[test]
    fn test_html_doctype() {
        assert_eq!(id_of("<!DOCTYPE html>\n<html><body></body></html>"), "html");
    }

    #[test]
    fn test_html_element_case_insensitive() {
        assert_eq!(id_of("<HTML lang=\"en\"><head></head></HTML>"), "html");
    }

    #[test]
    fn test_html_wins_over_xml() {
        let content = "<?xml version=\"1.0\"?>\n<!DOCTYPE html>\n<html></html>";
        assert_eq!(id_of(content), "html");
    }

    // ========================================================================
    // XML
    // ========================================================================

    #[test]
    fn test_xml_declaration() {
        assert_eq!(id_of("<?xml version=\"1.0\"?>\n<root><child/></root>"), "xml");
    }

    #[test]
    fn test_xml_bare_element() {
        assert_eq!(id_of("<note><to>World</to></note>"), "xml");
    }

    #[test]
    fn test_xml_comment_start() {
        assert_eq!(id_of("<!-- prologue -->\n<root/>"), "xml");
    }

    #[test]
    fn test_angle_bracket_prose_rejected() {
        assert_eq!(id_of("< not xml"), "");
        assert_eq!(id_of("<3 hearts"), "");
    }

    // ========================================================================
    // YAML
    // ========================================================================

    #[test]
    fn test_yaml_document_separator() {
        assert_eq!(id_of("---\nname: Alice\nage: 30"), "yaml");
    }

    #[test]
    fn test_yaml_simple_mapping() {
        assert_eq!(id_of("name: Alice\nage: 30"), "yaml");
    }

    #[test]
    fn test_yaml_bare_key() {
        assert_eq!(id_of("dependencies:\n  - serde\n  - clap"), "yaml");
    }

    #[test]
    fn test_yaml_key_with_space_rejected() {
        // "10:30 AM" style keys are prose, not config.
        assert_eq!(id_of("meeting at 10:30 tomorrow"), "");
    }

    #[test]
    fn test_yaml_url_not_detected() {
        assert_eq!(id_of("https://example.com/path"), "");
    }

    // ========================================================================
    // Zero false positives on prose
    // ========================================================================

    #[test]
    fn test_markdown_rejected() {
        assert_eq!(id_of("# heading\ntext"), "");
    }

    #[test]
    fn test_plain_prose_rejected() {
        assert_eq!(id_of("The quick brown fox jumps over the lazy dog."), "");
    }

    #[test]
    fn test_sql_rejected() {
        assert_eq!(id_of("SELECT id, name FROM users WHERE age > 21;"), "");
    }

    #[test]
    fn test_raw_number_rejected() {
        assert_eq!(id_of("123456"), "");
        assert_eq!(id_of("3.14159"), "");
    }

    // ========================================================================
    // Edges
    // ========================================================================

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(id_of(""), "");
        assert_eq!(id_of("   \n\t  "), "");
    }

    #[test]
    fn test_oversized_content_skipped() {
        let big = format!("{{\"a\": \"{}\"}}", "x".repeat(MAX_DETECT_BYTES + 16));
        assert_eq!(id_of(&big), "");
    }

    #[test]
    fn test_detect_is_pure() {
        let content = "name: Alice";
        assert_eq!(detect(content), detect(content));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(detect(r#"{"a":1}"#).unwrap().name, "JSON");
        assert_eq!(detect("<root/>").unwrap().name, "XML");
    }
}

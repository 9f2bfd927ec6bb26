//! Descriptor syntax errors with source-located diagnostics
//!
//! A malformed descriptor aborts the whole build; the error carries the
//! offending file and span so miette can render the exact location.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML syntax error in a descriptor file
#[derive(Debug, Error, Diagnostic)]
#[error("malformed descriptor: {message}")]
#[diagnostic(code(partcat::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl YamlSyntaxError {
    /// Wrap a serde_yml error with the source it came from.
    pub fn new(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let offset = err
            .location()
            .map(|loc| offset_of(source, loc.line(), loc.column()))
            .unwrap_or(0);
        let message = err.to_string();
        let help = help_for(&message);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help,
            message,
        }
    }
}

/// Byte offset of a 1-based line/column position.
fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let mut remaining = line.saturating_sub(1);
    let mut offset = 0;
    for (i, ch) in source.char_indices() {
        if remaining == 0 {
            return (i + column.saturating_sub(1)).min(source.len());
        }
        if ch == '\n' {
            remaining -= 1;
        }
        offset = i;
    }
    offset
}

fn help_for(message: &str) -> Option<String> {
    let lower = message.to_lowercase();
    if lower.contains("tab") {
        return Some("YAML requires spaces for indentation, not tabs.".to_string());
    }
    if lower.contains("duplicate key") {
        return Some("each key may appear only once in a descriptor".to_string());
    }
    if lower.contains("mapping values are not allowed") {
        return Some("a space may be missing after ':', or the indentation is off".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_of() {
        let source = "first\nsecond\nthird";
        assert_eq!(offset_of(source, 1, 1), 0);
        assert_eq!(offset_of(source, 2, 1), 6);
        assert_eq!(offset_of(source, 3, 2), 14);
    }

    #[test]
    fn test_wraps_parse_error_with_location() {
        let source = "name: [unclosed\n";
        let err = serde_yml::from_str::<serde_json::Value>(source).unwrap_err();
        let diag = YamlSyntaxError::new(&err, source, "motor.part.yml");
        assert!(!diag.message.is_empty());
        assert!(diag.to_string().starts_with("malformed descriptor"));
    }

    #[test]
    fn test_help_for_known_messages() {
        assert!(help_for("found a tab character").is_some());
        assert!(help_for("duplicate key").is_some());
        assert!(help_for("something else entirely").is_none());
    }
}

use serde::Serialize;

use super::{Diagnostic, Label, Severity};
use crate::source::SourceMap;

/// Wire form of a diagnostic: one JSON object per line on stderr.
#[derive(Serialize)]
struct Record<'a> {
    severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Location<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    related: Vec<Location<'a>>,
    #[serde(skip_serializing_if = "no_notes")]
    notes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<&'a str>,
}

#[derive(Serialize)]
struct Location<'a> {
    start: usize,
    end: usize,
    #[serde(skip_serializing_if = "no_label")]
    label: &'a str,
    /// Present only when the diagnostic carries its source text.
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    col: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

fn no_notes(notes: &&[String]) -> bool {
    notes.is_empty()
}

fn no_label(label: &&str) -> bool {
    label.is_empty()
}

fn locate<'a>(label: &'a Label, source: Option<(&'a str, &SourceMap)>) -> Location<'a> {
    let (line, col, text) = match source {
        Some((src, map)) => {
            let (line, col) = map.lookup(label.span.start);
            (Some(line), Some(col), Some(map.line_text(src, line)))
        }
        None => (None, None, None),
    };
    Location { start: label.span.start, end: label.span.end, label: &label.message, line, col, text }
}

pub fn render(d: &Diagnostic) -> String {
    let map = d.source.as_deref().map(SourceMap::new);
    let source = d.source.as_deref().zip(map.as_ref());

    let (primary, secondary): (Vec<&Label>, Vec<&Label>) = d.labels.iter().partition(|l| l.is_primary);
    let record = Record {
        severity: match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        },
        code: d.code,
        message: &d.message,
        location: primary.first().map(|l| locate(l, source)),
        related: secondary.into_iter().map(|l| locate(l, source)).collect(),
        notes: &d.notes,
        help: d.suggestion.as_deref(),
    };

    match serde_json::to_string(&record) {
        Ok(json) => json,
        Err(e) => format!(r#"{{"severity":"error","message":"diagnostic not serialisable: {e}"}}"#),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::source::Span;

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn bare_error_has_only_required_keys() {
        let v = parse_json(&render(&Diagnostic::error("no expression has been parsed")));
        assert_eq!(v, serde_json::json!({"severity": "error", "message": "no expression has been parsed"}));
    }

    #[test]
    fn primary_location_quotes_the_source_line() {
        let d = Diagnostic::error("unknown identifier 'zz'")
            .with_code("VX-C001")
            .with_span(Span::new(4, 6), "not a variable or function")
            .with_source("x + zz");
        let v = parse_json(&render(&d));
        assert_eq!(v["code"], "VX-C001");
        let loc = &v["location"];
        assert_eq!(loc["start"], 4);
        assert_eq!(loc["end"], 6);
        assert_eq!(loc["line"], 1);
        assert_eq!(loc["col"], 5);
        assert_eq!(loc["text"], "x + zz");
        assert_eq!(loc["label"], "not a variable or function");
    }

    #[test]
    fn engine_error_round_trips_through_json() {
        let err = Engine::new().eval::<f64>("2 * (3 +").unwrap_err();
        let v = parse_json(&render(&Diagnostic::from(&err)));
        assert_eq!(v["code"], err.code());
        assert_eq!(v["location"]["text"], "2 * (3 +");
    }

    #[test]
    fn secondary_labels_become_related() {
        let d = Diagnostic::warning("'k' is assigned more than once")
            .with_code("VX-M002")
            .with_span(Span::new(6, 7), "reassigned here")
            .with_secondary_span(Span::new(0, 1), "first assigned here")
            .with_source("k = 1\nk = 2\n");
        let v = parse_json(&render(&d));
        assert_eq!(v["severity"], "warning");
        assert_eq!(v["location"]["line"], 2);
        assert_eq!(v["related"][0]["line"], 1);
        assert_eq!(v["related"][0]["text"], "k = 1");
    }

    #[test]
    fn notes_and_help() {
        let d = Diagnostic::error("bad").with_note("while defining 'b'").with_suggestion("define it first");
        let v = parse_json(&render(&d));
        assert_eq!(v["notes"][0], "while defining 'b'");
        assert_eq!(v["help"], "define it first");
    }

    #[test]
    fn location_without_source_has_offsets_only() {
        let d = Diagnostic::error("bad").with_span(Span::new(5, 8), "");
        let v = parse_json(&render(&d));
        assert_eq!(v["location"], serde_json::json!({"start": 5, "end": 8}));
    }
}

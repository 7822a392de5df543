use super::{Diagnostic, Severity};
use crate::source::SourceMap;

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn bold(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold_red(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;31m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold_yellow(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;33m{s}\x1b[0m") } else { s.to_string() }
    }

    fn cyan(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[36m{s}\x1b[0m") } else { s.to_string() }
    }

    fn dim(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[2m{s}\x1b[0m") } else { s.to_string() }
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[VX-S007]: message"
        let word = match (&d.severity, d.code) {
            (Severity::Error, Some(code)) => format!("error[{code}]"),
            (Severity::Error, None) => "error".to_string(),
            (Severity::Warning, Some(code)) => format!("warning[{code}]"),
            (Severity::Warning, None) => "warning".to_string(),
        };
        let severity_label = match d.severity {
            Severity::Error => self.bold_red(&word),
            Severity::Warning => self.bold_yellow(&word),
        };
        out.push_str(&format!("{}: {}\n", severity_label, self.bold(&d.message)));

        let primary = d.labels.iter().find(|l| l.is_primary);
        if let (Some(label), Some(source)) = (primary, &d.source) {
            let map = SourceMap::new(source);
            let (line, col) = map.lookup(label.span.start);
            let line_text = map.line_text(source, line);

            out.push_str(&format!("  {} {}:{}\n", self.cyan("-->"), line, col));

            let gutter = line.to_string().len();
            let pipe = self.cyan("|");
            let pad = " ".repeat(gutter);

            out.push_str(&format!("{pad} {pipe}\n"));

            let line_num = self.cyan(&format!("{line:>gutter$}"));
            out.push_str(&format!("{line_num} {pipe} {line_text}\n"));

            // Zero-width spans still get one caret, pointing just past the text.
            let indent = " ".repeat(col.saturating_sub(1));
            let span_len = label.span.end.saturating_sub(label.span.start).max(1);
            let carets = self.bold_red(&"^".repeat(span_len));
            if label.message.is_empty() {
                out.push_str(&format!("{pad} {pipe} {indent}{carets}\n"));
            } else {
                out.push_str(&format!("{pad} {pipe} {indent}{carets} {}\n", self.bold_red(&label.message)));
            }

            out.push_str(&format!("{pad} {pipe}\n"));
        }

        for label in d.labels.iter().filter(|l| !l.is_primary) {
            if !label.message.is_empty() {
                out.push_str(&format!("  {} {}\n", self.dim("="), label.message));
            }
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} help: {}\n", self.dim("="), suggestion));
        }

        out
    }
}

//! Model files: one `name = expression` definition per line.
//!
//! ```text
//! # pipe dimensions
//! r0   = 0.5
//! wall = 0.02
//! r1   = r0 + wall
//! mat  = "Stainless304"
//! ```
//!
//! Lines are evaluated in order against one [`Engine`], so later lines may use
//! anything defined above them. A right side wrapped in double quotes is stored
//! verbatim as text. `#` starts a comment outside quotes.

use std::collections::HashMap;
use std::path::Path;

use crate::diagnostic::Diagnostic;
use crate::engine::Engine;
use crate::source::Span;
use crate::value::Value;

/// Outcome of a successful load.
#[derive(Debug, Default)]
pub struct Loaded {
    /// Names assigned, in file order, repeats included.
    pub defined: Vec<String>,
    pub warnings: Vec<Diagnostic>,
}

/// A single `name = value` line, with byte offsets into the whole file.
#[derive(Debug, Clone, PartialEq)]
struct Definition<'a> {
    name: &'a str,
    name_span: Span,
    rhs: &'a str,
    rhs_start: usize,
}

/// Read and load a model file.
pub fn load_file(engine: &mut Engine, path: &Path) -> Result<Loaded, Diagnostic> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| Diagnostic::error(format!("cannot read {}: {e}", path.display())))?;
    load(engine, &source)
}

/// Evaluate every definition in `source`. Stops at the first failure; lines
/// before it stay defined.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = source.len()))]
pub fn load(engine: &mut Engine, source: &str) -> Result<Loaded, Diagnostic> {
    let mut loaded = Loaded::default();
    let mut first_seen: HashMap<&str, Span> = HashMap::new();

    let mut line_start = 0;
    for line in source.split_inclusive('\n') {
        let start = line_start;
        line_start += line.len();

        let Some(def) = parse_line(line, start, engine).map_err(|d| d.with_source(source))? else {
            continue;
        };

        if let Some(&earlier) = first_seen.get(def.name) {
            loaded.warnings.push(
                Diagnostic::warning(format!("'{}' is assigned more than once", def.name))
                    .with_code("VX-M002")
                    .with_span(def.name_span, "reassigned here")
                    .with_secondary_span(earlier, "first assigned here")
                    .with_source(source),
            );
        } else {
            first_seen.insert(def.name, def.name_span);
        }

        define(engine, &def).map_err(|d| d.with_source(source))?;
        loaded.defined.push(def.name.to_string());
    }

    tracing::debug!(definitions = loaded.defined.len(), warnings = loaded.warnings.len(), "model loaded");
    Ok(loaded)
}

fn define(engine: &mut Engine, def: &Definition<'_>) -> Result<(), Diagnostic> {
    if let Some(text) = quoted(def.rhs) {
        engine.set_variable(def.name, Value::Text(text.to_string()));
        return Ok(());
    }
    match engine.define_and_evaluate(def.name, def.rhs) {
        Ok(_) => Ok(()),
        Err(e) => {
            let mut d = Diagnostic::from(&e).shifted(def.rhs_start);
            if d.labels.is_empty() {
                d = d.with_span(def.name_span, "");
            }
            Err(d.with_note(format!("while defining '{}'", def.name)))
        }
    }
}

/// Split one line into a definition. Blank and comment-only lines give `None`.
fn parse_line<'a>(line: &'a str, start: usize, engine: &Engine) -> Result<Option<Definition<'a>>, Diagnostic> {
    let body = &line[..comment_start(line)];
    if body.trim().is_empty() {
        return Ok(None);
    }

    let Some(eq) = body.find('=') else {
        let lead = body.len() - body.trim_start().len();
        let span = Span::new(start + lead, start + body.trim_end().len());
        return Err(Diagnostic::error("expected `name = expression`")
            .with_code("VX-M001")
            .with_span(span, "no '=' on this line"));
    };

    let lhs = &body[..eq];
    let name = lhs.trim();
    let name_start = start + (lhs.len() - lhs.trim_start().len());
    let name_span = Span::new(name_start, name_start + name.len());

    if name.is_empty() {
        return Err(Diagnostic::error("definition has no name")
            .with_code("VX-M001")
            .with_span(Span::point(start + eq), "expected a name before '='"));
    }
    if !is_identifier(name) {
        return Err(Diagnostic::error(format!("'{name}' is not a valid variable name"))
            .with_code("VX-M003")
            .with_span(name_span, "here"));
    }
    if engine.functions().contains(name) {
        return Err(Diagnostic::error(format!("'{name}' is the name of a built-in function"))
            .with_code("VX-M003")
            .with_span(name_span, "reserved"));
    }

    let rhs = body[eq + 1..].trim_end_matches(['\n', '\r']);
    Ok(Some(Definition { name, name_span, rhs, rhs_start: start + eq + 1 }))
}

fn comment_start(line: &str) -> usize {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return i,
            _ => {}
        }
    }
    line.len()
}

fn quoted(rhs: &str) -> Option<&str> {
    rhs.trim().strip_prefix('"')?.strip_suffix('"')
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceMap;
    use crate::value::Vec3;

    const PIPE: &str = "\
# pipe dimensions
r0   = 0.5
wall = 0.02   # metres
r1   = r0 + wall

axis = vec(0, 0, 1)
mat  = \"Stainless #304\"
";

    #[test]
    fn loads_definitions_in_order() {
        let mut e = Engine::new();
        let loaded = load(&mut e, PIPE).unwrap();
        assert_eq!(loaded.defined, vec!["r0", "wall", "r1", "axis", "mat"]);
        assert!(loaded.warnings.is_empty());
        assert!((e.get::<f64>("r1").unwrap() - 0.52).abs() < 1e-12);
        assert_eq!(e.get::<Vec3>("axis").unwrap(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(e.get::<String>("mat").unwrap(), "Stainless #304");
    }

    #[test]
    fn error_points_into_the_file() {
        let src = "a = 1\nb = a / (a - 1)\nc = b +\n";
        let mut e = Engine::new();
        let d = load(&mut e, src).unwrap_err();
        assert_eq!(d.code, Some("VX-E001"));
        assert_eq!(d.source.as_deref(), Some(src));
        assert!(d.notes.iter().any(|n| n.contains("'b'")));

        let map = SourceMap::new(src);
        assert_eq!(map.lookup(d.labels[0].span.start), (2, 7));
        // Lines before the failure stay defined.
        assert!(e.has_variable("a"));
        assert!(!e.has_variable("c"));
    }

    #[test]
    fn syntax_error_position_survives_whitespace() {
        let src = "x = 1\ny =  (x + 2\n";
        let d = load(&mut Engine::new(), src).unwrap_err();
        assert_eq!(d.code, Some("VX-S007"));
        let (line, col) = SourceMap::new(src).lookup(d.labels[0].span.start);
        assert_eq!((line, col), (2, 12));
    }

    #[test]
    fn later_lines_see_earlier_ones() {
        let mut e = Engine::new();
        load(&mut e, "n = 3\nsq = n^2\n").unwrap();
        assert_eq!(e.get::<i64>("sq").unwrap(), 9);
    }

    #[test]
    fn missing_equals_is_malformed() {
        let d = load(&mut Engine::new(), "r0 = 1\n  r0 + 1\n").unwrap_err();
        assert_eq!(d.code, Some("VX-M001"));
        assert_eq!(d.labels[0].span, Span::new(9, 15));
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(load(&mut Engine::new(), "2r = 1").unwrap_err().code, Some("VX-M003"));
        assert_eq!(load(&mut Engine::new(), "sin = 1").unwrap_err().code, Some("VX-M003"));
        assert_eq!(load(&mut Engine::new(), " = 1").unwrap_err().code, Some("VX-M001"));
    }

    #[test]
    fn reassignment_warns_and_last_wins() {
        let mut e = Engine::new();
        let loaded = load(&mut e, "k = 1\nk = k + 1\n").unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].code, Some("VX-M002"));
        assert_eq!(loaded.warnings[0].labels[1].span, Span::new(0, 1));
        assert_eq!(e.get::<f64>("k").unwrap(), 2.0);
    }

    #[test]
    fn crlf_and_comment_only_files() {
        let mut e = Engine::new();
        let loaded = load(&mut e, "# nothing\r\n\r\nv = 4\r\n").unwrap();
        assert_eq!(loaded.defined, vec!["v"]);
        assert!(load(&mut Engine::new(), "").unwrap().defined.is_empty());
    }

    #[test]
    fn load_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe.vx");
        std::fs::write(&path, PIPE).unwrap();
        let mut e = Engine::new();
        load_file(&mut e, &path).unwrap();
        assert!(e.has_variable("axis"));

        let missing = load_file(&mut e, &dir.path().join("nope.vx")).unwrap_err();
        assert!(missing.message.starts_with("cannot read"));
    }
}

pub mod source_map;
pub use source_map::SourceMap;

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Zero-width span at `pos`, used for "expected something here" errors.
    pub fn point(pos: usize) -> Self {
        Span { start: pos, end: pos }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn offset(self, by: usize) -> Span {
        Span { start: self.start + by, end: self.end + by }
    }
}

/// An expression with all whitespace removed, plus a map from every byte of
/// the stripped text back to its offset in the original.
///
/// The checker and compiler only ever see `text`; spans they report are
/// translated back with [`Stripped::original_span`] before reaching a user.
#[derive(Debug, Clone)]
pub struct Stripped {
    pub text: String,
    origin: Vec<usize>,
    original_len: usize,
}

impl Stripped {
    pub fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut origin = Vec::with_capacity(source.len());
        for (i, c) in source.char_indices() {
            if c.is_whitespace() {
                continue;
            }
            text.push(c);
            for k in 0..c.len_utf8() {
                origin.push(i + k);
            }
        }
        Stripped { text, origin, original_len: source.len() }
    }

    /// Original offset of a stripped offset. One-past-the-end maps to the
    /// end of the original source.
    pub fn original_offset(&self, pos: usize) -> usize {
        match self.origin.get(pos) {
            Some(&o) => o,
            None => self.trimmed_end(),
        }
    }

    pub fn original_span(&self, span: Span) -> Span {
        let start = self.original_offset(span.start);
        let end = if span.end > span.start {
            self.original_offset(span.end - 1) + 1
        } else {
            start
        };
        Span { start, end }
    }

    // End of the last non-whitespace character, so "(2+3   " reports at 4
    // rather than after the trailing blanks.
    fn trimmed_end(&self) -> usize {
        self.origin.last().map_or(0, |&o| o + 1).min(self.original_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_all_whitespace() {
        let s = Stripped::new(" x = 2 *\t(y + 1)\n");
        assert_eq!(s.text, "x=2*(y+1)");
    }

    #[test]
    fn stripped_offsets_map_back() {
        let src = "a + bb * 3";
        let s = Stripped::new(src);
        assert_eq!(s.text, "a+bb*3");
        // 'b' at stripped 2 is original 4
        assert_eq!(s.original_offset(2), 4);
        assert_eq!(s.original_span(Span::new(2, 4)), Span::new(4, 6));
    }

    #[test]
    fn end_of_input_maps_past_last_char() {
        let s = Stripped::new("(2 + 3   ");
        assert_eq!(s.text, "(2+3");
        assert_eq!(s.original_offset(4), 6);
        assert_eq!(s.original_span(Span::point(4)), Span::point(6));
    }

    #[test]
    fn empty_source() {
        let s = Stripped::new("   ");
        assert_eq!(s.text, "");
        assert_eq!(s.original_offset(0), 0);
    }

    #[test]
    fn span_merge_and_offset() {
        let a = Span::new(2, 4);
        let b = Span::new(7, 9);
        assert_eq!(a.merge(b), Span::new(2, 9));
        assert_eq!(a.offset(10), Span::new(12, 14));
    }
}

use crate::error::{Error, Result};

use super::Span;

/// Replace `span` of the original text with `text`. An empty span inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub text: String,
}

impl Edit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self { span: Span::new(at, at), text: text.into() }
    }
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Self { span, text: text.into() }
    }
    /// True when applying the edit leaves `source` unchanged.
    pub fn is_noop(&self, source: &str) -> bool {
        source.get(self.span.start..self.span.end) == Some(self.text.as_str())
    }
}

/// Apply all edits in one pass. Edits are positions in the *original* text;
/// insertions at the same offset keep their given order.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> Result<String> {
    edits.sort_by_key(|e| (e.span.start, e.span.end));
    for pair in edits.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.span.overlaps(b.span) {
            return Err(Error::OverlappingEdits { first: a.span, second: b.span });
        }
    }
    let mut out = String::with_capacity(source.len() + edits.iter().map(|e| e.text.len()).sum::<usize>());
    let mut cursor = 0;
    for edit in &edits {
        out.push_str(&source[cursor..edit.span.start]);
        out.push_str(&edit.text);
        cursor = edit.span.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

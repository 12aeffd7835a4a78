//! Token-level view of a TypeScript source file.
//!
//! There is no full AST. Procedure chains and type annotations are recognized
//! directly on the significant-token stream, with brackets pre-matched and
//! comments kept aside as leading trivia of the next token. Rewrites are
//! byte-span [`Edit`]s against the original text, so untouched code keeps its
//! exact formatting.
pub mod edit;
pub mod lexer;

use std::ops::Range;
use std::path::{Path, PathBuf};

pub use edit::{Edit, apply_edits};
pub use lexer::Tok;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Byte range into a file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: Tok,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    text: String,
    /// Significant tokens only.
    tokens: Vec<Token>,
    comments: Vec<Token>,
    /// Per token: the comments between it and the previous significant token.
    leading: Vec<Range<usize>>,
    /// Per token: index of the matching bracket, if any.
    pairs: Vec<Option<usize>>,
}

/// Classified first argument of a terminal `query`/`mutation` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    Function(FunctionExpr),
    Reference(Reference),
    Other { span: Span },
}

/// Arrow function or function expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionExpr {
    pub span: Span,
    /// Token index where the return type annotation starts (after the `:`).
    pub return_annotation: Option<usize>,
}

/// Bare identifier naming a handler declared elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub span: Span,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
    pub fn overlaps(self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl SourceFile {
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut tokens = Vec::new();
        let mut comments = Vec::new();
        let mut leading = Vec::new();
        let mut pending_start = 0;
        for (kind, range) in lexer::lex(&text) {
            let token = Token { kind, span: Span::new(range.start, range.end) };
            if kind.is_trivia() {
                comments.push(token);
            } else {
                leading.push(pending_start..comments.len());
                pending_start = comments.len();
                tokens.push(token);
            }
        }
        let pairs = match_brackets(&tokens);
        Self { path: path.into(), text, tokens, comments, leading, pairs }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
    pub fn len(&self) -> usize {
        self.tokens.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn kind(&self, i: usize) -> Option<Tok> {
        self.tokens.get(i).map(|t| t.kind)
    }
    pub fn is(&self, i: usize, kind: Tok) -> bool {
        self.kind(i) == Some(kind)
    }
    pub fn span(&self, i: usize) -> Span {
        self.tokens.get(i).map(|t| t.span).unwrap_or_else(|| self.eof())
    }
    /// Empty span at the end of the text.
    pub fn eof(&self) -> Span {
        Span::new(self.text.len(), self.text.len())
    }
    pub fn slice(&self, span: Span) -> &str {
        &self.text[span.start..span.end]
    }
    pub fn token_text(&self, i: usize) -> &str {
        self.tokens.get(i).map(|t| self.slice(t.span)).unwrap_or("")
    }
    pub fn ident(&self, i: usize) -> Option<&str> {
        self.is(i, Tok::Ident).then(|| self.token_text(i))
    }
    pub fn is_ident(&self, i: usize, name: &str) -> bool {
        self.ident(i) == Some(name)
    }

    /// Index of the bracket matching the one at `i`.
    pub fn matching(&self, i: usize) -> Option<usize> {
        self.pairs.get(i).copied().flatten()
    }

    /// Text of the comments directly preceding token `i`.
    pub fn leading_comments(&self, i: usize) -> impl Iterator<Item = (Tok, &str)> + '_ {
        let range = self.leading.get(i).cloned().unwrap_or(0..0);
        self.comments[range].iter().map(|c| (c.kind, self.slice(c.span)))
    }

    /// 1-based line of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        self.text[..offset.min(self.text.len())].bytes().filter(|b| *b == b'\n').count() + 1
    }

    /// End (exclusive) of the expression starting at `start`: the first
    /// comma, semicolon or closing bracket at depth zero.
    pub fn expression_end(&self, start: usize) -> usize {
        let mut i = start;
        while let Some(kind) = self.kind(i) {
            if matches!(kind, Tok::Comma | Tok::Semi) || kind.closes() {
                break;
            }
            i = match self.matching(i) {
                Some(close) if kind.opens() => close + 1,
                _ => i + 1,
            };
        }
        i
    }

    /// Skip a `<...>` type argument list starting at `i`; returns the index
    /// after the closing `>`.
    pub fn skip_angles(&self, i: usize) -> Option<usize> {
        if !self.is(i, Tok::Lt) {
            return Some(i);
        }
        let mut depth = 0usize;
        let mut j = i;
        while let Some(kind) = self.kind(j) {
            match kind {
                Tok::Lt => depth += 1,
                Tok::Gt => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(j + 1);
                    }
                }
                Tok::Semi | Tok::RBrace => return None,
                k if k.opens() => j = self.matching(j)?,
                _ => {}
            }
            j += 1;
        }
        None
    }

    /// Classify the expression spanning tokens `start..end`.
    pub fn classify_handler(&self, start: usize, end: usize) -> Handler {
        let span = if start < end {
            self.span(start).to(self.span(end - 1))
        } else {
            Span::new(self.span(start).start, self.span(start).start)
        };
        let function = |return_annotation| Handler::Function(FunctionExpr { span, return_annotation });

        let mut i = start;
        if self.is_ident(i, "async") && !self.is(i + 1, Tok::FatArrow) {
            i += 1;
        }
        if self.is_ident(i, "function") {
            i += 1;
            if self.is(i, Tok::Punct) && self.token_text(i) == "*" {
                i += 1;
            }
            if self.is(i, Tok::Ident) {
                i += 1;
            }
            let Some(close) = self.is(i, Tok::LParen).then(|| self.matching(i)).flatten() else {
                return Handler::Other { span };
            };
            let annotation = self.is(close + 1, Tok::Colon).then_some(close + 2);
            return function(annotation);
        }
        if self.is(i, Tok::LParen) {
            let Some(close) = self.matching(i) else {
                return Handler::Other { span };
            };
            return match self.kind(close + 1) {
                Some(Tok::FatArrow) => function(None),
                Some(Tok::Colon) => function(Some(close + 2)),
                _ => Handler::Other { span },
            };
        }
        if self.is(i, Tok::Ident) && self.is(i + 1, Tok::FatArrow) {
            return function(None);
        }
        if i == start && end == start + 1 && self.is(start, Tok::Ident) {
            return Handler::Reference(Reference {
                name: self.token_text(start).to_string(),
                span,
            });
        }
        Handler::Other { span }
    }
}

impl Handler {
    pub fn span(&self) -> Span {
        match self {
            Handler::Function(f) => f.span,
            Handler::Reference(r) => r.span,
            Handler::Other { span } => *span,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn match_brackets(tokens: &[Token]) -> Vec<Option<usize>> {
    let mut pairs = vec![None; tokens.len()];
    let mut stack: Vec<usize> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if token.kind.opens() {
            stack.push(i);
        } else if token.kind.closes() {
            // Unbalanced closers are left unmatched; an opener with the wrong
            // closer is dropped so one stray bracket can't poison the file.
            while let Some(open) = stack.pop() {
                if tokens[open].kind.closer() == Some(token.kind) {
                    pairs[open] = Some(i);
                    pairs[i] = Some(open);
                    break;
                }
            }
        }
    }
    pairs
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn handler_of(src: &str) -> Handler {
        let file = SourceFile::parse("t.ts", src);
        file.classify_handler(0, file.expression_end(0))
    }

    #[test]
    fn brackets_are_matched() {
        let file = SourceFile::parse("t.ts", "a({ b: [1, (2)] })");
        assert_eq!(file.matching(1), Some(13));
        assert_eq!(file.matching(2), Some(12));
        assert_eq!(file.matching(5), Some(11));
        assert_eq!(file.matching(10), Some(8));
    }

    #[test]
    fn comments_lead_the_next_token() {
        let file = SourceFile::parse("t.ts", "x(/* keep */ // line\n y)");
        let comments: Vec<_> = file.leading_comments(2).collect();
        assert_eq!(comments, vec![(Tok::BlockComment, "/* keep */"), (Tok::LineComment, "// line")]);
        assert_eq!(file.leading_comments(1).count(), 0);
    }

    #[test]
    fn classify_arrow_with_annotation() {
        match handler_of("async ({ ctx }): Promise<number> => 1") {
            Handler::Function(f) => {
                assert!(f.return_annotation.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn classify_other_shapes() {
        assert!(matches!(handler_of("() => 1"), Handler::Function(FunctionExpr { return_annotation: None, .. })));
        assert!(matches!(handler_of("x => x"), Handler::Function(_)));
        assert!(matches!(handler_of("function named(): string { return '' }"), Handler::Function(FunctionExpr { return_annotation: Some(_), .. })));
        assert!(matches!(handler_of("getUser"), Handler::Reference(Reference { ref name, .. }) if name == "getUser"));
        assert!(matches!(handler_of("handlers.getUser"), Handler::Other { .. }));
        assert!(matches!(handler_of("(value)"), Handler::Other { .. }));
    }

    #[test]
    fn expression_end_stops_at_top_level_comma() {
        let file = SourceFile::parse("t.ts", "(a, b) => f(a, b), other");
        assert_eq!(file.expression_end(0), 12);
    }

    #[test]
    fn line_numbers() {
        let file = SourceFile::parse("t.ts", "a\nb\nc");
        assert_eq!(file.line_of(4), 3);
    }
}

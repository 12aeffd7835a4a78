//! TypeScript tokenizer using logos.
//!
//! Only as precise as chain matching and type annotations need: keywords lex
//! as identifiers, multi-char operators mostly lex as runs of single
//! punctuation, and regex literals are not recognized.

use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Tok {
    // === Trivia ===
    #[regex(r"//[^\n]*")]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment,

    // === Literals ===
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Str,
    #[regex(r"`([^`\\]|\\.)*`")]
    Template,
    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"0[xX][0-9a-fA-F_]+")]
    Number,
    #[regex(r"[0-9][0-9_]*n")]
    BigInt,

    // === Punctuation ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,
    #[token("?.")]
    QuestionDot,
    #[token("...")]
    Ellipsis,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,
    #[token("=>")]
    FatArrow,
    #[token("=")]
    Eq,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("-")]
    Minus,
    #[regex(r"[+*/%!~^@#\\]")]
    Punct,

    /// Anything logos could not match (stray unicode, unterminated strings).
    Unknown,
}

impl Tok {
    pub fn is_trivia(self) -> bool {
        matches!(self, Tok::LineComment | Tok::BlockComment)
    }

    pub fn opens(self) -> bool {
        matches!(self, Tok::LParen | Tok::LBrace | Tok::LBracket)
    }

    pub fn closes(self) -> bool {
        matches!(self, Tok::RParen | Tok::RBrace | Tok::RBracket)
    }

    pub fn closer(self) -> Option<Tok> {
        match self {
            Tok::LParen => Some(Tok::RParen),
            Tok::LBrace => Some(Tok::RBrace),
            Tok::LBracket => Some(Tok::RBracket),
            _ => None,
        }
    }
}

/// Runs to the closing `*/`. An unterminated comment swallows the rest of
/// the input and lexes as an error.
fn block_comment(lex: &mut Lexer<Tok>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

/// Lex `src` into `(kind, byte range)` pairs, trivia included.
pub fn lex(src: &str) -> Vec<(Tok, std::ops::Range<usize>)> {
    let mut out = Vec::new();
    let mut lexer = Tok::lexer(src);
    while let Some(res) = lexer.next() {
        let kind = res.unwrap_or(Tok::Unknown);
        out.push((kind, lexer.span()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<Tok> {
        lex(src).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn chain_tokens() {
        assert_eq!(
            kinds("t.procedure.input(z.string()).query(() => 1)"),
            vec![
                Tok::Ident, Tok::Dot, Tok::Ident, Tok::Dot, Tok::Ident, Tok::LParen,
                Tok::Ident, Tok::Dot, Tok::Ident, Tok::LParen, Tok::RParen, Tok::RParen,
                Tok::Dot, Tok::Ident, Tok::LParen, Tok::LParen, Tok::RParen, Tok::FatArrow,
                Tok::Number, Tok::RParen,
            ]
        );
    }

    #[test]
    fn comments_and_strings_are_single_tokens() {
        let src = "/* a ( b */ 'x)' \"y(\" `z${(}` // c )\n";
        assert_eq!(
            kinds(src),
            vec![Tok::BlockComment, Tok::Str, Tok::Str, Tok::Template, Tok::LineComment]
        );
    }

    #[test]
    fn block_comments_end_at_the_first_close() {
        let src = "/** doc * with stars **/ a /* b */ /*/ c */";
        let tokens = lex(src);
        let kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![Tok::BlockComment, Tok::Ident, Tok::BlockComment, Tok::BlockComment]);
        assert_eq!(&src[tokens[0].1.clone()], "/** doc * with stars **/");
        assert_eq!(&src[tokens[3].1.clone()], "/*/ c */");
    }

    #[test]
    fn unterminated_block_comment_is_unknown() {
        let tokens = lex("a /* never closed");
        assert_eq!(tokens.last().map(|(k, r)| (*k, r.end)), Some((Tok::Unknown, 17)));
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds("10n 1.5 0xff ...x"),
            vec![Tok::BigInt, Tok::Number, Tok::Number, Tok::Ellipsis, Tok::Ident]
        );
    }
}

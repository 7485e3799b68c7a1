use logos::Logos;

/// Tokens produced by lexing a selector string.
///
/// Only simple selectors are meaningful to the engine. Combinators are
/// still lexed so the parser can reject them with a precise span instead
/// of a generic "unrecognized" error.
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    #[token(".")]
    Dot,
    #[token("#")]
    Hash,

    /// CSS identifier: an optional leading hyphen, then a letter or underscore.
    #[regex(r"-?[a-zA-Z_][a-zA-Z0-9_-]*", |lex| lex.slice().to_string())]
    Ident(String),

    // ── Combinators (rejected by the parser) ───────────────────────────
    #[regex(r"[ \t\r\n]+")]
    Space,
    #[token(">")]
    Child,
    #[token("+")]
    Adjacent,
    #[token("~")]
    Sibling,
    #[token(",")]
    Comma,
}

impl Token {
    /// Human-readable name for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::Dot => "'.'",
            Token::Hash => "'#'",
            Token::Ident(_) => "name",
            Token::Space => "whitespace",
            Token::Child => "'>'",
            Token::Adjacent => "'+'",
            Token::Sibling => "'~'",
            Token::Comma => "','",
        }
    }
}

/// A token with its source location (byte offset span).
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

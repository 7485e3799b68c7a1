use logos::Logos;

use crate::error::{CueError, ErrorKind, Result};
use crate::token::{Spanned, Token};

/// Tokenize a selector string into a vector of spanned tokens.
pub fn lex(source: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => {
                tokens.push(Spanned { token, span });
            }
            Err(()) => {
                let fragment = &source[span.clone()];
                return Err(CueError {
                    kind: ErrorKind::UnrecognizedToken(fragment.to_string()),
                    span: Some(span),
                    source_text: Some(source.to_string()),
                });
            }
        }
    }

    Ok(tokens)
}

//! Simple CSS selectors: the only query syntax the engine hands to a host.
//!
//! A selector is one compound of `.class` and `#id` parts, e.g. `.five-img`,
//! `#modal`, `#modal.open`. A bare name (`five-img`) is shorthand for a
//! class selector, matching how reveal rules are usually authored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CueError, Result};
use crate::lexer;
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimpleSelector {
    Class(String),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    parts: Vec<SimpleSelector>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let text = source.trim();
        let tokens = lexer::lex(text)?;

        if tokens.is_empty() {
            return Err(CueError::invalid_selector(text, "selector is empty", None));
        }

        // Bare name shorthand.
        if let [only] = tokens.as_slice() {
            if let Token::Ident(name) = &only.token {
                return Ok(Self {
                    parts: vec![SimpleSelector::Class(name.clone())],
                });
            }
        }

        let mut parts = Vec::new();
        let mut iter = tokens.iter();
        while let Some(tok) = iter.next() {
            let make: fn(String) -> SimpleSelector = match tok.token {
                Token::Dot => SimpleSelector::Class,
                Token::Hash => SimpleSelector::Id,
                Token::Space | Token::Child | Token::Adjacent | Token::Sibling | Token::Comma => {
                    return Err(CueError::invalid_selector(
                        text,
                        &format!("{} combinators are not supported", tok.token.describe()),
                        Some(tok.span.clone()),
                    ));
                }
                Token::Ident(_) => {
                    return Err(CueError::invalid_selector(
                        text,
                        "expected '.' or '#' before name",
                        Some(tok.span.clone()),
                    ));
                }
            };
            match iter.next() {
                Some(next) => match &next.token {
                    Token::Ident(name) => parts.push(make(name.clone())),
                    other => {
                        return Err(CueError::invalid_selector(
                            text,
                            &format!("expected name, got {}", other.describe()),
                            Some(next.span.clone()),
                        ));
                    }
                },
                None => {
                    return Err(CueError::invalid_selector(
                        text,
                        &format!("expected name after {}", tok.token.describe()),
                        Some(tok.span.clone()),
                    ));
                }
            }
        }

        Ok(Self { parts })
    }

    /// Single class selector from a name known to be well formed.
    pub fn class(name: &str) -> Self {
        Self {
            parts: vec![SimpleSelector::Class(name.to_string())],
        }
    }

    pub fn parts(&self) -> &[SimpleSelector] {
        &self.parts
    }

    /// The element id, when this selector is a single `#id`.
    pub fn as_id(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [SimpleSelector::Id(id)] => Some(id),
            _ => None,
        }
    }

    /// Class names required by this selector.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            SimpleSelector::Class(c) => Some(c.as_str()),
            SimpleSelector::Id(_) => None,
        })
    }

    /// True when an element with `id` and `classes` would match.
    pub fn matches<'a>(
        &self,
        id: Option<&str>,
        classes: impl Iterator<Item = &'a str> + Clone,
    ) -> bool {
        self.parts.iter().all(|part| match part {
            SimpleSelector::Id(want) => id == Some(want.as_str()),
            SimpleSelector::Class(want) => classes.clone().any(|c| c == want.as_str()),
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                SimpleSelector::Class(c) => write!(f, ".{c}")?,
                SimpleSelector::Id(id) => write!(f, "#{id}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Selector {
    type Err = CueError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = CueError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Selector> for String {
    fn from(sel: Selector) -> String {
        sel.to_string()
    }
}

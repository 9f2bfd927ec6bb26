//! SPDX license expression handling
//!
//! File descriptors may carry an SPDX-style license expression
//! (`"MIT OR Apache-2.0"`). The expression is parsed once at build time into
//! a binary tree; the set of distinct license identifiers is collected by
//! in-order leaf traversal and recorded into a build-wide accumulator that
//! deduplicates license texts into a single id -> text table.

use rust_embed::Embed;
use std::collections::BTreeMap;
use thiserror::Error;

/// License texts shipped with the binary, one `<ID>.txt` per identifier.
#[derive(Embed)]
#[folder = "licenses/"]
struct LicenseTexts;

/// A parsed SPDX-style license expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpr {
    /// A single license id, e.g. `MIT` or `GPL-2.0+`.
    License(String),
    /// `<license> WITH <exception>`.
    Exception { license: String, exception: String },
    And(Box<LicenseExpr>, Box<LicenseExpr>),
    Or(Box<LicenseExpr>, Box<LicenseExpr>),
}

impl LicenseExpr {
    /// Distinct license ids referenced by the expression, in leaf order
    /// (left subtree before right; AND and OR flatten identically).
    pub fn leaf_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, out: &mut Vec<String>) {
        match self {
            LicenseExpr::License(id) | LicenseExpr::Exception { license: id, .. } => {
                if !out.iter().any(|seen| seen == id) {
                    out.push(id.clone());
                }
            }
            LicenseExpr::And(left, right) | LicenseExpr::Or(left, right) => {
                left.collect_ids(out);
                right.collect_ids(out);
            }
        }
    }
}

/// Parse an SPDX-style expression: identifiers joined by `AND`/`OR`, with
/// optional parentheses and `WITH <exception>` qualifiers.
pub fn parse(expr: &str) -> Result<LicenseExpr, LicenseParseError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let parsed = parser.or_expr()?;
    if parser.position < parser.tokens.len() {
        return Err(LicenseParseError::TrailingInput(
            parser.tokens[parser.position].describe(),
        ));
    }
    Ok(parsed)
}

/// Convenience wrapper: parse and collect distinct leaf ids.
pub fn referenced_ids(expr: &str) -> Result<Vec<String>, LicenseParseError> {
    Ok(parse(expr)?.leaf_ids())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(id) => format!("'{}'", id),
            Token::And => "'AND'".to_string(),
            Token::Or => "'OR'".to_string(),
            Token::With => "'WITH'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, LicenseParseError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            c if c.is_ascii_alphanumeric() => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // "or-later" marker binds to the identifier
                if chars.peek() == Some(&'+') {
                    ident.push('+');
                    chars.next();
                }
                tokens.push(match ident.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "WITH" => Token::With,
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(LicenseParseError::InvalidCharacter(other));
            }
        }
    }

    if tokens.is_empty() {
        return Err(LicenseParseError::Empty);
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    // OR binds loosest
    fn or_expr(&mut self) -> Result<LicenseExpr, LicenseParseError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.and_expr()?;
            left = LicenseExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<LicenseExpr, LicenseParseError> {
        let mut left = self.with_expr()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.with_expr()?;
            left = LicenseExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn with_expr(&mut self) -> Result<LicenseExpr, LicenseParseError> {
        let primary = self.primary()?;
        if self.peek() == Some(&Token::With) {
            self.next();
            let license = match primary {
                LicenseExpr::License(id) => id,
                other => {
                    return Err(LicenseParseError::ExceptionOnCompound(format!("{:?}", other)))
                }
            };
            let exception = match self.next() {
                Some(Token::Ident(id)) => id,
                Some(token) => return Err(LicenseParseError::UnexpectedToken(token.describe())),
                None => return Err(LicenseParseError::UnexpectedEnd),
            };
            return Ok(LicenseExpr::Exception { license, exception });
        }
        Ok(primary)
    }

    fn primary(&mut self) -> Result<LicenseExpr, LicenseParseError> {
        match self.next() {
            Some(Token::Ident(id)) => Ok(LicenseExpr::License(id)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => Err(LicenseParseError::UnexpectedToken(token.describe())),
                    None => Err(LicenseParseError::UnexpectedEnd),
                }
            }
            Some(token) => Err(LicenseParseError::UnexpectedToken(token.describe())),
            None => Err(LicenseParseError::UnexpectedEnd),
        }
    }
}

/// Errors that can occur when parsing a license expression
#[derive(Debug, Error)]
pub enum LicenseParseError {
    #[error("empty license expression")]
    Empty,

    #[error("invalid character '{0}' in license expression")]
    InvalidCharacter(char),

    #[error("unexpected {0} in license expression")]
    UnexpectedToken(String),

    #[error("license expression ended unexpectedly")]
    UnexpectedEnd,

    #[error("unexpected trailing {0} after license expression")]
    TrailingInput(String),

    #[error("WITH may only qualify a single license id, not {0}")]
    ExceptionOnCompound(String),
}

/// Build-wide license text accumulator.
///
/// Threaded explicitly through the collector; deduplicates texts so the
/// snapshot stores each license once regardless of how many files cite it.
#[derive(Debug, Default)]
pub struct LicenseAccumulator {
    texts: BTreeMap<String, String>,
}

impl LicenseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one license id, loading its text on first sight.
    pub fn record(&mut self, id: &str) {
        if !self.texts.contains_key(id) {
            self.texts.insert(id.to_string(), text_for(id));
        }
    }

    /// Consume the accumulator into the id -> text table.
    pub fn into_table(self) -> BTreeMap<String, String> {
        self.texts
    }
}

fn text_for(id: &str) -> String {
    LicenseTexts::get(&format!("{}.txt", id))
        .and_then(|file| String::from_utf8(file.data.into_owned()).ok())
        .unwrap_or_else(|| format!("Couldn't find license text for {}", id))
}

//! Sequences attached to simplex properties.
//!
//! Surface syntax:
//!
//! ```text
//! sequence := proxy | plain
//! proxy    := '&' [Namespace '.'] Name '.' property
//! plain    := ['#'] name [ '(' ref (',' ref)* ')' ] [ ':' seed ] [ '/' interval ]
//! ```
//!
//! A leading `#` marks an external sequence, driven by a named counter
//! outside the statement. A plain name without the marker is built-in and
//! delegated to the engine's auto-increment. Proxies borrow the definition
//! of another property's sequence and are resolved lazily.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use super::EntitySet;
use super::entity::EntityKey;
use super::property::Property;
use crate::error::{Error, MetadataErrorKind, Result};
use crate::types::DataType;

/// Marker for external sequences.
pub const EXTERNAL_MARKER: char = '#';
/// Marker for proxy sequences.
pub const PROXY_MARKER: char = '&';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    /// Engine auto-increment / generated value
    Builtin,
    /// Named counter outside the statement
    External,
}

/// A concrete (non-proxy) sequence definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSpec {
    pub kind: SequenceKind,
    /// Name without the external marker
    pub name: String,
    pub seed: i64,
    pub interval: i64,
    /// Properties whose values partition the counter
    pub references: Vec<String>,
}

#[derive(Debug)]
enum Source {
    Plain(SequenceSpec),
    Proxy {
        target: EntityKey,
        /// Whether the entity was written with its namespace
        qualified: bool,
        property: String,
        resolved: OnceLock<SequenceSpec>,
    },
}

/// A parsed sequence expression.
#[derive(Debug)]
pub struct Sequence {
    text: String,
    source: Source,
    resolutions: AtomicUsize,
}

impl Sequence {
    /// Parse a sequence expression for a property of type `data_type`.
    ///
    /// Seeds default by integer width (8/16-bit: 1, 32-bit: 1000,
    /// 64-bit: 100000). Sequences on non-integer properties are rejected.
    pub fn parse(text: &str, data_type: DataType) -> Result<Sequence> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            text,
            tokens,
            pos: 0,
        };
        let source = parser.sequence(data_type)?;
        parser.finish()?;
        Ok(Sequence {
            text: text.to_string(),
            source,
            resolutions: AtomicUsize::new(0),
        })
    }

    /// The expression this sequence was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.source, Source::Proxy { .. })
    }

    /// The definition, if this is not a proxy.
    pub fn spec(&self) -> Option<&SequenceSpec> {
        match &self.source {
            Source::Plain(spec) => Some(spec),
            Source::Proxy { .. } => None,
        }
    }

    /// Proxy target, if this is a proxy.
    pub fn proxy_target(&self) -> Option<(&EntityKey, &str)> {
        match &self.source {
            Source::Proxy {
                target, property, ..
            } => Some((target, property.as_str())),
            Source::Plain(_) => None,
        }
    }

    /// Rebind an unqualified proxy target as written inside `namespace`.
    ///
    /// Follows the lookup used for navigation targets: the same namespace
    /// first, then the global one, and the same namespace when neither
    /// exists.
    pub(crate) fn anchored(mut self, namespace: &str, exists: impl Fn(&EntityKey) -> bool) -> Self {
        if let Source::Proxy {
            target,
            qualified: false,
            ..
        } = &mut self.source
        {
            let local = EntityKey::new(namespace, target.name.clone());
            *target = if exists(&local) || !exists(target) {
                local
            } else {
                target.clone()
            };
        }
        self
    }

    /// Number of proxy resolutions stored; at most one.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Acquire)
    }

    /// Resolve to a concrete definition.
    ///
    /// Plain sequences return themselves. Proxies look up the target
    /// property's sequence and store it with a compare-and-set; the first
    /// stored definition wins and later calls reuse it. Fails with
    /// `InvalidSequence` when the target is missing, has no sequence, or is
    /// itself a proxy.
    pub fn resolve(&self, set: &EntitySet) -> Result<&SequenceSpec> {
        let (target, property, resolved) = match &self.source {
            Source::Plain(spec) => return Ok(spec),
            Source::Proxy {
                target,
                property,
                resolved,
                ..
            } => (target, property, resolved),
        };
        if let Some(spec) = resolved.get() {
            return Ok(spec);
        }

        let invalid = |message: String| {
            Error::metadata(
                MetadataErrorKind::InvalidSequence,
                Some(target.to_string()),
                Some(property.clone()),
                message,
            )
        };
        let found = set
            .effective_property(target, property)
            .map_err(|_| invalid(format!("proxy target '{}.{}' not found", target, property)))?;
        let sequence = match &found {
            Property::Simplex(s) => s.sequence.as_ref(),
            Property::Complex(_) => None,
        }
        .ok_or_else(|| invalid(format!("'{}.{}' has no sequence", target, property)))?;
        let spec = sequence.spec().ok_or_else(|| {
            invalid(format!(
                "'{}.{}' is itself a proxy sequence",
                target, property
            ))
        })?;

        let mut stored = false;
        let spec = resolved.get_or_init(|| {
            stored = true;
            spec.clone()
        });
        if stored {
            self.resolutions.fetch_add(1, Ordering::AcqRel);
            tracing::debug!(
                sequence = %self.text,
                target = %spec.name,
                "Resolved proxy sequence"
            );
        }
        Ok(spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Hash,
    Amp,
    Dot,
    Comma,
    Colon,
    Slash,
    LParen,
    RParen,
    Ident(String),
    Int(i64),
}

fn invalid_sequence(text: &str, message: impl std::fmt::Display) -> Error {
    Error::metadata(
        MetadataErrorKind::InvalidSequence,
        None,
        None,
        format!("invalid sequence '{}': {}", text, message),
    )
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '#' => Token::Hash,
            '&' => Token::Amp,
            '.' => Token::Dot,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '-' | '0'..='9' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let digits = &text[start..end];
                let value = digits
                    .parse::<i64>()
                    .map_err(|_| invalid_sequence(text, format!("bad number '{}'", digits)))?;
                Token::Int(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_alphanumeric() || d == '_') {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                Token::Ident(text[start..end].to_string())
            }
            other => {
                return Err(invalid_sequence(
                    text,
                    format!("unexpected character '{}'", other),
                ));
            }
        };
        tokens.push(token);
    }
    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self, what: &str) -> Result<String> {
        match self.tokens.get(self.pos) {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(invalid_sequence(self.text, format!("expected {}", what))),
        }
    }

    fn int(&mut self, what: &str) -> Result<i64> {
        match self.tokens.get(self.pos) {
            Some(Token::Int(v)) => {
                self.pos += 1;
                Ok(*v)
            }
            _ => Err(invalid_sequence(self.text, format!("expected {}", what))),
        }
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(invalid_sequence(
                self.text,
                format!("unexpected trailing {:?}", token),
            )),
        }
    }

    fn sequence(&mut self, data_type: DataType) -> Result<Source> {
        if self.eat(&Token::Amp) {
            return self.proxy();
        }
        self.plain(data_type).map(Source::Plain)
    }

    fn proxy(&mut self) -> Result<Source> {
        let mut segments = vec![self.ident("entity name")?];
        while self.eat(&Token::Dot) {
            segments.push(self.ident("name after '.'")?);
        }
        if segments.len() < 2 {
            return Err(invalid_sequence(
                self.text,
                "proxy needs an entity and a property",
            ));
        }
        let property = segments.pop().unwrap_or_default();
        let name = segments.pop().unwrap_or_default();
        let qualified = !segments.is_empty();
        let target = EntityKey::new(segments.join("."), name);
        Ok(Source::Proxy {
            target,
            qualified,
            property,
            resolved: OnceLock::new(),
        })
    }

    fn plain(&mut self, data_type: DataType) -> Result<SequenceSpec> {
        let kind = if self.eat(&Token::Hash) {
            SequenceKind::External
        } else {
            SequenceKind::Builtin
        };
        let name = self.ident("sequence name")?;

        let mut references = Vec::new();
        if self.eat(&Token::LParen) {
            loop {
                references.push(self.ident("reference property")?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                if self.eat(&Token::RParen) {
                    break;
                }
                return Err(invalid_sequence(self.text, "expected ',' or ')'"));
            }
        }

        let default_seed = match data_type.integer_width() {
            Some(8 | 16) => 1,
            Some(32) => 1000,
            Some(_) => 100_000,
            None => {
                return Err(invalid_sequence(
                    self.text,
                    format!("property type {} is not an integer", data_type),
                ));
            }
        };
        let seed = if self.eat(&Token::Colon) {
            self.int("seed")?
        } else {
            default_seed
        };
        let interval = if self.eat(&Token::Slash) {
            self.int("interval")?
        } else {
            1
        };
        if interval == 0 {
            return Err(invalid_sequence(self.text, "interval must be non-zero"));
        }

        Ok(SequenceSpec {
            kind,
            name,
            seed,
            interval,
            references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(text: &str, ty: DataType) -> SequenceSpec {
        Sequence::parse(text, ty).unwrap().spec().cloned().unwrap()
    }

    #[test]
    fn plain_builtin_defaults() {
        let s = spec("order_id", DataType::Int64);
        assert_eq!(s.kind, SequenceKind::Builtin);
        assert_eq!(s.name, "order_id");
        assert_eq!(s.seed, 100_000);
        assert_eq!(s.interval, 1);
        assert!(s.references.is_empty());
    }

    #[test]
    fn seed_defaults_by_width() {
        assert_eq!(spec("a", DataType::Int16).seed, 1);
        assert_eq!(spec("a", DataType::Byte).seed, 1);
        assert_eq!(spec("a", DataType::Int32).seed, 1000);
        assert_eq!(spec("a", DataType::UInt64).seed, 100_000);
    }

    #[test]
    fn external_with_everything() {
        let s = spec("#voucher(Year, Branch):500/10", DataType::Int32);
        assert_eq!(s.kind, SequenceKind::External);
        assert_eq!(s.name, "voucher");
        assert_eq!(s.references, vec!["Year".to_string(), "Branch".to_string()]);
        assert_eq!(s.seed, 500);
        assert_eq!(s.interval, 10);
    }

    #[test]
    fn negative_interval_is_allowed() {
        assert_eq!(spec("down:1000/-1", DataType::Int32).interval, -1);
    }

    #[test]
    fn proxy_paths() {
        let seq = Sequence::parse("&Sales.Order.Id", DataType::Int64).unwrap();
        assert!(seq.is_proxy());
        let (target, property) = seq.proxy_target().unwrap();
        assert_eq!(target, &EntityKey::new("Sales", "Order"));
        assert_eq!(property, "Id");

        let seq = Sequence::parse("&Order.Id", DataType::Int64).unwrap();
        assert_eq!(seq.proxy_target().unwrap().0, &EntityKey::global("Order"));
    }

    #[test]
    fn rejects_malformed() {
        for text in [
            "",
            "a/0",
            "a(",
            "a(b",
            "a:x",
            "&Order",
            "a b",
            "a$",
        ] {
            let err = Sequence::parse(text, DataType::Int32).unwrap_err();
            assert_eq!(
                err.metadata_kind(),
                Some(MetadataErrorKind::InvalidSequence),
                "{text}"
            );
        }
    }

    #[test]
    fn rejects_non_integer_property() {
        let err = Sequence::parse("seq", DataType::String).unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::InvalidSequence));
    }
}

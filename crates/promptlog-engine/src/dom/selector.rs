//! The subset of CSS selectors the adapters rely on.
//!
//! Supported: selector lists, descendant and child combinators, type and
//! universal selectors, `#id`, `.class`, and attribute selectors with the
//! `=`, `~=`, `^=`, `$=`, `*=` operators (optionally case-insensitive via
//! a trailing `i`).

use super::{Document, NodeId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected '{found}' at {pos} in '{selector}'")]
    Unexpected {
        selector: String,
        pos: usize,
        found: char,
    },
    #[error("unterminated {what} in '{selector}'")]
    Unterminated { selector: String, what: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    Prefix,
    Suffix,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: Option<(AttrOp, String)>,
    ignore_case: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

/// Compounds left to right; `combinators[i]` sits between `compounds[i]`
/// and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let selectors = Parser::new(input).parse_list()?;
        Ok(Self {
            source: input.to_string(),
            selectors,
        })
    }

    /// A list that matches nothing.
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            selectors: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Joins several selector strings into one list.
    pub fn parse_many(inputs: &[&str]) -> Result<Self, SelectorError> {
        Self::parse(&inputs.join(", "))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.selectors
            .iter()
            .any(|complex| matches_complex(doc, node, complex, complex.compounds.len() - 1))
    }
}

fn matches_complex(doc: &Document, node: NodeId, complex: &Complex, idx: usize) -> bool {
    if !matches_compound(doc, node, &complex.compounds[idx]) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match complex.combinators[idx - 1] {
        Combinator::Child => doc
            .parent_element(node)
            .is_some_and(|parent| matches_complex(doc, parent, complex, idx - 1)),
        Combinator::Descendant => {
            let mut current = doc.parent_element(node);
            while let Some(ancestor) = current {
                if matches_complex(doc, ancestor, complex, idx - 1) {
                    return true;
                }
                current = doc.parent_element(ancestor);
            }
            false
        }
    }
}

fn matches_compound(doc: &Document, node: NodeId, compound: &Compound) -> bool {
    let Some(tag) = doc.tag(node) else {
        return false;
    };
    if let Some(expected) = &compound.tag
        && expected != tag
    {
        return false;
    }
    if let Some(id) = &compound.id
        && doc.attr(node, "id") != Some(id.as_str())
    {
        return false;
    }
    if !compound.classes.is_empty() {
        let class_attr = doc.attr(node, "class").unwrap_or_default();
        let classes: Vec<&str> = class_attr.split_whitespace().collect();
        if !compound.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
    }
    compound
        .attrs
        .iter()
        .all(|attr| matches_attr(doc.attr(node, &attr.name), attr))
}

fn matches_attr(value: Option<&str>, attr: &AttrSelector) -> bool {
    let Some(value) = value else {
        return false;
    };
    let Some((op, expected)) = &attr.op else {
        return true;
    };
    let (value, expected) = if attr.ignore_case {
        (value.to_lowercase(), expected.to_lowercase())
    } else {
        (value.to_string(), expected.clone())
    };
    match op {
        AttrOp::Equals => value == expected,
        AttrOp::Includes => value.split_whitespace().any(|w| w == expected),
        AttrOp::Prefix => !expected.is_empty() && value.starts_with(&expected),
        AttrOp::Suffix => !expected.is_empty() && value.ends_with(&expected),
        AttrOp::Contains => !expected.is_empty() && value.contains(&expected),
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                selector: self.source.to_string(),
                pos: self.pos,
                found,
            },
            None => SelectorError::Unterminated {
                selector: self.source.to_string(),
                what: "selector",
            },
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Complex>, SelectorError> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            if self.peek().is_none() {
                break;
            }
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => self.pos += 1,
                Some(_) => return Err(self.unexpected()),
            }
        }
        if list.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(list)
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut any = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                any = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
                any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                _ => break,
            }
            any = true;
        }

        if !any {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, SelectorError> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: None,
                    ignore_case: false,
                });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(c @ ('~' | '^' | '$' | '*')) => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(self.unexpected());
                }
                self.pos += 1;
                match c {
                    '~' => AttrOp::Includes,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Contains,
                }
            }
            _ => return Err(self.unexpected()),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(SelectorError::Unterminated {
                        selector: self.source.to_string(),
                        what: "string",
                    });
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                value
            }
            _ => self.parse_ident()?,
        };

        self.skip_ws();
        let mut ignore_case = false;
        if matches!(self.peek(), Some('i' | 'I')) {
            self.pos += 1;
            ignore_case = true;
            self.skip_ws();
        }
        if self.peek() != Some(']') {
            return Err(SelectorError::Unterminated {
                selector: self.source.to_string(),
                what: "attribute selector",
            });
        }
        self.pos += 1;

        Ok(AttrSelector {
            name,
            op: Some((op, value)),
            ignore_case,
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

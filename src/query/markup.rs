//! Structured view markup.
//!
//! Queries sent to the store are XML-like `<View>` documents. Directive
//! splicing (projection, row limit, range predicate) has to be structural,
//! not textual: a directive is replaced in place when it already exists,
//! and unrelated structure is left untouched. [`Element`] is the small
//! mutable tree that makes this possible, with its own parser and renderer
//! so caller-supplied query text can be edited safely.

use crate::core::{FetchError, Result};

/// One markup element: name, ordered attributes, and either child elements
/// or text content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Parse a single-rooted markup document.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser::new(input);
        parser.skip_whitespace();
        let root = parser.parse_element()?;
        parser.skip_whitespace();
        if !parser.at_end() {
            return Err(parser.error("trailing content after root element"));
        }
        Ok(root)
    }

    /// Render back to compact markup text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            push_escaped(out, value);
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            push_escaped(out, text);
        }
        for child in &self.children {
            child.render_into(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing one of the same name.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = Some(text.to_string());
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Find the first child with the given name, creating an empty one if
    /// none exists. This is the find-or-create primitive all directive
    /// splicing builds on.
    pub fn ensure_child(&mut self, name: &str) -> &mut Element {
        let idx = match self.children.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.children.push(Element::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Replace the first child sharing the element's name, or append when
    /// there is none. Never leaves two directives of the same kind behind.
    pub fn replace_child(&mut self, element: Element) {
        match self.children.iter().position(|c| c.name == element.name) {
            Some(idx) => self.children[idx] = element,
            None => self.children.push(element),
        }
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.set_text(text);
        self
    }
}

fn push_escaped(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> FetchError {
        FetchError::MalformedQuery(format!("{} at offset {}", message, self.pos))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn expect(&mut self, ch: char) -> Result<()> {
        match self.bump() {
            Some(found) if found == ch => Ok(()),
            _ => Err(self.error(&format!("expected '{}'", ch))),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-' || c == ':')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_element(&mut self) -> Result<Element> {
        self.expect('<')?;
        let name = self.parse_name()?;
        let mut element = Element::new(&name);

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('/') => {
                    self.pos += 1;
                    self.expect('>')?;
                    return Ok(element);
                }
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let attr_name = self.parse_name()?;
                    self.skip_whitespace();
                    self.expect('=')?;
                    self.skip_whitespace();
                    let value = self.parse_quoted()?;
                    element.attrs.push((attr_name, value));
                }
                None => return Err(self.error("unterminated element")),
            }
        }

        // Open tag consumed; read children or text until the close tag.
        loop {
            let checkpoint = self.pos;
            self.skip_whitespace();
            match self.peek() {
                Some('<') if self.starts_with("</") => {
                    self.pos += 2;
                    let close = self.parse_name()?;
                    if close != element.name {
                        return Err(self.error(&format!(
                            "mismatched close tag: expected </{}>, found </{}>",
                            element.name, close
                        )));
                    }
                    self.skip_whitespace();
                    self.expect('>')?;
                    return Ok(element);
                }
                Some('<') => {
                    element.children.push(self.parse_element()?);
                }
                Some(_) => {
                    self.pos = checkpoint;
                    let text = self.parse_text()?;
                    element.text = Some(text);
                }
                None => return Err(self.error("unterminated element")),
            }
        }
    }

    fn parse_quoted(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(value),
                Some('&') => value.push(self.parse_entity()?),
                Some(ch) => value.push(ch),
                None => return Err(self.error("unterminated attribute value")),
            }
        }
    }

    fn parse_text(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('<') | None => break,
                Some('&') => {
                    self.pos += 1;
                    text.push(self.parse_entity()?);
                }
                Some(ch) => {
                    text.push(ch);
                    self.pos += 1;
                }
            }
        }
        Ok(text.trim().to_string())
    }

    fn parse_entity(&mut self) -> Result<char> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != ';') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.expect(';')?;
        match name.as_str() {
            "lt" => Ok('<'),
            "gt" => Ok('>'),
            "amp" => Ok('&'),
            "quot" => Ok('"'),
            "apos" => Ok('\''),
            other => Err(FetchError::MalformedQuery(format!(
                "unknown entity '&{};' at offset {}",
                other, start
            ))),
        }
    }
}

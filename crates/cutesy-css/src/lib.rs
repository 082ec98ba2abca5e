//! Inline style declaration blocks (`style="..."`).
//!
//! A declaration block is kept as an ordered list of `(property, value)` pairs. Setting a
//! property that already exists replaces its value in place, so enumeration order is the
//! order in which properties first appeared.

use std::fmt;

/// Parsed contents of a `style` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclaration {
    entries: Vec<(String, String)>,
}

impl StyleDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a declaration block, skipping comments and malformed declarations.
    ///
    /// Property names are lower-cased (custom properties keep their case), values have
    /// their whitespace collapsed outside of quoted strings and lose any `!important` flag.
    pub fn parse(input: &str) -> Self {
        let sanitized = strip_comments_preserve_strings(input);
        let mut declaration = Self::new();

        for chunk in split_top_level(&sanitized, b';') {
            let trimmed = chunk.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some(colon_idx) = find_top_level(trimmed, b':') else {
                continue;
            };

            let name = normalize_property_name(&trimmed[..colon_idx]);
            let value = normalize_value(strip_important(&trimmed[colon_idx + 1..]));
            if name.is_empty() || value.is_empty() {
                continue;
            }

            declaration.set_property(&name, &value);
        }

        declaration
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = normalize_property_name(name);
        self.entries
            .iter()
            .find(|(property, _)| *property == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets a property; an empty value removes it, mirroring CSSOM `setProperty`.
    pub fn set_property(&mut self, name: &str, value: &str) {
        let name = normalize_property_name(name);
        if name.is_empty() {
            return;
        }

        let value = normalize_value(value);
        if value.is_empty() {
            self.remove_property(&name);
            return;
        }

        match self.entries.iter_mut().find(|(property, _)| *property == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove_property(&mut self, name: &str) -> Option<String> {
        let name = normalize_property_name(name);
        let idx = self.entries.iter().position(|(property, _)| *property == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes back to attribute text, e.g. `color: red; margin: 0 auto;`.
    pub fn to_css_text(&self) -> String {
        self.entries
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for StyleDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css_text())
    }
}

impl From<&str> for StyleDeclaration {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for StyleDeclaration {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut declaration = Self::new();
        for (name, value) in iter {
            declaration.set_property(name, value);
        }
        declaration
    }
}

/// Tracks quoting and nesting while scanning declaration text byte by byte.
#[derive(Debug, Default)]
struct Scanner {
    in_single: bool,
    in_double: bool,
    escape: bool,
    paren_depth: u32,
    bracket_depth: u32,
}

impl Scanner {
    /// Feeds one byte; returns true when the byte sits at top level outside any string.
    fn advance(&mut self, byte: u8) -> bool {
        if self.in_single || self.in_double {
            let quote = if self.in_single { b'\'' } else { b'"' };
            if !self.escape && byte == b'\\' {
                self.escape = true;
            } else if !self.escape && byte == quote {
                self.in_single = false;
                self.in_double = false;
            } else {
                self.escape = false;
            }
            return false;
        }

        match byte {
            b'\'' => self.in_single = true,
            b'"' => self.in_double = true,
            b'(' => self.paren_depth = self.paren_depth.saturating_add(1),
            b')' => self.paren_depth = self.paren_depth.saturating_sub(1),
            b'[' => self.bracket_depth = self.bracket_depth.saturating_add(1),
            b']' => self.bracket_depth = self.bracket_depth.saturating_sub(1),
            _ => return self.paren_depth == 0 && self.bracket_depth == 0,
        }

        false
    }

    fn in_string(&self) -> bool {
        self.in_single || self.in_double
    }
}

fn strip_comments_preserve_strings(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut idx = 0_usize;
    let mut out = Vec::with_capacity(input.len());
    let mut scanner = Scanner::default();
    let mut in_comment = false;

    while idx < bytes.len() {
        let byte = bytes[idx];
        let next = bytes.get(idx.saturating_add(1)).copied();

        if in_comment {
            if byte == b'*' && next == Some(b'/') {
                in_comment = false;
                idx = idx.saturating_add(2);
                continue;
            }
            idx = idx.saturating_add(1);
            continue;
        }

        if !scanner.in_string() && byte == b'/' && next == Some(b'*') {
            in_comment = true;
            idx = idx.saturating_add(2);
            continue;
        }

        scanner.advance(byte);
        out.push(byte);
        idx = idx.saturating_add(1);
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn split_top_level(input: &str, delimiter: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut scanner = Scanner::default();
    let mut start = 0_usize;

    for (idx, byte) in input.bytes().enumerate() {
        if scanner.advance(byte) && byte == delimiter {
            parts.push(&input[start..idx]);
            start = idx.saturating_add(1);
        }
    }

    parts.push(&input[start..]);
    parts
}

fn find_top_level(input: &str, needle: u8) -> Option<usize> {
    let mut scanner = Scanner::default();
    input
        .bytes()
        .enumerate()
        .find(|(_, byte)| scanner.advance(*byte) && *byte == needle)
        .map(|(idx, _)| idx)
}

fn normalize_property_name(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("--") {
        trimmed.to_owned()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

fn strip_important(value: &str) -> &str {
    let trimmed = value.trim_end();
    let lower = trimmed.to_ascii_lowercase();
    match lower.rfind('!') {
        Some(bang) if lower[bang + 1..].trim() == "important" => &trimmed[..bang],
        _ => trimmed,
    }
}

fn normalize_value(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut quote: Option<char> = None;
    let mut escape = false;
    let mut last_was_space = false;

    for ch in input.chars() {
        if let Some(open) = quote {
            out.push(ch);
            if !escape && ch == '\\' {
                escape = true;
            } else if !escape && ch == open {
                quote = None;
            } else {
                escape = false;
            }
            continue;
        }

        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            last_was_space = false;
            out.push(ch);
            continue;
        }

        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }

        last_was_space = false;
        out.push(ch);
    }

    out.trim().to_owned()
}

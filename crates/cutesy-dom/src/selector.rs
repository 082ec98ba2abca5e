use crate::Document;
use crate::NodeId;

/// Compound simple selector: `tag`, `#id`, `.class`, `[attr]` and `[attr=value]` parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Selector {
    /// Parses a compound selector; returns `None` for empty, universal-only or
    /// unsupported input (combinators, pseudo-classes).
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() || input == "*" {
            return None;
        }

        let mut selector = Self::default();
        let bytes = input.as_bytes();
        let mut idx = 0_usize;

        if bytes
            .first()
            .is_some_and(|byte| byte.is_ascii_alphabetic() || *byte == b'*')
        {
            let start = idx;
            idx = idx.saturating_add(1);
            while idx < bytes.len() && is_ident_char(bytes[idx]) {
                idx = idx.saturating_add(1);
            }
            let raw_tag = &input[start..idx];
            if raw_tag != "*" {
                selector.tag = Some(raw_tag.to_ascii_lowercase());
            }
        }

        while idx < bytes.len() {
            let marker = bytes[idx];
            idx = idx.saturating_add(1);

            if marker == b'[' {
                let close = input[idx..].find(']')? + idx;
                let (name, value) = parse_attribute_condition(&input[idx..close])?;
                selector.attributes.push((name, value));
                idx = close.saturating_add(1);
                continue;
            }

            if marker != b'#' && marker != b'.' {
                return None;
            }

            let start = idx;
            while idx < bytes.len() && is_ident_char(bytes[idx]) {
                idx = idx.saturating_add(1);
            }
            if start == idx {
                return None;
            }

            let value = input[start..idx].to_owned();
            if marker == b'#' {
                if selector.id.is_some() {
                    return None;
                }
                selector.id = Some(value);
            } else {
                selector.classes.push(value);
            }
        }

        if selector.tag.is_none()
            && selector.id.is_none()
            && selector.classes.is_empty()
            && selector.attributes.is_empty()
        {
            None
        } else {
            Some(selector)
        }
    }

    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(element) = document.element(node) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if element.tag_name != *tag {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if element.attribute("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let classes = document.class_list(node);
            if !self
                .classes
                .iter()
                .all(|class| classes.iter().any(|candidate| candidate == class))
            {
                return false;
            }
        }

        self.attributes
            .iter()
            .all(|(name, expected)| match (element.attribute(name), expected) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
            })
    }
}

fn parse_attribute_condition(input: &str) -> Option<(String, Option<String>)> {
    let (name, value) = match input.split_once('=') {
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .or_else(|| {
                    value
                        .strip_prefix('\'')
                        .and_then(|rest| rest.strip_suffix('\''))
                })
                .unwrap_or(value);
            (name, Some(unquoted.to_owned()))
        }
        None => (input, None),
    };

    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() || !name.bytes().all(is_ident_char) {
        return None;
    }
    Some((name, value))
}

fn is_ident_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

#[cfg(test)]
mod tests {
    use super::Selector;
    use crate::Document;
    use rstest::rstest;

    #[rstest]
    #[case("#editor", true)]
    #[case("div", true)]
    #[case("div#editor.main", true)]
    #[case(".main.wide", true)]
    #[case("[data-mode]", true)]
    #[case("[data-mode=edit]", true)]
    #[case("div[data-mode='edit']", true)]
    #[case("section", false)]
    #[case(".missing", false)]
    #[case("[data-mode=view]", false)]
    fn matches_compound_selectors(#[case] input: &str, #[case] expected: bool) {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "id", "editor");
        doc.set_attribute(div, "class", "main wide");
        doc.set_attribute(div, "data-mode", "edit");
        doc.append_child(doc.root(), div);

        let Some(selector) = Selector::parse(input) else {
            unreachable!("selector `{input}` should parse");
        };
        assert_eq!(selector.matches(&doc, div), expected);
    }

    #[rstest]
    #[case("")]
    #[case("*")]
    #[case("div > p")]
    #[case("a:hover")]
    #[case("#a#b")]
    #[case("[=x]")]
    fn rejects_unsupported_selectors(#[case] input: &str) {
        assert!(Selector::parse(input).is_none());
    }

    #[test]
    fn query_selector_returns_first_match_in_order() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let first = doc.create_element("p");
        let second = doc.create_element("p");
        doc.append_child(doc.root(), outer);
        doc.append_child(outer, first);
        doc.append_child(outer, second);

        let Some(selector) = Selector::parse("p") else {
            unreachable!();
        };
        assert_eq!(doc.query_selector(doc.root(), &selector), Some(first));
    }
}

//! CSS output and class name scoping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How one component rewrites its class names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassScope {
    /// Prefix for scoped names
    pub component: String,
    /// Classes left as written
    pub unscoped: Vec<String>,
}

impl ClassScope {
    /// Creates a scope for `component`.
    pub fn new(component: impl Into<String>, unscoped: Vec<String>) -> Self {
        Self {
            component: component.into(),
            unscoped,
        }
    }

    /// `title` becomes `Card__title` unless it is unscoped.
    pub fn scope_class(&self, class: &str) -> String {
        if self.unscoped.iter().any(|u| u == class) {
            class.to_string()
        } else {
            format!("{}__{}", self.component, class)
        }
    }

    /// Scopes each whitespace-separated class of a `class` attribute.
    pub fn scope_class_list(&self, classes: &str) -> String {
        classes
            .split_whitespace()
            .map(|class| self.scope_class(class))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Scopes every `.class` in a selector. Attribute selectors and quoted
    /// text are copied unchanged.
    pub fn scope_selector(&self, selector: &str) -> String {
        let mut out = String::with_capacity(selector.len());
        let mut chars = selector.chars().peekable();
        let mut bracket_depth = 0usize;
        let mut quote: Option<char> = None;

        while let Some(c) = chars.next() {
            if let Some(q) = quote {
                out.push(c);
                if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => {
                    quote = Some(c);
                    out.push(c);
                }
                '[' => {
                    bracket_depth += 1;
                    out.push(c);
                }
                ']' => {
                    bracket_depth = bracket_depth.saturating_sub(1);
                    out.push(c);
                }
                '.' if bracket_depth == 0 => {
                    let mut class = String::new();
                    while let Some(&next) = chars.peek() {
                        if next.is_alphanumeric() || next == '-' || next == '_' {
                            class.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    out.push('.');
                    if !class.is_empty() {
                        out.push_str(&self.scope_class(&class));
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }
}

/// One emitted CSS rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRule {
    /// Selectors after scoping
    pub selectors: Vec<String>,
    /// `property: value` pairs in order
    pub declarations: Vec<(String, String)>,
}

/// The rules of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStyle {
    /// Component name
    pub component: String,
    /// Rules in source order
    pub rules: Vec<StyleRule>,
}

impl fmt::Display for ComponentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "/* {} */", self.component)?;
        for rule in &self.rules {
            writeln!(f, "{} {{", rule.selectors.join(", "))?;
            for (property, value) in &rule.declarations {
                writeln!(f, "  {}: {};", property, value)?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_class_list() {
        let scope = ClassScope::new("Card", vec!["container".into()]);
        assert_eq!(scope.scope_class_list("title  container big"), "Card__title container Card__big");
    }

    #[test]
    fn test_scope_selector() {
        let scope = ClassScope::new("Card", vec!["container".into()]);
        assert_eq!(scope.scope_selector(".title"), ".Card__title");
        assert_eq!(scope.scope_selector("div > .title:hover"), "div > .Card__title:hover");
        assert_eq!(scope.scope_selector(".container .body"), ".container .Card__body");
        assert_eq!(scope.scope_selector("a[href$=\".pdf\"]"), "a[href$=\".pdf\"]");
    }

    #[test]
    fn test_selector_and_attribute_agree() {
        let scope = ClassScope::new("Nav", Vec::new());
        let selector = scope.scope_selector(".item");
        let attribute = scope.scope_class_list("item");
        assert_eq!(selector, format!(".{}", attribute));
    }
}

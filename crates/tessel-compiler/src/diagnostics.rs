//! Accumulated semantic errors.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 1-based line, 0 when unknown
    pub line: usize,
    /// Human readable message
    pub message: String,
}

/// Errors keyed by source file path. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    files: BTreeMap<String, Vec<Diagnostic>>,
}

impl Diagnostics {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error against `file`.
    pub fn push(&mut self, file: &str, line: usize, message: impl Into<String>) {
        self.files.entry(file.to_string()).or_default().push(Diagnostic {
            line,
            message: message.into(),
        });
    }

    /// Whether anything was reported.
    pub fn has_errors(&self) -> bool {
        self.files.values().any(|list| !list.is_empty())
    }

    /// Total number of errors across every file.
    pub fn error_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Errors reported against `file`.
    pub fn for_file(&self, file: &str) -> &[Diagnostic] {
        self.files.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates `(file, diagnostic)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Diagnostic)> {
        self.files
            .iter()
            .flat_map(|(file, list)| list.iter().map(move |d| (file.as_str(), d)))
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.iter().any(|(_, d)| d.message.contains(needle))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (file, list) in &self.files {
            writeln!(f, "{}:", file)?;
            for diagnostic in list {
                writeln!(f, "  line {}: {}", diagnostic.line, diagnostic.message)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_no_errors() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 0);
        assert!(diagnostics.for_file("a.tsl").is_empty());
    }

    #[test]
    fn test_display_groups_by_file() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push("b.tsl", 4, "second");
        diagnostics.push("a.tsl", 1, "first");
        diagnostics.push("b.tsl", 9, "third");
        assert_eq!(diagnostics.error_count(), 3);
        assert_eq!(
            diagnostics.to_string(),
            "a.tsl:\n  line 1: first\nb.tsl:\n  line 4: second\n  line 9: third\n"
        );
    }
}

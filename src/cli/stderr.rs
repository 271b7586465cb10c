//! Heuristic failure detection on the agent's stderr.

use regex::{Regex, RegexBuilder};

/// Flags stderr lines that look like failures.
///
/// A line qualifies when it contains any configured keyword, compared
/// case-insensitively. Other diagnostic output is ignored.
#[derive(Debug, Clone)]
pub struct StderrScreen {
    pattern: Option<Regex>,
}

impl StderrScreen {
    /// Build a screen from a keyword list.
    ///
    /// Keywords are matched literally. An empty list never matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the combined pattern exceeds the regex size limit.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(AsRef::as_ref)
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Returns the error message for a qualifying line.
    #[must_use]
    pub fn screen(&self, line: &str) -> Option<String> {
        let pattern = self.pattern.as_ref()?;
        if pattern.is_match(line) {
            Some(line.trim().to_string())
        } else {
            None
        }
    }
}

//! Context snippet extraction for message reporting.
//!
//! A [`ContextGenerator`] wraps a source text (a manifest, a locale file,
//! any line-oriented input) and produces a three-line window around a
//! reported position so that rendered messages can show the offending line
//! together with its neighbours.

/// Maximum rendered width of a single context line before it is trimmed
/// around the reported column.
const MAX_LINE_WIDTH: usize = 140;

/// A rendered context window: up to one line before, the line itself, and
/// up to one line after. `None` marks a position outside the source.
pub type ContextSnippet = Vec<Option<String>>;

/// Generates context snippets from a source text.
#[derive(Clone, Debug)]
pub struct ContextGenerator {
    lines: Vec<String>,
}

impl ContextGenerator {
    /// Splits the source into lines for later snippet extraction.
    #[must_use]
    pub fn new(data: &str) -> Self {
        Self {
            lines: data.split('\n').map(str::to_owned).collect(),
        }
    }

    /// Returns the number of lines in the source.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Builds the context window around a 1-based line number.
    ///
    /// Out-of-range neighbours are represented as `None` so that renderers
    /// can show a placeholder rule instead of a line.
    ///
    /// # Examples
    ///
    /// ```
    /// use xpivet::context::ContextGenerator;
    ///
    /// let context = ContextGenerator::new("first\nsecond\nthird");
    /// let snippet = context.snippet(1, 0);
    /// assert_eq!(snippet, vec![None, Some("first".into()), Some("second".into())]);
    /// ```
    #[must_use]
    pub fn snippet(&self, line: u32, column: u32) -> ContextSnippet {
        let current = line.max(1) as usize - 1;
        let fetch = |index: Option<usize>| {
            index
                .and_then(|i| self.lines.get(i))
                .map(|text| trim_around(text, column as usize))
        };
        vec![
            fetch(current.checked_sub(1)),
            fetch(Some(current)),
            fetch(current.checked_add(1)),
        ]
    }
}

/// Trims a long line to a window centred on the reported column, keeping
/// short lines untouched.
fn trim_around(text: &str, column: usize) -> String {
    let trimmed = text.trim_end();
    if trimmed.chars().count() <= MAX_LINE_WIDTH {
        return trimmed.to_owned();
    }
    let start = column.saturating_sub(MAX_LINE_WIDTH / 2);
    trimmed
        .chars()
        .skip(start)
        .take(MAX_LINE_WIDTH)
        .collect()
}

//! Indented, aligned rendering of structured records for log output.
//!
//! Records are converted into a [`LogTree`] first and rendered afterwards, so
//! the layout rules live in one place:
//!
//! - mapping entries are aligned on the longest key plus five columns;
//! - nested mappings and sequences open a `key:` header and indent by three;
//! - sequence items are marked with a `-` two columns into their indent.

use std::fmt;

/// Indentation added for each nested level.
const NEST: usize = 3;

/// Padding added after the longest key of a mapping.
const KEY_PADDING: usize = 5;

/// Tagged tree of loggable values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogTree {
    /// A leaf rendered with its display form.
    Scalar(String),
    /// An ordered list of values.
    Sequence(Vec<LogTree>),
    /// Ordered key/value pairs.
    Mapping(Vec<(String, LogTree)>),
}

impl LogTree {
    /// Builds a scalar from anything displayable.
    #[must_use]
    pub fn scalar(value: impl fmt::Display) -> Self {
        Self::Scalar(value.to_string())
    }

    /// Builds a sequence of scalars.
    #[must_use]
    pub fn scalars<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        Self::Sequence(values.into_iter().map(Self::scalar).collect())
    }

    /// Builds a mapping from key/value pairs, keeping their order.
    #[must_use]
    pub fn mapping<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Mapping(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Renders the tree starting at `indent` columns.
    ///
    /// Every rendered line starts with a newline so the output can be appended
    /// directly to a log message.
    #[must_use]
    pub fn render(&self, indent: usize) -> String {
        match self {
            Self::Scalar(value) => format!("\n{}{value}", spaces(indent)),
            Self::Sequence(items) => render_sequence(items, indent),
            Self::Mapping(entries) => render_mapping(entries, indent),
        }
    }

    const fn opens_block(&self) -> bool {
        match self {
            Self::Scalar(_) => false,
            Self::Sequence(_) => true,
            Self::Mapping(entries) => !entries.is_empty(),
        }
    }

    fn inline(&self) -> String {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Sequence(_) => String::from("[]"),
            Self::Mapping(_) => String::from("{}"),
        }
    }
}

impl fmt::Display for LogTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(0))
    }
}

impl From<&serde_json::Value> for LogTree {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => {
                Self::mapping(map.iter().map(|(key, item)| (key.clone(), Self::from(item))))
            }
            serde_json::Value::Array(items) => Self::Sequence(items.iter().map(Self::from).collect()),
            serde_json::Value::String(text) => Self::Scalar(text.clone()),
            other => Self::scalar(other),
        }
    }
}

fn render_mapping(entries: &[(String, LogTree)], indent: usize) -> String {
    let width = entries
        .iter()
        .map(|(key, _)| key.chars().count())
        .max()
        .unwrap_or_default()
        + KEY_PADDING;
    let pad = spaces(indent);

    let mut rendered = String::new();
    for (key, value) in entries {
        if value.opens_block() {
            rendered.push_str(&format!("\n{pad}{key}:"));
            rendered.push_str(&value.render(indent + NEST));
        } else {
            rendered.push_str(&format!("\n{pad}{key:<width$}{}", value.inline()));
        }
    }
    rendered
}

fn render_sequence(items: &[LogTree], indent: usize) -> String {
    let mut rendered = String::new();
    for item in items {
        let block = if item.opens_block() {
            item.render(indent + NEST)
        } else {
            format!("\n{}{}", spaces(indent + NEST), item.inline())
        };
        rendered.push_str(&mark_item(&block, indent + 2));
    }
    rendered
}

/// Replaces the character at `column` with the item marker.
fn mark_item(block: &str, column: usize) -> String {
    let mut chars: Vec<char> = block.chars().collect();
    match chars.get_mut(column) {
        Some(slot) => *slot = '-',
        None => chars.push('-'),
    }
    chars.into_iter().collect()
}

fn spaces(count: usize) -> String {
    " ".repeat(count)
}

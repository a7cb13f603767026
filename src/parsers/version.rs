//! Loose version ordering for package version strings.
//!
//! A version splits into runs of digits, runs of lowercase letters, and runs
//! of anything else; dots only separate. Digit runs compare numerically and
//! sort before any text run at the same position.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum Component {
    /// Decimal digits without leading zeros; `"0"` for zero.
    Number(String),
    Text(String),
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(lhs), Self::Number(rhs)) => {
                lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
            }
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(lhs), Self::Text(rhs)) => lhs.cmp(rhs),
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Class {
    Digit,
    Lower,
    Dot,
    Other,
}

const fn class_of(ch: char) -> Class {
    match ch {
        '0'..='9' => Class::Digit,
        'a'..='z' => Class::Lower,
        '.' => Class::Dot,
        _ => Class::Other,
    }
}

fn component(class: Class, run: &str) -> Option<Component> {
    match class {
        Class::Digit => {
            let trimmed = run.trim_start_matches('0');
            Some(Component::Number(if trimmed.is_empty() {
                String::from("0")
            } else {
                trimmed.to_owned()
            }))
        }
        Class::Lower | Class::Other => Some(Component::Text(run.to_owned())),
        Class::Dot => None,
    }
}

fn components(version: &str) -> Vec<Component> {
    let mut parts = Vec::new();
    let mut run = String::new();
    let mut current: Option<Class> = None;
    for ch in version.chars() {
        let class = class_of(ch);
        // Each dot is its own separator; other classes accumulate.
        if current != Some(class) || class == Class::Dot {
            if let Some(previous) = current {
                parts.extend(component(previous, &run));
            }
            run.clear();
            current = Some(class);
        }
        run.push(ch);
    }
    if let Some(previous) = current {
        parts.extend(component(previous, &run));
    }
    parts
}

/// A version string ordered component by component.
///
/// ```
/// use fuel_harness::parsers::LooseVersion;
///
/// assert!(LooseVersion::new("1.10") > LooseVersion::new("1.9"));
/// assert!(LooseVersion::new("2.0") < LooseVersion::new("2.0.1"));
/// assert!(LooseVersion::new("1.0") < LooseVersion::new("1.a"));
/// ```
#[derive(Clone, Debug)]
pub struct LooseVersion {
    raw: String,
    components: Vec<Component>,
}

impl LooseVersion {
    /// Splits `raw` into comparable components.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_owned(),
            components: components(raw),
        }
    }

    /// The string this version was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for LooseVersion {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for LooseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for LooseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for LooseVersion {}

impl Hash for LooseVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

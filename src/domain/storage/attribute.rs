//! Attribute values exchanged with key-value stores

use std::collections::{HashMap, HashSet};
use std::fmt;

/// A stored item: attribute name to value
pub type Item = HashMap<String, AttributeValue>;

/// Store-agnostic attribute value
///
/// Numbers are carried as decimal strings, the same way the store transmits
/// them, so that no precision is lost between the caller and the table.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number, as a decimal string
    N(String),
    /// Boolean
    Bool(bool),
    /// Explicit null
    Null,
    /// Ordered list of values, duplicates allowed
    L(Vec<AttributeValue>),
    /// Nested map
    M(HashMap<String, AttributeValue>),
    /// String set
    Ss(Vec<String>),
    /// Number set, members as decimal strings
    Ns(Vec<String>),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    pub fn number(value: i64) -> Self {
        Self::N(encode_number(value))
    }

    /// Builds a list of numbers, keeping order and duplicates
    pub fn number_list(values: impl IntoIterator<Item = i64>) -> Self {
        Self::L(values.into_iter().map(Self::number).collect())
    }

    /// Builds a number set; repeated values collapse to their first occurrence
    pub fn number_set(values: impl IntoIterator<Item = i64>) -> Self {
        let mut seen = HashSet::new();
        let members = values
            .into_iter()
            .filter(|value| seen.insert(*value))
            .map(encode_number)
            .collect();

        Self::Ns(members)
    }

    /// Short type descriptor, as the store names it
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Bool(_) => "BOOL",
            Self::Null => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
        }
    }

    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Ss(_) | Self::Ns(_))
    }

    /// Members of a set value, `None` for non-set values
    pub fn set_members(&self) -> Option<&[String]> {
        match self {
            Self::Ss(members) | Self::Ns(members) => Some(members),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(value) => write!(f, "{:?}", value),
            Self::N(value) => write!(f, "{}", value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Null => write!(f, "null"),
            Self::L(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Self::M(map) => write!(f, "{{map of {} attributes}}", map.len()),
            Self::Ss(members) | Self::Ns(members) => write!(f, "<<{}>>", members.join(", ")),
        }
    }
}

/// Canonical decimal form of an integer; never locale dependent
pub fn encode_number(value: i64) -> String {
    value.to_string()
}

/// Parses a number token produced by the store back into an integer
pub fn decode_number(token: &str) -> Result<i64, std::num::ParseIntError> {
    token.parse::<i64>()
}

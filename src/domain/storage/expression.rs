//! Update expression construction
//!
//! An [`UpdateExpressionBuilder`] collects typed clauses and renders them into
//! the textual expression understood by the store. Attribute names and values
//! never appear inline: names are replaced by `#n` placeholders and values by
//! `:n` placeholders, which are shipped alongside the expression.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::attribute::AttributeValue;
use crate::domain::DomainError;

/// Path to an attribute, optionally descending into list elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    name: String,
    indices: Vec<usize>,
}

impl AttributePath {
    /// Path to a top-level attribute
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: Vec::new(),
        }
    }

    /// Descends into the element at `index` of the list at this path
    pub fn index(mut self, index: usize) -> Self {
        self.indices.push(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn is_top_level(&self) -> bool {
        self.indices.is_empty()
    }

    /// True when one path equals or contains the other
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }

        let shared = self.indices.len().min(other.indices.len());
        self.indices[..shared] == other.indices[..shared]
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for index in &self.indices {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::update_expression(
            "attribute path has an empty name",
        ));
    }

    if let Some(c) = name
        .chars()
        .find(|c| matches!(c, '.' | '[' | ']' | '#' | ':' | ',' | '(' | ')') || c.is_whitespace())
    {
        return Err(DomainError::update_expression(format!(
            "attribute name '{}' contains unsupported character '{}'",
            name, c
        )));
    }

    Ok(())
}

/// Rendered update, ready to be handed to a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    /// Expression text with placeholders, e.g. `ADD #0 :0`
    pub expression: String,
    /// `#n` placeholder to attribute name
    pub names: HashMap<String, String>,
    /// `:n` placeholder to value
    pub values: HashMap<String, AttributeValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Set,
    Remove,
    Add,
    Delete,
}

impl Keyword {
    const RENDER_ORDER: [Keyword; 4] = [Self::Set, Self::Remove, Self::Add, Self::Delete];
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set => write!(f, "SET"),
            Self::Remove => write!(f, "REMOVE"),
            Self::Add => write!(f, "ADD"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SetOperand {
    Value(AttributeValue),
    ListAppend(AttributeValue),
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Set {
        path: AttributePath,
        operand: SetOperand,
    },
    Remove {
        path: AttributePath,
    },
    Add {
        path: AttributePath,
        value: AttributeValue,
    },
    Delete {
        path: AttributePath,
        value: AttributeValue,
    },
}

impl Clause {
    fn path(&self) -> &AttributePath {
        match self {
            Self::Set { path, .. }
            | Self::Remove { path }
            | Self::Add { path, .. }
            | Self::Delete { path, .. } => path,
        }
    }

    fn keyword(&self) -> Keyword {
        match self {
            Self::Set { .. } => Keyword::Set,
            Self::Remove { .. } => Keyword::Remove,
            Self::Add { .. } => Keyword::Add,
            Self::Delete { .. } => Keyword::Delete,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        validate_name(self.path().name())?;

        match self {
            Self::Set {
                path,
                operand: SetOperand::Value(value),
            } => check_set_members(path, value),
            Self::Set {
                path,
                operand: SetOperand::ListAppend(value),
            } => {
                if value.as_l().is_none() {
                    return Err(DomainError::update_expression(format!(
                        "list_append on '{}' requires a list value, got {}",
                        path,
                        value.type_name()
                    )));
                }
                Ok(())
            }
            Self::Remove { .. } => Ok(()),
            Self::Add { path, value } => {
                require_top_level(Keyword::Add, path)?;
                if !value.is_set() && !matches!(value, AttributeValue::N(_)) {
                    return Err(DomainError::update_expression(format!(
                        "ADD on '{}' requires a number or set value, got {}",
                        path,
                        value.type_name()
                    )));
                }
                check_set_members(path, value)
            }
            Self::Delete { path, value } => {
                require_top_level(Keyword::Delete, path)?;
                if !value.is_set() {
                    return Err(DomainError::update_expression(format!(
                        "DELETE on '{}' requires a set value, got {}",
                        path,
                        value.type_name()
                    )));
                }
                check_set_members(path, value)
            }
        }
    }
}

fn require_top_level(keyword: Keyword, path: &AttributePath) -> Result<(), DomainError> {
    if path.is_top_level() {
        Ok(())
    } else {
        Err(DomainError::update_expression(format!(
            "{} only applies to top-level attributes, got '{}'",
            keyword, path
        )))
    }
}

fn check_set_members(path: &AttributePath, value: &AttributeValue) -> Result<(), DomainError> {
    let Some(members) = value.set_members() else {
        return Ok(());
    };

    if members.is_empty() {
        return Err(DomainError::update_expression(format!(
            "set value for '{}' must not be empty",
            path
        )));
    }

    let mut seen = HashSet::with_capacity(members.len());
    for member in members {
        if !seen.insert(member.as_str()) {
            return Err(DomainError::update_expression(format!(
                "set value for '{}' repeats member '{}'",
                path, member
            )));
        }
    }

    Ok(())
}

/// Builder for a single atomic update
#[derive(Debug, Clone, Default)]
pub struct UpdateExpressionBuilder {
    clauses: Vec<Clause>,
}

impl UpdateExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `SET path = value`
    pub fn set(mut self, path: AttributePath, value: AttributeValue) -> Self {
        self.clauses.push(Clause::Set {
            path,
            operand: SetOperand::Value(value),
        });
        self
    }

    /// `SET path = list_append(path, values)`
    pub fn set_list_append(mut self, path: AttributePath, values: AttributeValue) -> Self {
        self.clauses.push(Clause::Set {
            path,
            operand: SetOperand::ListAppend(values),
        });
        self
    }

    /// `REMOVE path`
    pub fn remove(mut self, path: AttributePath) -> Self {
        self.clauses.push(Clause::Remove { path });
        self
    }

    /// `ADD path value`: set union, or numeric increment
    pub fn add(mut self, path: AttributePath, value: AttributeValue) -> Self {
        self.clauses.push(Clause::Add { path, value });
        self
    }

    /// `DELETE path value`: set subtraction
    pub fn delete(mut self, path: AttributePath, value: AttributeValue) -> Self {
        self.clauses.push(Clause::Delete { path, value });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Validates the clauses and renders the request
    pub fn build(self) -> Result<UpdateRequest, DomainError> {
        if self.clauses.is_empty() {
            return Err(DomainError::update_expression(
                "update expression has no clauses",
            ));
        }

        for clause in &self.clauses {
            clause.validate()?;
        }

        for (i, first) in self.clauses.iter().enumerate() {
            for second in &self.clauses[i + 1..] {
                if first.path().overlaps(second.path()) {
                    return Err(DomainError::update_expression(format!(
                        "paths '{}' and '{}' overlap",
                        first.path(),
                        second.path()
                    )));
                }
            }
        }

        let mut renderer = Renderer::default();
        let mut sections = Vec::new();

        for keyword in Keyword::RENDER_ORDER {
            let entries: Vec<String> = self
                .clauses
                .iter()
                .filter(|clause| clause.keyword() == keyword)
                .map(|clause| renderer.clause(clause))
                .collect();

            if !entries.is_empty() {
                sections.push(format!("{} {}", keyword, entries.join(", ")));
            }
        }

        Ok(UpdateRequest {
            expression: sections.join(" "),
            names: renderer.names,
            values: renderer.values,
        })
    }
}

#[derive(Debug, Default)]
struct Renderer {
    slots: HashMap<String, String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Renderer {
    fn name(&mut self, name: &str) -> String {
        if let Some(placeholder) = self.slots.get(name) {
            return placeholder.clone();
        }

        let placeholder = format!("#{}", self.slots.len());
        self.slots.insert(name.to_string(), placeholder.clone());
        self.names.insert(placeholder.clone(), name.to_string());
        placeholder
    }

    fn path(&mut self, path: &AttributePath) -> String {
        let mut rendered = self.name(path.name());
        for index in path.indices() {
            rendered.push_str(&format!("[{}]", index));
        }
        rendered
    }

    fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    fn clause(&mut self, clause: &Clause) -> String {
        match clause {
            Clause::Set {
                path,
                operand: SetOperand::Value(value),
            } => {
                let path = self.path(path);
                let value = self.value(value);
                format!("{} = {}", path, value)
            }
            Clause::Set {
                path,
                operand: SetOperand::ListAppend(value),
            } => {
                let path = self.path(path);
                let value = self.value(value);
                format!("{} = list_append({}, {})", path, path, value)
            }
            Clause::Remove { path } => self.path(path),
            Clause::Add { path, value } | Clause::Delete { path, value } => {
                let path = self.path(path);
                let value = self.value(value);
                format!("{} {}", path, value)
            }
        }
    }
}

//! Update expression evaluation for the in-memory store
//!
//! Parses the rendered expression text, resolves `#n`/`:n` placeholders and
//! applies the actions to a copy of the item. All operands are read from the
//! item as it was before the update, so several `REMOVE list[i]` actions in one
//! request address the same snapshot. The copy replaces the stored item only
//! when every action succeeded.

use std::collections::HashSet;

use crate::domain::storage::{decode_number, AttributeValue, Item, StoreError, UpdateRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    name: String,
    indices: Vec<usize>,
}

impl Path {
    fn overlaps(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }

        let shared = self.indices.len().min(other.indices.len());
        self.indices[..shared] == other.indices[..shared]
    }
}

#[derive(Debug, Clone)]
enum Operand {
    Path(Path),
    Value(AttributeValue),
    ListAppend(Box<Operand>, Box<Operand>),
}

#[derive(Debug, Clone)]
enum Action {
    Set(Path, Operand),
    Remove(Path),
    Add(Path, AttributeValue),
    Delete(Path, AttributeValue),
}

impl Action {
    fn path(&self) -> &Path {
        match self {
            Self::Set(path, _) | Self::Remove(path) | Self::Add(path, _) | Self::Delete(path, _) => {
                path
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Set,
    Remove,
    Add,
    Delete,
}

/// Applies `update` to `item`; `key_attribute` may not be touched
pub(super) fn apply_update(
    item: &mut Item,
    key_attribute: &str,
    update: &UpdateRequest,
) -> Result<(), StoreError> {
    let actions = Parser::new(update).parse()?;

    for (i, action) in actions.iter().enumerate() {
        if action.path().name == key_attribute {
            return Err(StoreError::validation(format!(
                "Cannot update attribute {}. This attribute is part of the key",
                key_attribute
            )));
        }

        for other in &actions[i + 1..] {
            if action.path().overlaps(other.path()) {
                return Err(StoreError::validation(
                    "Two document paths overlap with each other",
                ));
            }
        }
    }

    let snapshot: &Item = item;
    let mut sets = Vec::new();
    let mut removes = Vec::new();
    let mut adds = Vec::new();
    let mut deletes = Vec::new();

    for action in actions {
        match action {
            Action::Set(path, operand) => {
                let value = evaluate(&operand, snapshot)?;
                validate_value(&value)?;
                sets.push((path, value));
            }
            Action::Remove(path) => removes.push(path),
            Action::Add(path, value) => adds.push((path, value)),
            Action::Delete(path, value) => deletes.push((path, value)),
        }
    }

    let mut next = snapshot.clone();

    for (path, value) in sets {
        assign(&mut next, &path, value)?;
    }

    // Highest positions first so that earlier removals never shift later ones
    removes.sort_by(|a, b| b.indices.cmp(&a.indices));
    for path in &removes {
        remove(&mut next, path)?;
    }

    for (path, value) in adds {
        add(&mut next, &path, value)?;
    }

    for (path, value) in deletes {
        delete(&mut next, &path, &value)?;
    }

    *item = next;
    Ok(())
}

/// Rejects values the store would refuse to persist
pub(super) fn validate_value(value: &AttributeValue) -> Result<(), StoreError> {
    match value {
        AttributeValue::Ss(members) | AttributeValue::Ns(members) => {
            if members.is_empty() {
                return Err(StoreError::validation(format!(
                    "One or more parameter values were invalid: an {} may not be empty",
                    value.type_name()
                )));
            }

            let mut seen = HashSet::new();
            for member in members {
                if !seen.insert(member_key(value, member)) {
                    return Err(StoreError::validation(format!(
                        "Input collection {} contains duplicates",
                        value
                    )));
                }
            }

            Ok(())
        }
        AttributeValue::L(values) => values.iter().try_for_each(validate_value),
        AttributeValue::M(map) => map.values().try_for_each(validate_value),
        _ => Ok(()),
    }
}

fn member_key(set: &AttributeValue, member: &str) -> String {
    match set {
        AttributeValue::Ns(_) => decode_number(member)
            .map(|n| n.to_string())
            .unwrap_or_else(|_| member.to_string()),
        _ => member.to_string(),
    }
}

fn evaluate(operand: &Operand, snapshot: &Item) -> Result<AttributeValue, StoreError> {
    match operand {
        Operand::Value(value) => Ok(value.clone()),
        Operand::Path(path) => lookup(snapshot, path).cloned().ok_or_else(|| {
            StoreError::validation(
                "The provided expression refers to an attribute that does not exist in the item",
            )
        }),
        Operand::ListAppend(first, second) => {
            match (evaluate(first, snapshot)?, evaluate(second, snapshot)?) {
                (AttributeValue::L(mut head), AttributeValue::L(tail)) => {
                    head.extend(tail);
                    Ok(AttributeValue::L(head))
                }
                _ => Err(StoreError::validation(
                    "Incorrect operand type for operator or function; operator or function: list_append",
                )),
            }
        }
    }
}

fn lookup<'i>(item: &'i Item, path: &Path) -> Option<&'i AttributeValue> {
    let mut current = item.get(&path.name)?;

    for &index in &path.indices {
        current = current.as_l()?.get(index)?;
    }

    Some(current)
}

fn invalid_path() -> StoreError {
    StoreError::validation("The document path provided in the update expression is invalid for update")
}

fn list_at<'i>(
    item: &'i mut Item,
    name: &str,
    indices: &[usize],
) -> Result<Option<&'i mut Vec<AttributeValue>>, StoreError> {
    let Some(mut current) = item.get_mut(name) else {
        return Ok(None);
    };

    for &index in indices {
        current = match current {
            AttributeValue::L(values) => values.get_mut(index).ok_or_else(invalid_path)?,
            _ => return Err(invalid_path()),
        };
    }

    match current {
        AttributeValue::L(values) => Ok(Some(values)),
        _ => Err(invalid_path()),
    }
}

fn assign(item: &mut Item, path: &Path, value: AttributeValue) -> Result<(), StoreError> {
    let Some((last, parents)) = path.indices.split_last() else {
        item.insert(path.name.clone(), value);
        return Ok(());
    };

    let list = list_at(item, &path.name, parents)?.ok_or_else(invalid_path)?;

    if *last < list.len() {
        list[*last] = value;
    } else {
        list.push(value);
    }

    Ok(())
}

fn remove(item: &mut Item, path: &Path) -> Result<(), StoreError> {
    let Some((last, parents)) = path.indices.split_last() else {
        item.remove(&path.name);
        return Ok(());
    };

    if let Some(list) = list_at(item, &path.name, parents)? {
        if *last < list.len() {
            list.remove(*last);
        }
    }

    Ok(())
}

fn add(item: &mut Item, path: &Path, value: AttributeValue) -> Result<(), StoreError> {
    if !path.indices.is_empty() {
        return Err(invalid_path());
    }

    validate_value(&value)?;

    let merged = match (item.remove(&path.name), value) {
        (None, value @ (AttributeValue::N(_) | AttributeValue::Ns(_) | AttributeValue::Ss(_))) => {
            value
        }
        (Some(AttributeValue::N(current)), AttributeValue::N(delta)) => {
            let sum = parse_integer(&current)?
                .checked_add(parse_integer(&delta)?)
                .ok_or_else(|| StoreError::validation("Number overflow"))?;
            AttributeValue::number(sum)
        }
        (Some(AttributeValue::Ns(current)), AttributeValue::Ns(extra)) => {
            AttributeValue::Ns(union(&AttributeValue::Ns(Vec::new()), current, extra))
        }
        (Some(AttributeValue::Ss(current)), AttributeValue::Ss(extra)) => {
            AttributeValue::Ss(union(&AttributeValue::Ss(Vec::new()), current, extra))
        }
        _ => {
            return Err(StoreError::validation(
                "An operand in the update expression has an incorrect data type",
            ));
        }
    };

    item.insert(path.name.clone(), merged);
    Ok(())
}

fn delete(item: &mut Item, path: &Path, value: &AttributeValue) -> Result<(), StoreError> {
    if !path.indices.is_empty() {
        return Err(invalid_path());
    }

    validate_value(value)?;

    let Some(current) = item.get_mut(&path.name) else {
        return Ok(());
    };

    let remaining = match (&mut *current, value) {
        (AttributeValue::Ns(members), AttributeValue::Ns(removed))
        | (AttributeValue::Ss(members), AttributeValue::Ss(removed)) => {
            let dropped: HashSet<String> = removed.iter().map(|m| member_key(value, m)).collect();
            members.retain(|m| !dropped.contains(&member_key(value, m)));
            members.len()
        }
        _ => {
            return Err(StoreError::validation(
                "An operand in the update expression has an incorrect data type",
            ));
        }
    };

    if remaining == 0 {
        item.remove(&path.name);
    }

    Ok(())
}

fn union(kind: &AttributeValue, mut current: Vec<String>, extra: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = current.iter().map(|m| member_key(kind, m)).collect();

    for member in extra {
        if seen.insert(member_key(kind, &member)) {
            current.push(member);
        }
    }

    current
}

fn parse_integer(token: &str) -> Result<i64, StoreError> {
    decode_number(token).map_err(|_| {
        StoreError::validation(format!(
            "The in-memory store only supports integer numbers, got '{}'",
            token
        ))
    })
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    update: &'a UpdateRequest,
    used_names: HashSet<&'a str>,
    used_values: HashSet<&'a str>,
}

impl<'a> Parser<'a> {
    fn new(update: &'a UpdateRequest) -> Self {
        Self {
            input: &update.expression,
            pos: 0,
            update,
            used_names: HashSet::new(),
            used_values: HashSet::new(),
        }
    }

    fn parse(mut self) -> Result<Vec<Action>, StoreError> {
        let mut actions = Vec::new();
        let mut sections: Vec<Keyword> = Vec::new();

        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                break;
            }

            let word = self.token();
            let keyword = match word.to_ascii_uppercase().as_str() {
                "SET" => Keyword::Set,
                "REMOVE" => Keyword::Remove,
                "ADD" => Keyword::Add,
                "DELETE" => Keyword::Delete,
                _ => return Err(syntax(format!("unexpected token '{}'", word))),
            };

            if sections.contains(&keyword) {
                return Err(syntax(format!(
                    "the {} section can only be used once",
                    word.to_ascii_uppercase()
                )));
            }
            sections.push(keyword);

            loop {
                actions.push(self.action(keyword)?);
                if !self.eat(b',') {
                    break;
                }
            }
        }

        if actions.is_empty() {
            return Err(StoreError::validation("The update expression is empty"));
        }

        if let Some(unused) = self
            .update
            .names
            .keys()
            .find(|name| !self.used_names.contains(name.as_str()))
        {
            return Err(StoreError::validation(format!(
                "Value provided in ExpressionAttributeNames unused in expressions: keys: {{{}}}",
                unused
            )));
        }

        if let Some(unused) = self
            .update
            .values
            .keys()
            .find(|value| !self.used_values.contains(value.as_str()))
        {
            return Err(StoreError::validation(format!(
                "Value provided in ExpressionAttributeValues unused in expressions: keys: {{{}}}",
                unused
            )));
        }

        Ok(actions)
    }

    fn action(&mut self, keyword: Keyword) -> Result<Action, StoreError> {
        let path = self.path()?;

        match keyword {
            Keyword::Set => {
                self.expect(b'=')?;
                Ok(Action::Set(path, self.operand()?))
            }
            Keyword::Remove => Ok(Action::Remove(path)),
            Keyword::Add => Ok(Action::Add(path, self.value()?)),
            Keyword::Delete => Ok(Action::Delete(path, self.value()?)),
        }
    }

    fn operand(&mut self) -> Result<Operand, StoreError> {
        self.skip_whitespace();
        let start = self.pos;
        let token = self.token();

        if token.eq_ignore_ascii_case("list_append") {
            self.expect(b'(')?;
            let first = Box::new(self.operand()?);
            self.expect(b',')?;
            let second = Box::new(self.operand()?);
            self.expect(b')')?;

            return Ok(Operand::ListAppend(first, second));
        }

        self.pos = start;

        if token.starts_with(':') {
            Ok(Operand::Value(self.value()?))
        } else {
            Ok(Operand::Path(self.path()?))
        }
    }

    fn path(&mut self) -> Result<Path, StoreError> {
        let token = self.token();

        let name = if token.is_empty() {
            return Err(syntax("expected an attribute path"));
        } else if token.starts_with('#') {
            self.used_names.insert(token);
            self.update.names.get(token).cloned().ok_or_else(|| {
                StoreError::validation(format!(
                    "An expression attribute name used in the document path is not defined; attribute name: {}",
                    token
                ))
            })?
        } else if token.starts_with(':') {
            return Err(syntax(format!(
                "value placeholder '{}' used where a path was expected",
                token
            )));
        } else {
            token.to_string()
        };

        let mut indices = Vec::new();

        while self.peek() == Some(b'[') {
            self.pos += 1;
            let start = self.pos;

            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }

            let input = self.input;
            let digits = &input[start..self.pos];
            let index = digits
                .parse::<usize>()
                .map_err(|_| syntax(format!("invalid list index '{}'", digits)))?;

            self.expect(b']')?;
            indices.push(index);
        }

        Ok(Path { name, indices })
    }

    fn value(&mut self) -> Result<AttributeValue, StoreError> {
        let token = self.token();

        if !token.starts_with(':') {
            return Err(syntax(format!(
                "expected a value placeholder, found '{}'",
                token
            )));
        }

        self.used_values.insert(token);
        self.update.values.get(token).cloned().ok_or_else(|| {
            StoreError::validation(format!(
                "An expression attribute value used in expression is not defined; attribute value: {}",
                token
            ))
        })
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: u8) -> bool {
        self.skip_whitespace();

        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), StoreError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(syntax(format!(
                "expected '{}' at offset {}",
                expected as char, self.pos
            )))
        }
    }

    fn token(&mut self) -> &'a str {
        self.skip_whitespace();
        let start = self.pos;

        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || matches!(b, b'[' | b']' | b',' | b'(' | b')' | b'=') {
                break;
            }
            self.pos += 1;
        }

        let input = self.input;
        &input[start..self.pos]
    }
}

fn syntax(message: impl Into<String>) -> StoreError {
    StoreError::validation(format!("Invalid UpdateExpression: {}", message.into()))
}

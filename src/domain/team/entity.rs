//! Team entity and its storage mapping

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::storage::{decode_number, AttributeValue, Item};
use crate::domain::DomainError;

/// Physical attribute names of a team item
///
/// These are part of the persisted schema; renaming one needs a migration.
pub mod attributes {
    /// Partition key
    pub const ID: &str = "id";
    pub const TEAM_NAME: &str = "team_name";
    pub const BATTING_ORDER: &str = "batting_order";
    pub const RESERVE: &str = "reserve";
}

/// Team entity
///
/// `Team::default()` is the zero-valued record returned when reading an id
/// that was never written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier, never changes after creation
    id: String,
    /// Display name
    #[serde(rename = "team_name")]
    name: String,
    /// Ordered, duplicates allowed
    #[serde(rename = "batting_order", default)]
    batting_order: Vec<i64>,
    /// Unordered, no duplicates
    #[serde(default)]
    reserve: BTreeSet<i64>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            batting_order: Vec::new(),
            reserve: BTreeSet::new(),
        }
    }

    pub fn with_batting_order(mut self, batting_order: impl IntoIterator<Item = i64>) -> Self {
        self.batting_order = batting_order.into_iter().collect();
        self
    }

    pub fn with_reserve(mut self, reserve: impl IntoIterator<Item = i64>) -> Self {
        self.reserve = reserve.into_iter().collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batting_order(&self) -> &[i64] {
        &self.batting_order
    }

    pub fn reserve(&self) -> &BTreeSet<i64> {
        &self.reserve
    }

    /// Primary key item for `id`
    pub fn key_for(id: &str) -> Result<Item, DomainError> {
        if id.is_empty() {
            return Err(DomainError::encoding("team id must not be empty"));
        }

        Ok(Item::from([(
            attributes::ID.to_string(),
            AttributeValue::string(id),
        )]))
    }

    /// Full item representation
    ///
    /// An empty reserve is left out: stores reject empty sets, and a missing
    /// attribute decodes back to an empty set.
    pub fn to_item(&self) -> Result<Item, DomainError> {
        let mut item = Self::key_for(&self.id)?;

        item.insert(
            attributes::TEAM_NAME.to_string(),
            AttributeValue::string(&self.name),
        );
        item.insert(
            attributes::BATTING_ORDER.to_string(),
            AttributeValue::number_list(self.batting_order.iter().copied()),
        );

        if !self.reserve.is_empty() {
            item.insert(
                attributes::RESERVE.to_string(),
                AttributeValue::number_set(self.reserve.iter().copied()),
            );
        }

        Ok(item)
    }

    /// Maps a stored item back to a team
    pub fn from_item(item: &Item) -> Result<Self, DomainError> {
        let id = match item.get(attributes::ID) {
            Some(value) => decode_string(attributes::ID, value)?,
            None => {
                return Err(DomainError::decoding(format!(
                    "item has no '{}' attribute",
                    attributes::ID
                )));
            }
        };

        let name = item
            .get(attributes::TEAM_NAME)
            .map(|value| decode_string(attributes::TEAM_NAME, value))
            .transpose()?
            .unwrap_or_default();

        let batting_order = item
            .get(attributes::BATTING_ORDER)
            .map(decode_number_list)
            .transpose()?
            .unwrap_or_default();

        let reserve = item
            .get(attributes::RESERVE)
            .map(decode_number_set)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            id,
            name,
            batting_order,
            reserve,
        })
    }
}

fn decode_string(attribute: &str, value: &AttributeValue) -> Result<String, DomainError> {
    match value {
        AttributeValue::S(s) => Ok(s.clone()),
        AttributeValue::Null => Ok(String::new()),
        other => Err(type_mismatch(attribute, "S", other)),
    }
}

fn decode_number_list(value: &AttributeValue) -> Result<Vec<i64>, DomainError> {
    match value {
        AttributeValue::L(elements) => elements
            .iter()
            .enumerate()
            .map(|(index, element)| match element {
                AttributeValue::N(token) => decode_member(attributes::BATTING_ORDER, token),
                other => Err(DomainError::decoding(format!(
                    "'{}[{}]' should be N, found {}",
                    attributes::BATTING_ORDER,
                    index,
                    other.type_name()
                ))),
            })
            .collect(),
        AttributeValue::Null => Ok(Vec::new()),
        other => Err(type_mismatch(attributes::BATTING_ORDER, "L", other)),
    }
}

fn decode_number_set(value: &AttributeValue) -> Result<BTreeSet<i64>, DomainError> {
    match value {
        AttributeValue::Ns(members) => members
            .iter()
            .map(|token| decode_member(attributes::RESERVE, token))
            .collect(),
        AttributeValue::Null => Ok(BTreeSet::new()),
        other => Err(type_mismatch(attributes::RESERVE, "NS", other)),
    }
}

fn decode_member(attribute: &str, token: &str) -> Result<i64, DomainError> {
    decode_number(token).map_err(|e| {
        DomainError::decoding(format!(
            "'{}' holds '{}', which is not an integer: {}",
            attribute, token, e
        ))
    })
}

fn type_mismatch(attribute: &str, expected: &str, found: &AttributeValue) -> DomainError {
    DomainError::decoding(format!(
        "'{}' should be {}, found {}",
        attribute,
        expected,
        found.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Team {
        Team::new("test001", "Team 1")
            .with_batting_order([1, 2, 3])
            .with_reserve([4, 5, 6])
    }

    #[test]
    fn test_item_round_trip() {
        let team = sample();
        let item = team.to_item().unwrap();

        assert_eq!(item.get("id"), Some(&AttributeValue::string("test001")));
        assert_eq!(item.get("team_name"), Some(&AttributeValue::string("Team 1")));
        assert_eq!(
            item.get("batting_order"),
            Some(&AttributeValue::number_list([1, 2, 3]))
        );
        assert_eq!(
            item.get("reserve"),
            Some(&AttributeValue::number_set([4, 5, 6]))
        );

        assert_eq!(Team::from_item(&item).unwrap(), team);
    }

    #[test]
    fn test_empty_reserve_is_omitted() {
        let item = Team::new("t", "n").to_item().unwrap();
        assert!(!item.contains_key(attributes::RESERVE));
        assert_eq!(
            item.get(attributes::BATTING_ORDER),
            Some(&AttributeValue::L(vec![]))
        );
    }

    #[test]
    fn test_empty_id_cannot_be_encoded() {
        assert!(matches!(
            Team::key_for("").unwrap_err(),
            DomainError::Encoding { .. }
        ));
        assert!(matches!(
            Team::default().to_item().unwrap_err(),
            DomainError::Encoding { .. }
        ));
    }

    #[test]
    fn test_missing_attributes_decode_as_empty() {
        let item = Team::key_for("bare").unwrap();
        let team = Team::from_item(&item).unwrap();

        assert_eq!(team.id(), "bare");
        assert_eq!(team.name(), "");
        assert!(team.batting_order().is_empty());
        assert!(team.reserve().is_empty());
    }

    #[test]
    fn test_null_collections_decode_as_empty() {
        let mut item = Team::key_for("nulls").unwrap();
        item.insert(attributes::BATTING_ORDER.into(), AttributeValue::Null);
        item.insert(attributes::RESERVE.into(), AttributeValue::Null);

        let team = Team::from_item(&item).unwrap();
        assert!(team.batting_order().is_empty());
        assert!(team.reserve().is_empty());
    }

    #[test]
    fn test_shape_mismatches_are_decoding_errors() {
        let mut reserve_as_list = sample().to_item().unwrap();
        reserve_as_list.insert(
            attributes::RESERVE.into(),
            AttributeValue::number_list([1]),
        );
        assert!(matches!(
            Team::from_item(&reserve_as_list).unwrap_err(),
            DomainError::Decoding { .. }
        ));

        let mut fractional = sample().to_item().unwrap();
        fractional.insert(
            attributes::BATTING_ORDER.into(),
            AttributeValue::L(vec![AttributeValue::N("1.5".into())]),
        );
        assert!(matches!(
            Team::from_item(&fractional).unwrap_err(),
            DomainError::Decoding { .. }
        ));

        let mut numeric_name = sample().to_item().unwrap();
        numeric_name.insert(attributes::TEAM_NAME.into(), AttributeValue::number(3));
        assert!(Team::from_item(&numeric_name).is_err());

        assert!(Team::from_item(&Item::new()).is_err());
    }

    #[test]
    fn test_serde_uses_attribute_names() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["id"], "test001");
        assert_eq!(json["team_name"], "Team 1");
        assert_eq!(json["batting_order"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["reserve"], serde_json::json!([4, 5, 6]));
    }

    #[test]
    fn test_reserve_has_no_duplicates() {
        let team = Team::new("t", "n").with_reserve([5, 5, 4]);
        assert_eq!(team.reserve().iter().copied().collect::<Vec<_>>(), vec![4, 5]);
    }
}

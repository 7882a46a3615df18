// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Argument normalization for tags, write pairs and group names.
//!
//! Callers may pass a bare tag or a list of tags. A bare tag produces a
//! single-shaped result, a list produces a list-shaped one. The same holds
//! for write pairs. The JSON constructors apply the same rules to
//! untyped input arriving from a remote caller or the command line.

use serde_json::Value as Json;

use crate::error::{GatewayError, GatewayResult};
use crate::types::Value;

/// Prefix that marks a system health tag.
pub const HEALTH_TAG_PREFIX: char = '@';

// =============================================================================
// TagArg
// =============================================================================

/// Tags passed to a read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagArg {
    /// No tags.
    #[default]
    None,
    /// One tag, passed bare.
    Single(String),
    /// A list of tags.
    List(Vec<String>),
}

impl TagArg {
    /// Flattens into a tag list and a single-shape flag.
    pub fn normalize(self) -> (Vec<String>, bool) {
        match self {
            Self::None => (Vec::new(), false),
            Self::Single(tag) => (vec![tag], true),
            Self::List(tags) => (tags, false),
        }
    }

    /// Parses untyped input for the named call (`read`, `iread`, ...).
    pub fn from_json(json: &Json, call: &str) -> GatewayResult<Self> {
        match json {
            Json::Null => Ok(Self::None),
            Json::String(tag) => Ok(Self::Single(tag.clone())),
            Json::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self::List)
                .ok_or_else(|| tags_type_error(call)),
            _ => Err(tags_type_error(call)),
        }
    }
}

fn tags_type_error(call: &str) -> GatewayError {
    GatewayError::invalid_argument(format!(
        "{call}(): 'tags' parameter must be a string or a list of strings"
    ))
}

impl From<&str> for TagArg {
    fn from(tag: &str) -> Self {
        Self::Single(tag.to_string())
    }
}

impl From<String> for TagArg {
    fn from(tag: String) -> Self {
        Self::Single(tag)
    }
}

impl From<Vec<String>> for TagArg {
    fn from(tags: Vec<String>) -> Self {
        Self::List(tags)
    }
}

impl From<Vec<&str>> for TagArg {
    fn from(tags: Vec<&str>) -> Self {
        Self::List(tags.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for TagArg {
    fn from(tags: &[&str]) -> Self {
        Self::List(tags.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TagArg {
    fn from(tags: [&str; N]) -> Self {
        Self::List(tags.iter().map(|t| t.to_string()).collect())
    }
}

// =============================================================================
// Health tags
// =============================================================================

/// Which family a tag list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFamily {
    /// Ordinary provider tags (or no tags).
    Provider,
    /// System health tags, all starting with `@`.
    Health,
}

/// Returns `true` for a system health tag.
pub fn is_health_tag(tag: &str) -> bool {
    tag.starts_with(HEALTH_TAG_PREFIX)
}

/// Classifies a tag list, rejecting a mix of health and provider tags.
pub fn classify(tags: &[String]) -> GatewayResult<TagFamily> {
    let health = tags.iter().filter(|t| is_health_tag(t)).count();

    if health == 0 {
        Ok(TagFamily::Provider)
    } else if health == tags.len() {
        Ok(TagFamily::Health)
    } else {
        Err(GatewayError::invalid_argument(
            "read(): system health and OPC tags cannot be included in the same group",
        ))
    }
}

// =============================================================================
// WriteArg
// =============================================================================

/// Tag/value pairs passed to a write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteArg {
    /// One pair, passed bare.
    Single(String, Value),
    /// A list of pairs.
    List(Vec<(String, Value)>),
}

impl WriteArg {
    /// Flattens into a pair list and a single-shape flag.
    pub fn normalize(self) -> (Vec<(String, Value)>, bool) {
        match self {
            Self::Single(tag, value) => (vec![(tag, value)], true),
            Self::List(pairs) => (pairs, false),
        }
    }

    /// Parses untyped input.
    ///
    /// Accepts `["tag", value]` or `[["tag", value], ...]`. Elements past the
    /// value in a pair are ignored.
    pub fn from_json(json: &Json) -> GatewayResult<Self> {
        let items = json.as_array().ok_or_else(pairs_type_error)?;

        match items.first() {
            None => Ok(Self::List(Vec::new())),
            Some(Json::String(_)) => {
                let (tag, value) = parse_pair(json)?;
                Ok(Self::Single(tag, value))
            }
            Some(_) => items
                .iter()
                .map(parse_pair)
                .collect::<GatewayResult<Vec<_>>>()
                .map(Self::List),
        }
    }
}

fn parse_pair(json: &Json) -> GatewayResult<(String, Value)> {
    match json.as_array().map(Vec::as_slice) {
        Some([Json::String(tag), value, ..]) => Ok((tag.clone(), Value::from_json(value)?)),
        _ => Err(pairs_type_error()),
    }
}

fn pairs_type_error() -> GatewayError {
    GatewayError::invalid_argument(
        "write(): 'tag_value_pairs' parameter must be a (tag, value) tuple or a list of (tag,value) tuples",
    )
}

impl<T: Into<String>, V: Into<Value>> From<(T, V)> for WriteArg {
    fn from((tag, value): (T, V)) -> Self {
        Self::Single(tag.into(), value.into())
    }
}

impl<T: Into<String>, V: Into<Value>> From<Vec<(T, V)>> for WriteArg {
    fn from(pairs: Vec<(T, V)>) -> Self {
        Self::List(
            pairs
                .into_iter()
                .map(|(t, v)| (t.into(), v.into()))
                .collect(),
        )
    }
}

// =============================================================================
// GroupArg
// =============================================================================

/// Group names passed to a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupArg {
    /// One group.
    Single(String),
    /// Several groups.
    List(Vec<String>),
}

impl GroupArg {
    /// Flattens into a name list.
    pub fn into_names(self) -> Vec<String> {
        match self {
            Self::Single(name) => vec![name],
            Self::List(names) => names,
        }
    }

    /// Parses untyped input.
    pub fn from_json(json: &Json) -> GatewayResult<Self> {
        let error = || {
            GatewayError::invalid_argument(
                "remove(): 'groups' parameter must be a string or a list of strings",
            )
        };

        match json {
            Json::String(name) => Ok(Self::Single(name.clone())),
            Json::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self::List)
                .ok_or_else(error),
            _ => Err(error()),
        }
    }
}

impl From<&str> for GroupArg {
    fn from(name: &str) -> Self {
        Self::Single(name.to_string())
    }
}

impl From<String> for GroupArg {
    fn from(name: String) -> Self {
        Self::Single(name)
    }
}

impl From<Vec<String>> for GroupArg {
    fn from(names: Vec<String>) -> Self {
        Self::List(names)
    }
}

impl From<Vec<&str>> for GroupArg {
    fn from(names: Vec<&str>) -> Self {
        Self::List(names.into_iter().map(str::to_string).collect())
    }
}

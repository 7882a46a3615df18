// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core value and result types.
//!
//! - [`Value`]: a dynamically typed point value
//! - [`Quality`]: the quality label attached to every read result
//! - [`DataSource`] / [`ReadSource`]: where a read is served from
//! - [`TagResult`] / [`ReadOutput`]: read results in list or single shape
//! - [`WriteResult`] / [`WriteOutput`]: write results in list or single shape

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

// =============================================================================
// Value
// =============================================================================

/// A point value as returned by a provider or passed to a write.
///
/// # Examples
///
/// ```
/// use opcgate_core::types::Value;
///
/// let level = Value::Float64(42.5);
/// assert_eq!(level.as_f64(), Some(42.5));
/// assert_eq!(Value::from("on").as_str(), Some("on"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Boolean value
    Bool(bool),

    /// Signed 8-bit integer
    Int8(i8),

    /// Signed 16-bit integer
    Int16(i16),

    /// Signed 32-bit integer
    Int32(i32),

    /// Signed 64-bit integer
    Int64(i64),

    /// Unsigned 8-bit integer
    UInt8(u8),

    /// Unsigned 16-bit integer
    UInt16(u16),

    /// Unsigned 32-bit integer
    UInt32(u32),

    /// Unsigned 64-bit integer
    UInt64(u64),

    /// 32-bit floating point
    Float32(f32),

    /// 64-bit floating point
    Float64(f64),

    /// UTF-8 string
    String(String),

    /// Array of values
    Array(Vec<Value>),

    /// Date and time
    DateTime(DateTime<Utc>),

    /// Empty value
    Null,
}

impl Value {
    /// Numeric reading widened to `f64`; `None` for non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Value::Int8(v) => v.into(),
            Value::Int16(v) => v.into(),
            Value::Int32(v) => v.into(),
            Value::Int64(v) => v as f64,
            Value::UInt8(v) => v.into(),
            Value::UInt16(v) => v.into(),
            Value::UInt32(v) => v.into(),
            Value::UInt64(v) => v as f64,
            Value::Float32(v) => v.into(),
            Value::Float64(v) => v,
            _ => return None,
        })
    }

    /// Text content of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Builds a value from plain JSON.
    ///
    /// Integers become `Int64` (or `UInt64` past `i64::MAX`), other numbers
    /// `Float64`. Objects are not point values and are rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, GatewayError> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(*v),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    Value::Float64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect::<Result<_, _>>()?)
            }
            serde_json::Value::Object(_) => {
                return Err(GatewayError::invalid_argument(
                    "objects cannot be written as point values",
                ))
            }
        })
    }

    /// Parses a command-line literal: bool, integer, float, else string.
    pub fn parse_literal(text: &str) -> Self {
        if let Ok(v) = text.parse::<bool>() {
            Value::Bool(v)
        } else if let Ok(v) = text.parse::<i64>() {
            Value::Int64(v)
        } else if let Ok(v) = text.parse::<f64>() {
            Value::Float64(v)
        } else {
            Value::String(text.to_string())
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Null => write!(f, "null"),
        }
    }
}

macro_rules! impl_from_for_value {
    ($variant:ident, $type:ty) => {
        impl From<$type> for Value {
            fn from(v: $type) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_from_for_value!(Bool, bool);
impl_from_for_value!(Int8, i8);
impl_from_for_value!(Int16, i16);
impl_from_for_value!(Int32, i32);
impl_from_for_value!(Int64, i64);
impl_from_for_value!(UInt8, u8);
impl_from_for_value!(UInt16, u16);
impl_from_for_value!(UInt32, u32);
impl_from_for_value!(UInt64, u64);
impl_from_for_value!(Float32, f32);
impl_from_for_value!(Float64, f64);
impl_from_for_value!(String, String);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

// =============================================================================
// Quality
// =============================================================================

/// Quality label of a read result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    /// The value is trustworthy.
    Good,
    /// The value is not usable.
    Bad,
    /// The value may be stale or approximate.
    Uncertain,
    /// The provider reported the reserved quality bits.
    Unknown,
    /// The item could not be read at all.
    Error,
}

impl Quality {
    /// Decodes the provider's quality word.
    ///
    /// Bits 6-7 select the label: `0 => Bad`, `1 => Uncertain`,
    /// `2 => Unknown`, `3 => Good`.
    pub fn from_bits(bits: u16) -> Self {
        match (bits >> 6) & 0b11 {
            0 => Self::Bad,
            1 => Self::Uncertain,
            2 => Self::Unknown,
            _ => Self::Good,
        }
    }

    /// Returns the label text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Bad => "Bad",
            Self::Uncertain => "Uncertain",
            Self::Unknown => "Unknown",
            Self::Error => "Error",
        }
    }

    /// Returns `true` for [`Quality::Good`].
    #[inline]
    pub fn is_good(&self) -> bool {
        matches!(self, Self::Good)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Data source
// =============================================================================

/// Where a provider serves a read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// The provider's cached values.
    Cache,
    /// A fresh read from the underlying device.
    Device,
}

impl DataSource {
    /// Returns the provider's numeric source code (cache 1, device 2).
    pub fn code(&self) -> u8 {
        match self {
            Self::Cache => 1,
            Self::Device => 2,
        }
    }

    /// Returns the source name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Device => "device",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source policy requested by a caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadSource {
    /// Always read from cache.
    Cache,
    /// Always read from the device.
    Device,
    /// Device when the sub-group was just created or rebuilt, cache otherwise.
    #[default]
    Hybrid,
}

impl ReadSource {
    /// Resolves the policy for a sub-group.
    pub fn resolve(&self, fresh: bool) -> DataSource {
        match self {
            Self::Cache => DataSource::Cache,
            Self::Device => DataSource::Device,
            Self::Hybrid if fresh => DataSource::Device,
            Self::Hybrid => DataSource::Cache,
        }
    }

    /// Returns the policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Device => "device",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ReadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadSource {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cache" => Ok(Self::Cache),
            "device" => Ok(Self::Device),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(GatewayError::invalid_argument(format!(
                "unknown read source '{other}' (expected cache, device or hybrid)"
            ))),
        }
    }
}

// =============================================================================
// Read results
// =============================================================================

/// Result of reading one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagResult {
    /// Tag name as requested.
    pub tag: String,
    /// Value, absent when the read failed.
    pub value: Option<Value>,
    /// Quality label.
    pub quality: Quality,
    /// Provider timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Provider message, present only when error text was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TagResult {
    /// Creates a failed result.
    pub fn failed(tag: impl Into<String>, error: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            value: None,
            quality: Quality::Error,
            timestamp: None,
            error,
        }
    }

    /// Returns `true` if the tag could not be read.
    pub fn is_error(&self) -> bool {
        self.quality == Quality::Error
    }

    /// Drops the tag name, giving the single-tag shape.
    pub fn into_reading(self) -> TagReading {
        TagReading {
            value: self.value,
            quality: self.quality,
            timestamp: self.timestamp,
            error: self.error,
        }
    }
}

/// Result of reading a single tag passed as a bare string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReading {
    /// Value, absent when the read failed.
    pub value: Option<Value>,
    /// Quality label.
    pub quality: Quality,
    /// Provider timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Provider message, present only when error text was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Output of a read: one reading for a bare tag, a list otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadOutput {
    /// A single tag was passed as a bare string.
    Single(TagReading),
    /// A list of tags was passed.
    Many(Vec<TagResult>),
}

impl ReadOutput {
    /// Shapes results according to how the tags were passed.
    pub fn from_results(mut results: Vec<TagResult>, single: bool) -> Self {
        if single && results.len() == 1 {
            if let Some(result) = results.pop() {
                return Self::Single(result.into_reading());
            }
        }
        Self::Many(results)
    }

    /// Returns the single reading, if this is the single shape.
    pub fn as_single(&self) -> Option<&TagReading> {
        match self {
            Self::Single(r) => Some(r),
            Self::Many(_) => None,
        }
    }

    /// Returns the result list, if this is the list shape.
    pub fn as_many(&self) -> Option<&[TagResult]> {
        match self {
            Self::Single(_) => None,
            Self::Many(r) => Some(r),
        }
    }
}

// =============================================================================
// Write results
// =============================================================================

/// Outcome of one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteStatus {
    /// The provider accepted the value.
    Success,
    /// The write failed.
    Error,
}

impl WriteStatus {
    /// Returns the status text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
        }
    }

    /// Returns `true` for [`WriteStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of writing one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// Tag name as requested.
    pub tag: String,
    /// Outcome.
    pub status: WriteStatus,
    /// Provider message, present only when error text was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a write given as a single pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReading {
    /// Outcome.
    pub status: WriteStatus,
    /// Provider message, present only when error text was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Output of a write: one status for a single pair, a list otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WriteOutput {
    /// A single pair was passed.
    Single(WriteReading),
    /// A list of pairs was passed.
    Many(Vec<WriteResult>),
}

impl WriteOutput {
    /// Shapes results according to how the pairs were passed.
    pub fn from_results(mut results: Vec<WriteResult>, single: bool) -> Self {
        if single && results.len() == 1 {
            if let Some(result) = results.pop() {
                return Self::Single(WriteReading {
                    status: result.status,
                    error: result.error,
                });
            }
        }
        Self::Many(results)
    }
}

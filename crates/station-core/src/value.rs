//! Typed values carried by variable nodes.

use crate::id::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in scalar data types supported by variable nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
}

impl DataType {
    /// Resolve a type by its standard browse name (`"UInt64"`, `"Double"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Boolean" => Some(DataType::Boolean),
            "Int32" => Some(DataType::Int32),
            "UInt32" => Some(DataType::UInt32),
            "Int64" => Some(DataType::Int64),
            "UInt64" => Some(DataType::UInt64),
            "Double" => Some(DataType::Double),
            "String" => Some(DataType::String),
            _ => None,
        }
    }

    /// Resolve a type by its standard node id (`i=9` is UInt64).
    pub fn from_node_id(id: &NodeId) -> Option<Self> {
        if id.namespace != 0 {
            return None;
        }
        match id.as_numeric()? {
            1 => Some(DataType::Boolean),
            6 => Some(DataType::Int32),
            7 => Some(DataType::UInt32),
            8 => Some(DataType::Int64),
            9 => Some(DataType::UInt64),
            11 => Some(DataType::Double),
            12 => Some(DataType::String),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Boolean => "Boolean",
            DataType::Int32 => "Int32",
            DataType::UInt32 => "UInt32",
            DataType::Int64 => "Int64",
            DataType::UInt64 => "UInt64",
            DataType::Double => "Double",
            DataType::String => "String",
        }
    }

    /// The zero value of this type.
    pub fn default_value(self) -> Variant {
        match self {
            DataType::Boolean => Variant::Boolean(false),
            DataType::Int32 => Variant::Int32(0),
            DataType::UInt32 => Variant::UInt32(0),
            DataType::Int64 => Variant::Int64(0),
            DataType::UInt64 => Variant::UInt64(0),
            DataType::Double => Variant::Double(0.0),
            DataType::String => Variant::String(String::new()),
        }
    }

    /// Parse the text form of a value of this type.
    pub fn parse_value(self, text: &str) -> Option<Variant> {
        let text = text.trim();
        match self {
            DataType::Boolean => match text {
                "true" | "1" => Some(Variant::Boolean(true)),
                "false" | "0" => Some(Variant::Boolean(false)),
                _ => None,
            },
            DataType::Int32 => text.parse().ok().map(Variant::Int32),
            DataType::UInt32 => text.parse().ok().map(Variant::UInt32),
            DataType::Int64 => text.parse().ok().map(Variant::Int64),
            DataType::UInt64 => text.parse().ok().map(Variant::UInt64),
            DataType::Double => text.parse().ok().map(Variant::Double),
            DataType::String => Some(Variant::String(text.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
}

impl Variant {
    pub fn data_type(&self) -> DataType {
        match self {
            Variant::Boolean(_) => DataType::Boolean,
            Variant::Int32(_) => DataType::Int32,
            Variant::UInt32(_) => DataType::UInt32,
            Variant::Int64(_) => DataType::Int64,
            Variant::UInt64(_) => DataType::UInt64,
            Variant::Double(_) => DataType::Double,
            Variant::String(_) => DataType::String,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Variant::UInt64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Variant::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Variant::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Boolean(v) => write!(f, "{v}"),
            Variant::Int32(v) => write!(f, "{v}"),
            Variant::UInt32(v) => write!(f, "{v}"),
            Variant::Int64(v) => write!(f, "{v}"),
            Variant::UInt64(v) => write!(f, "{v}"),
            Variant::Double(v) => write!(f, "{v}"),
            Variant::String(v) => f.write_str(v),
        }
    }
}

/// The current value of a variable together with the instant it last changed.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    pub value: Variant,
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    pub fn new(value: Variant) -> Self {
        Self {
            value,
            source_timestamp: None,
        }
    }
}

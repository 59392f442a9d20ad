use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type of a column or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Integer,
    Float,
    Boolean,
    String,
    DateTime,
    Uuid,
    /// Not statically known, e.g. a raw JSON extraction before the property
    /// transform has run.
    Unknown,
}

impl ScalarType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Integer | ScalarType::Float)
    }

    /// Result type of an arithmetic operation over two operands. Unknown
    /// operands stay unknown rather than failing; property accesses are only
    /// typed after the coercion transform.
    pub fn arithmetic_join(self, other: ScalarType) -> ScalarType {
        match (self, other) {
            (ScalarType::Integer, ScalarType::Integer) => ScalarType::Integer,
            (a, b) if a.is_numeric() && b.is_numeric() => ScalarType::Float,
            _ => ScalarType::Unknown,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Integer => "Integer",
            ScalarType::Float => "Float",
            ScalarType::Boolean => "Boolean",
            ScalarType::String => "String",
            ScalarType::DateTime => "DateTime",
            ScalarType::Uuid => "UUID",
            ScalarType::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// Declared type of a JSON property in the property-definition catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Numeric,
    DateTime,
    Boolean,
    String,
}

/// Owner namespace of a property definition. Properties on the events row
/// and on the person row are catalogued separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyOwner {
    Event,
    Person,
}

impl fmt::Display for PropertyOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyOwner::Event => write!(f, "event"),
            PropertyOwner::Person => write!(f, "person"),
        }
    }
}

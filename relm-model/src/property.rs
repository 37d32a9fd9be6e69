//! Typed component properties and their JSON codecs.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A three-component vector, serialized as `{ "x", "y", "z" }`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);
}

/// A rotation quaternion, serialized as `{ "x", "y", "z", "w" }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub const IDENTITY: Quat = Quat::new(0.0, 0.0, 0.0, 1.0);
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The declared type of a component property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Number,
    Integer,
    Boolean,
    String,
    Vector3,
    Quaternion,
    /// CSS-style color string (e.g. `"#ff0000"`).
    Color,
    /// Arbitrary JSON payload.
    Json,
    /// Opaque runtime reference. Never serialized into the document.
    Ref,
}

/// A live property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Number(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
    Vector3(Vec3),
    Quaternion(Quat),
    Color(String),
    Json(Value),
    /// Handle into some runtime-only structure (scene object, DOM node...).
    Ref(Option<String>),
}

/// A property value that does not match its declared type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("expected {expected:?}, found {found}")]
pub struct DecodeError {
    pub expected: PropertyType,
    pub found: String,
}

impl PropertyType {
    /// Default value used when a schema does not declare one.
    #[must_use]
    pub fn default_value(&self) -> PropertyValue {
        match self {
            PropertyType::Number => PropertyValue::Number(0.0),
            PropertyType::Integer => PropertyValue::Integer(0),
            PropertyType::Boolean => PropertyValue::Boolean(false),
            PropertyType::String => PropertyValue::String(String::new()),
            PropertyType::Vector3 => PropertyValue::Vector3(Vec3::ZERO),
            PropertyType::Quaternion => PropertyValue::Quaternion(Quat::IDENTITY),
            PropertyType::Color => PropertyValue::Color("#ffffff".to_string()),
            PropertyType::Json => PropertyValue::Json(Value::Null),
            PropertyType::Ref => PropertyValue::Ref(None),
        }
    }

    /// Returns false for types the sync engine never writes to the document.
    #[must_use]
    pub const fn is_serialized(&self) -> bool {
        !matches!(self, PropertyType::Ref)
    }

    /// Decodes a document value into a live property value.
    pub fn decode(&self, value: &Value) -> Result<PropertyValue, DecodeError> {
        let mismatch = || DecodeError {
            expected: *self,
            found: describe(value),
        };
        match self {
            PropertyType::Number => value.as_f64().map(PropertyValue::Number).ok_or_else(mismatch),
            PropertyType::Integer => value.as_i64().map(PropertyValue::Integer).ok_or_else(mismatch),
            PropertyType::Boolean => value.as_bool().map(PropertyValue::Boolean).ok_or_else(mismatch),
            PropertyType::String => value
                .as_str()
                .map(|s| PropertyValue::String(s.to_string()))
                .ok_or_else(mismatch),
            PropertyType::Color => value
                .as_str()
                .map(|s| PropertyValue::Color(s.to_string()))
                .ok_or_else(mismatch),
            PropertyType::Vector3 => Ok(PropertyValue::Vector3(Vec3 {
                x: component(value, "x").ok_or_else(mismatch)?,
                y: component(value, "y").ok_or_else(mismatch)?,
                z: component(value, "z").ok_or_else(mismatch)?,
            })),
            PropertyType::Quaternion => Ok(PropertyValue::Quaternion(Quat {
                x: component(value, "x").ok_or_else(mismatch)?,
                y: component(value, "y").ok_or_else(mismatch)?,
                z: component(value, "z").ok_or_else(mismatch)?,
                w: component(value, "w").ok_or_else(mismatch)?,
            })),
            PropertyType::Json => Ok(PropertyValue::Json(value.clone())),
            PropertyType::Ref => Err(mismatch()),
        }
    }

    /// Encodes a live value for the document. Returns `None` for references
    /// and for values whose variant does not match this type.
    #[must_use]
    pub fn encode(&self, value: &PropertyValue) -> Option<Value> {
        match (self, value) {
            (PropertyType::Number, PropertyValue::Number(n)) => Some(json!(n)),
            (PropertyType::Integer, PropertyValue::Integer(n)) => Some(json!(n)),
            (PropertyType::Boolean, PropertyValue::Boolean(b)) => Some(json!(b)),
            (PropertyType::String, PropertyValue::String(s))
            | (PropertyType::Color, PropertyValue::Color(s)) => Some(json!(s)),
            (PropertyType::Vector3, PropertyValue::Vector3(v)) => {
                Some(json!({ "x": v.x, "y": v.y, "z": v.z }))
            }
            (PropertyType::Quaternion, PropertyValue::Quaternion(q)) => {
                Some(json!({ "x": q.x, "y": q.y, "z": q.z, "w": q.w }))
            }
            (PropertyType::Json, PropertyValue::Json(v)) => Some(v.clone()),
            _ => None,
        }
    }
}

impl PropertyValue {
    /// The type this value belongs to.
    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Number(_) => PropertyType::Number,
            PropertyValue::Integer(_) => PropertyType::Integer,
            PropertyValue::Boolean(_) => PropertyType::Boolean,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Vector3(_) => PropertyType::Vector3,
            PropertyValue::Quaternion(_) => PropertyType::Quaternion,
            PropertyValue::Color(_) => PropertyType::Color,
            PropertyValue::Json(_) => PropertyType::Json,
            PropertyValue::Ref(_) => PropertyType::Ref,
        }
    }
}

fn component(value: &Value, axis: &str) -> Option<f64> {
    value.get(axis).and_then(Value::as_f64)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

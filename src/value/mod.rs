use serde::{Deserialize, Serialize};

/// A three-component real vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> Vec3 {
        Vec3 { x: f(self.x), y: f(self.y), z: f(self.z) }
    }

    pub fn zip(self, other: Vec3, f: impl Fn(f64, f64) -> f64) -> Vec3 {
        Vec3 { x: f(self.x, other.x), y: f(self.y, other.y), z: f(self.z, other.z) }
    }

    pub fn has_zero_component(self) -> bool {
        self.x == 0.0 || self.y == 0.0 || self.z == 0.0
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Vec3 { x, y, z }
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        self.zip(rhs, |a, b| a + b)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        self.zip(rhs, |a, b| a - b)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        self.map(|a| a * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        self.map(|a| -a)
    }
}

/// A named quantity's value. Values are immutable; assignment replaces them.
///
/// Serialises untagged so snapshots read naturally: a scalar is a JSON number,
/// a vector a three-element array, text a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Vector(Vec3),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::Scalar,
            Value::Vector(_) => ValueKind::Vector,
            Value::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Scalar(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Scalar(n as f64)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vector(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

fn fmt_number(f: &mut std::fmt::Formatter<'_>, n: f64) -> std::fmt::Result {
    if n.is_finite() && n == (n as i64) as f64 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        fmt_number(f, self.x)?;
        write!(f, ", ")?;
        fmt_number(f, self.y)?;
        write!(f, ", ")?;
        fmt_number(f, self.z)?;
        write!(f, ")")
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Scalar(n) => fmt_number(f, *n),
            Value::Vector(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    Vector,
    Text,
    Integer,
    Finite,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValueKind::Scalar => "scalar",
            ValueKind::Vector => "vector",
            ValueKind::Text => "text",
            ValueKind::Integer => "non-negative integer",
            ValueKind::Finite => "finite scalar",
        })
    }
}

/// A requested result type could not be produced from the evaluated value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("expected a {expected} result, got {found}")]
pub struct ConversionError {
    pub expected: ValueKind,
    pub found: ValueKind,
}

/// Typed extraction of an evaluated [`Value`].
///
/// Integer targets truncate toward zero. Scalar and vector never convert into
/// each other.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn mismatch(expected: ValueKind, value: &Value) -> ConversionError {
    ConversionError { expected, found: value.kind() }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        value.as_scalar().ok_or_else(|| mismatch(ValueKind::Scalar, &value))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|n| n as f32)
    }
}

/// Integer targets refuse NaN and infinities rather than saturating them.
fn finite(value: Value) -> Result<f64, ConversionError> {
    match f64::from_value(value)? {
        n if n.is_finite() => Ok(n),
        _ => Err(ConversionError { expected: ValueKind::Finite, found: ValueKind::Scalar }),
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        finite(value).map(|n| n.trunc() as i64)
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        finite(value).map(|n| n.trunc() as i32)
    }
}

impl FromValue for usize {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Scalar(n) if !n.is_finite() => {
                Err(ConversionError { expected: ValueKind::Finite, found: ValueKind::Scalar })
            }
            Value::Scalar(n) if n > -1.0 => Ok(n.trunc() as usize),
            Value::Scalar(_) => Err(ConversionError { expected: ValueKind::Integer, found: ValueKind::Scalar }),
            other => Err(mismatch(ValueKind::Scalar, &other)),
        }
    }
}

impl FromValue for Vec3 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        value.as_vector().ok_or_else(|| mismatch(ValueKind::Vector, &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch(ValueKind::Text, &other)),
        }
    }
}

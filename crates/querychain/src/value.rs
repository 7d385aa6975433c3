//! Comparable values.
//!
//! The [`Value`] enum is the type-erased value used on both sides of a
//! comparison: the compare value stored in a query node and the field value
//! read from a candidate. Built-in kinds have their own variants; values of
//! caller-registered kinds live in [`Value::Custom`].

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use log::error;

use crate::comparator::Comparator;
use crate::error::{QueryError, Result};
use crate::kind::{CustomKind, CustomValue, Kind};
use crate::relative::RelativeDate;

/// A comparable value of some registered kind.
///
/// # Example
///
/// ```
/// use querychain::{Comparator, Kind, Value};
///
/// let likes = Value::from(120);
/// assert_eq!(likes.kind(), Kind::INT);
/// assert!(likes.evaluate(Comparator::GreaterOrEqual, &Value::from(100)));
///
/// // Values of different kinds never match.
/// assert!(!likes.evaluate(Comparator::NotEqual, &Value::from("120")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value. Supports only `Equal` and `NotEqual`.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Floating point value.
    Double(f64),
    /// String value, compared lexicographically.
    String(String),
    /// Instant in time.
    Date(DateTime<Utc>),
    /// Date relative to the moment of evaluation.
    RelativeDate(RelativeDate),
    /// Value of a caller-registered kind.
    Custom(CustomValue),
}

impl Value {
    /// Wraps a value of a caller-defined kind.
    pub fn custom<T: CustomKind>(value: T) -> Self {
        Value::Custom(CustomValue::new(value))
    }

    /// Returns the kind of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::BOOL,
            Value::Int(_) => Kind::INT,
            Value::Double(_) => Kind::DOUBLE,
            Value::String(_) => Kind::STRING,
            Value::Date(_) => Kind::DATE,
            Value::RelativeDate(_) => Kind::RELATIVE_DATE,
            Value::Custom(c) => c.kind(),
        }
    }

    /// Comparators this value's kind supports.
    pub fn valid_comparators(&self) -> &'static [Comparator] {
        match self {
            Value::Custom(c) => c.valid_comparators(),
            other => other
                .kind()
                .builtin_comparators()
                .unwrap_or(Comparator::ALL),
        }
    }

    /// Evaluates `self <comparator> against`.
    ///
    /// `self` is the field value read from a candidate and `against` is the
    /// node's compare value. Relative dates on either side are resolved
    /// against the current time first. The result is `false`, with an
    /// error-level log record, when the kinds differ or a relative date cannot
    /// be resolved. An unsupported comparator falls back as described in
    /// [`Comparator::fallback`].
    pub fn evaluate(&self, comparator: Comparator, against: &Value) -> bool {
        let (Some(lhs), Some(rhs)) = (self.resolved(), against.resolved()) else {
            return false;
        };
        if lhs.kind() != rhs.kind() {
            error!(
                "cannot compare {} value against {} value, returning false",
                lhs.kind(),
                rhs.kind()
            );
            return false;
        }
        let Some(comparator) = comparator.resolve_for(lhs.valid_comparators(), lhs.kind().as_str())
        else {
            return false;
        };

        match lhs.compare(&rhs) {
            Some(ordering) => comparator.eval_ordering(ordering),
            // Unordered (NaN): only NotEqual holds.
            None => comparator == Comparator::NotEqual,
        }
    }

    /// Orders two values of the same kind.
    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Custom(a), Value::Custom(b)) => a.compare(b),
            _ => None,
        }
    }

    /// Replaces a relative date by the instant it denotes right now.
    fn resolved(&self) -> Option<Cow<'_, Value>> {
        match self {
            Value::RelativeDate(rel) => match rel.resolve() {
                Some(date) => Some(Cow::Owned(Value::Date(date))),
                None => {
                    error!("unable to resolve relative date '{rel}', returning false");
                    None
                }
            },
            other => Some(Cow::Borrowed(other)),
        }
    }

    /// Encodes the payload as JSON bytes, returned with the kind tag.
    pub fn encode(&self) -> Result<(Vec<u8>, Kind)> {
        let bytes = match self {
            Value::Bool(b) => serde_json::to_vec(b)?,
            Value::Int(n) => serde_json::to_vec(n)?,
            Value::Double(n) => encode_double(*n)?,
            Value::String(s) => serde_json::to_vec(s)?,
            Value::Date(d) => serde_json::to_vec(d)?,
            Value::RelativeDate(r) => serde_json::to_vec(r)?,
            Value::Custom(c) => c.encode()?,
        };
        Ok((bytes, self.kind()))
    }

    /// Extracts the boolean value, if present.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extracts the integer value, if present.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Extracts the floating point value, if present.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Extracts the string value, if present.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extracts the date value, if present.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Extracts a custom value of type `T`, if present.
    pub fn as_custom<T: CustomKind>(&self) -> Option<&T> {
        match self {
            Value::Custom(c) => c.downcast_ref::<T>(),
            _ => None,
        }
    }
}

// JSON has no non-finite numbers, so those are written as labels.
const POSITIVE_INFINITY: &str = "inf";
const NEGATIVE_INFINITY: &str = "-inf";
const NOT_A_NUMBER: &str = "NaN";

fn encode_double(n: f64) -> serde_json::Result<Vec<u8>> {
    if n.is_finite() {
        serde_json::to_vec(&n)
    } else if n.is_nan() {
        serde_json::to_vec(NOT_A_NUMBER)
    } else if n > 0.0 {
        serde_json::to_vec(POSITIVE_INFINITY)
    } else {
        serde_json::to_vec(NEGATIVE_INFINITY)
    }
}

/// Parses a `Double` payload written by [`Value::encode`].
pub(crate) fn decode_double(bytes: &[u8]) -> Result<f64> {
    let invalid = |reason: String| QueryError::decoding(Kind::DOUBLE.as_str(), reason);
    match serde_json::from_slice::<serde_json::Value>(bytes).map_err(|e| invalid(e.to_string()))? {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| invalid(format!("{n} is not representable as f64"))),
        serde_json::Value::String(label) => match label.as_str() {
            POSITIVE_INFINITY => Ok(f64::INFINITY),
            NEGATIVE_INFINITY => Ok(f64::NEG_INFINITY),
            NOT_A_NUMBER => Ok(f64::NAN),
            other => Err(invalid(format!("unknown double label '{other}'"))),
        },
        other => Err(invalid(format!("expected a number, found {other}"))),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i8> for Value {
    fn from(n: i8) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Double(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<RelativeDate> for Value {
    fn from(r: RelativeDate) -> Self {
        Value::RelativeDate(r)
    }
}

impl From<CustomValue> for Value {
    fn from(c: CustomValue) -> Self {
        Value::Custom(c)
    }
}

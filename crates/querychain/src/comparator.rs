//! Comparison operators for query nodes.
//!
//! The [`Comparator`] enum is the closed set of six ordering/equality
//! operators. Every value kind declares which of them it supports; an
//! unsupported comparator is substituted at evaluation time rather than
//! rejected (see [`Comparator::fallback`]).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Comparison operator for a query node.
///
/// The comparison always reads `field_value <op> compare_value`, so
/// `Comparator::GreaterOrEqual` with a compare value of `100` keeps items
/// whose field is at least 100.
///
/// The serialized form is the human-readable label (`"less than"`, ...), which
/// is also what [`Display`](fmt::Display) and [`FromStr`] use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// Strictly less than.
    #[serde(rename = "less than")]
    Less,
    /// Strictly greater than.
    #[serde(rename = "greater than")]
    Greater,
    /// Less than or equal.
    #[serde(rename = "less than or equal to")]
    LessOrEqual,
    /// Greater than or equal.
    #[serde(rename = "greater than or equal to")]
    GreaterOrEqual,
    /// Equal.
    #[serde(rename = "equal to")]
    Equal,
    /// Not equal.
    #[serde(rename = "not equal to")]
    NotEqual,
}

impl Comparator {
    /// All comparators, in picker order.
    pub const ALL: &'static [Comparator] = &[
        Comparator::Less,
        Comparator::Greater,
        Comparator::LessOrEqual,
        Comparator::GreaterOrEqual,
        Comparator::Equal,
        Comparator::NotEqual,
    ];

    /// The equality-only subset, used by kinds without an ordering.
    pub const EQUALITY: &'static [Comparator] = &[Comparator::Equal, Comparator::NotEqual];

    /// Returns `true` for `Equal` and `NotEqual`.
    pub fn is_equality(self) -> bool {
        matches!(self, Comparator::Equal | Comparator::NotEqual)
    }

    /// The operator substituted when a kind does not support this one.
    ///
    /// - `Less` -> `NotEqual`
    /// - `Greater` -> `NotEqual`
    /// - `LessOrEqual` -> `Equal`
    /// - `GreaterOrEqual` -> `Equal`
    /// - `Equal`, `NotEqual` unchanged
    ///
    /// `Less` and `Greater` collapse onto the same operator. Persisted filters
    /// depend on this mapping, so it is kept as is.
    pub fn fallback(self) -> Comparator {
        match self {
            Comparator::Less | Comparator::Greater => Comparator::NotEqual,
            Comparator::LessOrEqual | Comparator::GreaterOrEqual => Comparator::Equal,
            other => other,
        }
    }

    /// Picks the operator to actually run against a kind.
    ///
    /// Returns `self` when it is in `valid`, the [`fallback`](Self::fallback)
    /// (with a warning) when that is, and `None` (with an error record) when
    /// neither is supported.
    pub fn resolve_for(self, valid: &[Comparator], kind: &str) -> Option<Comparator> {
        if valid.contains(&self) {
            return Some(self);
        }
        let fallback = self.fallback();
        if valid.contains(&fallback) {
            warn!("{kind} comparison does not support '{self}', running '{fallback}' instead");
            Some(fallback)
        } else {
            error!("{kind} comparison supports neither '{self}' nor '{fallback}', returning false");
            None
        }
    }

    /// Evaluates this comparator given the ordering of `field` relative to
    /// the compare value.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Comparator::Less => ordering == Ordering::Less,
            Comparator::Greater => ordering == Ordering::Greater,
            Comparator::LessOrEqual => ordering != Ordering::Greater,
            Comparator::GreaterOrEqual => ordering != Ordering::Less,
            Comparator::Equal => ordering == Ordering::Equal,
            Comparator::NotEqual => ordering != Ordering::Equal,
        }
    }

    /// Returns the human-readable label of this comparator.
    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Less => "less than",
            Comparator::Greater => "greater than",
            Comparator::LessOrEqual => "less than or equal to",
            Comparator::GreaterOrEqual => "greater than or equal to",
            Comparator::Equal => "equal to",
            Comparator::NotEqual => "not equal to",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Comparator::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| QueryError::decoding("Comparator", format!("unknown comparator '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_ordering_natural_semantics() {
        assert!(Comparator::Less.eval_ordering(Ordering::Less));
        assert!(!Comparator::Less.eval_ordering(Ordering::Equal));
        assert!(!Comparator::Less.eval_ordering(Ordering::Greater));

        assert!(Comparator::Greater.eval_ordering(Ordering::Greater));
        assert!(!Comparator::Greater.eval_ordering(Ordering::Equal));

        assert!(Comparator::LessOrEqual.eval_ordering(Ordering::Less));
        assert!(Comparator::LessOrEqual.eval_ordering(Ordering::Equal));
        assert!(!Comparator::LessOrEqual.eval_ordering(Ordering::Greater));

        assert!(Comparator::GreaterOrEqual.eval_ordering(Ordering::Greater));
        assert!(Comparator::GreaterOrEqual.eval_ordering(Ordering::Equal));
        assert!(!Comparator::GreaterOrEqual.eval_ordering(Ordering::Less));

        assert!(Comparator::Equal.eval_ordering(Ordering::Equal));
        assert!(!Comparator::Equal.eval_ordering(Ordering::Less));

        assert!(Comparator::NotEqual.eval_ordering(Ordering::Greater));
        assert!(!Comparator::NotEqual.eval_ordering(Ordering::Equal));
    }

    #[test]
    fn fallback_table() {
        assert_eq!(Comparator::Less.fallback(), Comparator::NotEqual);
        assert_eq!(Comparator::Greater.fallback(), Comparator::NotEqual);
        assert_eq!(Comparator::LessOrEqual.fallback(), Comparator::Equal);
        assert_eq!(Comparator::GreaterOrEqual.fallback(), Comparator::Equal);
        assert_eq!(Comparator::Equal.fallback(), Comparator::Equal);
        assert_eq!(Comparator::NotEqual.fallback(), Comparator::NotEqual);
    }

    #[test]
    fn resolve_for_restricted_set() {
        let valid = Comparator::EQUALITY;
        assert_eq!(
            Comparator::Equal.resolve_for(valid, "Bool"),
            Some(Comparator::Equal)
        );
        assert_eq!(
            Comparator::Greater.resolve_for(valid, "Bool"),
            Some(Comparator::NotEqual)
        );
        assert_eq!(
            Comparator::GreaterOrEqual.resolve_for(valid, "Bool"),
            Some(Comparator::Equal)
        );
    }

    #[test]
    fn resolve_for_unsupported_fallback() {
        let valid = &[Comparator::Less, Comparator::Greater];
        assert_eq!(Comparator::LessOrEqual.resolve_for(valid, "Custom"), None);
        assert_eq!(Comparator::Equal.resolve_for(valid, "Custom"), None);
    }

    #[test]
    fn labels_parse_back() {
        for c in Comparator::ALL {
            assert_eq!(c.as_str().parse::<Comparator>().unwrap(), *c);
        }
        assert!("around".parse::<Comparator>().is_err());
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&Comparator::GreaterOrEqual).unwrap();
        assert_eq!(json, "\"greater than or equal to\"");
        let back: Comparator = serde_json::from_str("\"not equal to\"").unwrap();
        assert_eq!(back, Comparator::NotEqual);
    }
}

//! Value kinds and the extension point for caller-defined kinds.
//!
//! Every comparable value has a [`Kind`]: a stable string tag that travels
//! next to the encoded payload so the value can be rebuilt later. The
//! built-in kinds cover booleans, integers, floats, strings and dates;
//! applications add their own by implementing [`CustomKind`] and registering
//! the type with a [`KindRegistry`](crate::KindRegistry).

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::comparator::Comparator;

/// Tag identifying the concrete type of a comparable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Kind(&'static str);

impl Kind {
    /// `bool` values.
    pub const BOOL: Kind = Kind("Bool");
    /// `i64` values.
    pub const INT: Kind = Kind("Int");
    /// `f64` values.
    pub const DOUBLE: Kind = Kind("Double");
    /// `String` values.
    pub const STRING: Kind = Kind("String");
    /// UTC instants.
    pub const DATE: Kind = Kind("Date");
    /// [`RelativeDate`](crate::RelativeDate) offsets, compared as dates.
    pub const RELATIVE_DATE: Kind = Kind("RelativeDate");

    /// Built-in kinds, in lookup order.
    pub const BUILTIN: &'static [Kind] = &[
        Kind::DATE,
        Kind::STRING,
        Kind::INT,
        Kind::DOUBLE,
        Kind::BOOL,
        Kind::RELATIVE_DATE,
    ];

    /// The kind of a caller-defined value type.
    pub const fn of<T: CustomKind>() -> Kind {
        Kind(T::KIND)
    }

    /// Looks up a built-in kind by tag.
    pub fn builtin(tag: &str) -> Option<Kind> {
        Kind::BUILTIN.iter().copied().find(|k| k.0 == tag)
    }

    /// Returns `true` for the kinds that ship with the crate.
    pub fn is_builtin(self) -> bool {
        Kind::BUILTIN.contains(&self)
    }

    /// Comparators a built-in kind supports, `None` for custom kinds.
    pub fn builtin_comparators(self) -> Option<&'static [Comparator]> {
        match self {
            Kind::BOOL => Some(Comparator::EQUALITY),
            k if k.is_builtin() => Some(Comparator::ALL),
            _ => None,
        }
    }

    /// Returns `true` if a field of this kind can be compared against a
    /// compare value of kind `compare`.
    ///
    /// Kinds must match exactly, except that a date field also accepts a
    /// relative date.
    pub fn accepts(self, compare: Kind) -> bool {
        self == compare || (self == Kind::DATE && compare == Kind::RELATIVE_DATE)
    }

    /// Returns the tag.
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Trait for application types usable as comparable values.
///
/// The payload is stored as JSON, so the type needs serde support. `Default`
/// provides the value an editor starts from when nothing was chosen yet.
///
/// # Example
///
/// ```
/// use querychain::{Comparator, CustomKind, Kind, Value};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
/// enum Priority {
///     #[default]
///     Low,
///     High,
/// }
///
/// impl CustomKind for Priority {
///     const KIND: &'static str = "Priority";
/// }
///
/// let high = Value::custom(Priority::High);
/// assert_eq!(high.kind(), Kind::of::<Priority>());
/// assert!(high.evaluate(Comparator::Greater, &Value::custom(Priority::Low)));
/// ```
pub trait CustomKind:
    Clone
    + PartialEq
    + PartialOrd
    + Default
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Tag written next to encoded values. Must be unique per registry.
    const KIND: &'static str;

    /// Comparators this kind supports.
    fn valid_comparators() -> &'static [Comparator] {
        Comparator::ALL
    }
}

/// Object-safe face of a [`CustomKind`] value.
pub(crate) trait ErasedValue: fmt::Debug + Send + Sync {
    fn kind(&self) -> Kind;
    fn valid_comparators(&self) -> &'static [Comparator];
    fn compare(&self, other: &dyn ErasedValue) -> Option<Ordering>;
    fn eq_erased(&self, other: &dyn ErasedValue) -> bool;
    fn encode(&self) -> serde_json::Result<Vec<u8>>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: CustomKind> ErasedValue for T {
    fn kind(&self) -> Kind {
        Kind::of::<T>()
    }

    fn valid_comparators(&self) -> &'static [Comparator] {
        <T as CustomKind>::valid_comparators()
    }

    fn compare(&self, other: &dyn ErasedValue) -> Option<Ordering> {
        other
            .as_any()
            .downcast_ref::<T>()
            .and_then(|other| self.partial_cmp(other))
    }

    fn eq_erased(&self, other: &dyn ErasedValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A caller-defined comparable value with its concrete type erased.
#[derive(Clone)]
pub struct CustomValue(Arc<dyn ErasedValue>);

impl CustomValue {
    /// Wraps a custom value.
    pub fn new<T: CustomKind>(value: T) -> Self {
        CustomValue(Arc::new(value))
    }

    /// The kind of the wrapped value.
    pub fn kind(&self) -> Kind {
        self.0.kind()
    }

    /// Comparators the wrapped value's kind supports.
    pub fn valid_comparators(&self) -> &'static [Comparator] {
        self.0.valid_comparators()
    }

    /// Returns the wrapped value if it is a `T`.
    pub fn downcast_ref<T: CustomKind>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Orders two custom values. `None` for different kinds or incomparable
    /// values.
    pub fn compare(&self, other: &CustomValue) -> Option<Ordering> {
        self.0.compare(other.0.as_ref())
    }

    pub(crate) fn encode(&self) -> serde_json::Result<Vec<u8>> {
        self.0.encode()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_erased(other.0.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
    struct Stars(u8);

    impl CustomKind for Stars {
        const KIND: &'static str = "Stars";
    }

    #[derive(Debug, Clone, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
    struct Tag(String);

    impl CustomKind for Tag {
        const KIND: &'static str = "Tag";

        fn valid_comparators() -> &'static [Comparator] {
            Comparator::EQUALITY
        }
    }

    #[test]
    fn builtin_lookup() {
        assert_eq!(Kind::builtin("Bool"), Some(Kind::BOOL));
        assert_eq!(Kind::builtin("Double"), Some(Kind::DOUBLE));
        assert_eq!(Kind::builtin("Stars"), None);
        assert!(Kind::DATE.is_builtin());
        assert!(!Kind::of::<Stars>().is_builtin());
    }

    #[test]
    fn builtin_comparator_sets() {
        assert_eq!(Kind::BOOL.builtin_comparators(), Some(Comparator::EQUALITY));
        assert_eq!(Kind::INT.builtin_comparators(), Some(Comparator::ALL));
        assert_eq!(Kind::of::<Stars>().builtin_comparators(), None);
    }

    #[test]
    fn accepts_relative_dates_for_date_fields() {
        assert!(Kind::DATE.accepts(Kind::DATE));
        assert!(Kind::DATE.accepts(Kind::RELATIVE_DATE));
        assert!(!Kind::RELATIVE_DATE.accepts(Kind::DATE));
        assert!(!Kind::INT.accepts(Kind::DOUBLE));
    }

    #[test]
    fn custom_value_compare_and_eq() {
        let a = CustomValue::new(Stars(3));
        let b = CustomValue::new(Stars(5));
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(a, CustomValue::new(Stars(3)));
        assert_ne!(a, b);
    }

    #[test]
    fn custom_value_different_types_never_compare() {
        let stars = CustomValue::new(Stars(3));
        let tag = CustomValue::new(Tag("x".into()));
        assert_eq!(stars.compare(&tag), None);
        assert_ne!(stars, tag);
    }

    #[test]
    fn custom_value_downcast() {
        let v = CustomValue::new(Stars(4));
        assert_eq!(v.downcast_ref::<Stars>(), Some(&Stars(4)));
        assert!(v.downcast_ref::<Tag>().is_none());
        assert_eq!(v.kind().as_str(), "Stars");
        assert_eq!(
            CustomValue::new(Tag::default()).valid_comparators(),
            Comparator::EQUALITY
        );
    }
}

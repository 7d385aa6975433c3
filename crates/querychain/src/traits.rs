//! The trait a domain type implements to be filtered by query chains.

use std::fmt;

use crate::error::{QueryError, Result};
use crate::kind::Kind;
use crate::value::Value;

/// Trait for types that can be filtered with a [`QueryNode`](crate::QueryNode)
/// chain.
///
/// An implementation declares its queryable fields once, as an ordered
/// registry of `(field, kind)` pairs, and maps each field to a display name.
/// Display names, not field identifiers, are what stored filters refer to,
/// so they must stay stable across releases.
///
/// # Example
///
/// ```
/// use querychain::{Kind, Queryable, Value};
///
/// struct Task {
///     title: String,
///     done: bool,
/// }
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum TaskField {
///     Title,
///     Done,
/// }
///
/// impl Queryable for Task {
///     type Field = TaskField;
///
///     const ENTITY: &'static str = "Task";
///
///     fn fields() -> &'static [(TaskField, Kind)] {
///         &[(TaskField::Title, Kind::STRING), (TaskField::Done, Kind::BOOL)]
///     }
///
///     fn display_name(field: TaskField) -> &'static str {
///         match field {
///             TaskField::Title => "Title",
///             TaskField::Done => "Done",
///         }
///     }
///
///     fn field_value(&self, field: TaskField) -> Option<Value> {
///         match field {
///             TaskField::Title => Some(Value::from(self.title.as_str())),
///             TaskField::Done => Some(Value::Bool(self.done)),
///         }
///     }
/// }
///
/// assert_eq!(Task::field_for("Done").unwrap(), TaskField::Done);
/// assert!(Task::field_for("Owner").is_err());
/// assert_eq!(Task::kind_of(TaskField::Title), Some(Kind::STRING));
/// ```
pub trait Queryable: 'static {
    /// Identifier of a queryable field, usually a fieldless enum.
    type Field: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    /// Stable name of the entity type. Stored filters are scoped by it.
    const ENTITY: &'static str;

    /// Queryable fields and their kinds, in default picker order.
    fn fields() -> &'static [(Self::Field, Kind)];

    /// Human-readable name of a field.
    fn display_name(field: Self::Field) -> &'static str;

    /// Resolves a display name back to its field.
    ///
    /// The default scans [`fields`](Self::fields) and fails with
    /// [`QueryError::UnknownFieldName`] when no field has that name.
    fn field_for(name: &str) -> Result<Self::Field> {
        Self::fields()
            .iter()
            .map(|(field, _)| *field)
            .find(|field| Self::display_name(*field) == name)
            .ok_or_else(|| QueryError::UnknownFieldName(name.to_string()))
    }

    /// Declared kind of a field.
    fn kind_of(field: Self::Field) -> Option<Kind> {
        Self::fields()
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, kind)| *kind)
    }

    /// Display names of all fields, in picker order.
    fn display_names() -> Vec<&'static str> {
        Self::fields()
            .iter()
            .map(|(field, _)| Self::display_name(*field))
            .collect()
    }

    /// Current value of a field, or `None` when it has no comparable value.
    fn field_value(&self, field: Self::Field) -> Option<Value>;
}

//! Querychain - typed predicate chains over Rust struct collections.
//!
//! Querychain lets an application describe a filter as a chain of
//! comparisons over one entity type, joined by AND/OR connectors, evaluate it
//! against items of that type, and persist it under a name without losing
//! the types of its compare values. It provides:
//!
//! - Built-in value kinds: booleans, integers, floats, strings, dates and
//!   relative dates, plus caller-registered kinds via [`CustomKind`]
//! - Six comparators with per-kind validity and a fixed fallback table
//! - Linear chains evaluated right-nested in construction order
//! - A JSON persistence format keyed by field display names
//! - Named filters per entity type over any [`KeyValueStore`]
//!
//! # Quick Start
//!
//! ```rust
//! use querychain::{
//!     Comparator, Connector, FilterStore, Kind, KindRegistry, MemoryStore, QueryNode,
//!     Queryable, Value,
//! };
//!
//! // Define your data
//! struct Article {
//!     author: String,
//!     likes: i64,
//!     starred: bool,
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum ArticleField {
//!     Author,
//!     Likes,
//!     Starred,
//! }
//!
//! // Describe its queryable fields
//! impl Queryable for Article {
//!     type Field = ArticleField;
//!     const ENTITY: &'static str = "Article";
//!
//!     fn fields() -> &'static [(ArticleField, Kind)] {
//!         &[
//!             (ArticleField::Author, Kind::STRING),
//!             (ArticleField::Likes, Kind::INT),
//!             (ArticleField::Starred, Kind::BOOL),
//!         ]
//!     }
//!
//!     fn display_name(field: ArticleField) -> &'static str {
//!         match field {
//!             ArticleField::Author => "Author",
//!             ArticleField::Likes => "Likes",
//!             ArticleField::Starred => "Starred",
//!         }
//!     }
//!
//!     fn field_value(&self, field: ArticleField) -> Option<Value> {
//!         match field {
//!             ArticleField::Author => Some(Value::from(self.author.as_str())),
//!             ArticleField::Likes => Some(Value::Int(self.likes)),
//!             ArticleField::Starred => Some(Value::Bool(self.starred)),
//!         }
//!     }
//! }
//!
//! // Build and run a chain: likes >= 100 AND starred == true
//! let mut popular = QueryNode::<Article>::new(Comparator::GreaterOrEqual, 100, ArticleField::Likes);
//! popular.append(ArticleField::Starred, true, Comparator::Equal, Connector::And);
//!
//! let articles = vec![
//!     Article { author: "ana".into(), likes: 100, starred: false },
//!     Article { author: "bo".into(), likes: 100, starred: true },
//! ];
//! let results = popular.filter(&articles);
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].author, "bo");
//!
//! // Persist it and read it back
//! let mut store = FilterStore::new(MemoryStore::new(), KindRegistry::builtin());
//! store.save(&popular, "Popular").unwrap();
//! assert_eq!(store.load::<Article>("Popular").unwrap(), popular);
//! ```
//!
//! # Chain Semantics
//!
//! A chain is a list, not a tree. Each node holds one comparison and an
//! optional connector to the next node, and evaluation nests to the right:
//!
//! ```text
//! n1 AND n2 OR n3   ==   n1 AND (n2 OR n3)
//! ```
//!
//! Every node is evaluated on every call, even when the result is already
//! decided. A node whose field is missing or holds a value of a different
//! kind than its compare value makes its part of the chain `false` and logs
//! an error; evaluation itself never fails.
//!
//! # Comparators and Kinds
//!
//! | Kind | Tag | Comparators |
//! |------|-----|-------------|
//! | `bool` | `Bool` | `Equal`, `NotEqual` |
//! | `i64` | `Int` | all |
//! | `f64` | `Double` | all |
//! | `String` | `String` | all |
//! | `DateTime<Utc>` | `Date` | all |
//! | [`RelativeDate`] | `RelativeDate` | all, compared as the date it resolves to |
//! | [`CustomKind`] | `T::KIND` | `T::valid_comparators()` |
//!
//! An unsupported comparator is replaced, with a warning, by
//! [`Comparator::fallback`]: `Less` and `Greater` run `NotEqual`,
//! `LessOrEqual` and `GreaterOrEqual` run `Equal`.
//!
//! # Diagnostics
//!
//! Warnings and errors are emitted through the [`log`] facade; install any
//! logger to see them.

mod comparator;
mod error;
mod filters;
mod kind;
mod node;
mod registry;
mod relative;
mod serialized;
mod store;
mod traits;
mod value;

// Re-export public API
pub use comparator::Comparator;
pub use error::{QueryError, Result};
pub use filters::{FilterStore, NamedFilter, DEFAULT_NAMESPACE};
pub use kind::{CustomKind, CustomValue, Kind};
pub use node::{Connector, Iter, Link, QueryNode};
pub use registry::{KindRegistry, KindRegistryBuilder};
pub use relative::RelativeDate;
pub use serialized::SerializedQueryNode;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use traits::Queryable;
pub use value::Value;

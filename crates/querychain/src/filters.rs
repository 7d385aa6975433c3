//! Named filters persisted per entity type.
//!
//! Each entity type owns an index (the ordered list of its filter names) and
//! one record per filter holding the encoded chain:
//!
//! ```text
//! {namespace}/{entity}          -> ["Popular", "Starred this week"]
//! {namespace}/{entity}/{name}   -> encoded SerializedQueryNode
//! ```
//!
//! `%` and `/` in entity and filter names are percent-escaped in keys, so a
//! name can never reach into another entity's keys.

use std::borrow::Cow;
use std::fmt;

use log::{debug, warn};

use crate::error::{QueryError, Result};
use crate::node::QueryNode;
use crate::registry::KindRegistry;
use crate::serialized::SerializedQueryNode;
use crate::store::KeyValueStore;
use crate::traits::Queryable;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "querychain";

/// A stored chain together with the name it was saved under.
pub struct NamedFilter<E: Queryable> {
    /// User-chosen name, unique per entity type.
    pub name: String,
    /// The restored chain.
    pub chain: QueryNode<E>,
}

impl<E: Queryable> Clone for NamedFilter<E> {
    fn clone(&self) -> Self {
        NamedFilter {
            name: self.name.clone(),
            chain: self.chain.clone(),
        }
    }
}

impl<E: Queryable> fmt::Debug for NamedFilter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedFilter")
            .field("name", &self.name)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Saves, lists and removes named filters over a [`KeyValueStore`].
///
/// # Example
///
/// ```
/// use querychain::{Comparator, FilterStore, Kind, KindRegistry, MemoryStore, QueryNode, Queryable, Value};
///
/// struct Note {
///     words: i64,
/// }
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum NoteField {
///     Words,
/// }
///
/// impl Queryable for Note {
///     type Field = NoteField;
///     const ENTITY: &'static str = "Note";
///
///     fn fields() -> &'static [(NoteField, Kind)] {
///         &[(NoteField::Words, Kind::INT)]
///     }
///
///     fn display_name(_: NoteField) -> &'static str {
///         "Words"
///     }
///
///     fn field_value(&self, _: NoteField) -> Option<Value> {
///         Some(Value::Int(self.words))
///     }
/// }
///
/// let mut store = FilterStore::new(MemoryStore::new(), KindRegistry::builtin());
/// let long = QueryNode::<Note>::new(Comparator::Greater, 500, NoteField::Words);
///
/// store.save(&long, "Long notes").unwrap();
/// assert!(store.save(&long, "Long notes").is_err());
///
/// let filters = store.list::<Note>().unwrap();
/// assert_eq!(filters.len(), 1);
/// assert_eq!(filters[0].name, "Long notes");
/// assert_eq!(filters[0].chain, long);
///
/// store.remove::<Note>("Long notes").unwrap();
/// assert!(store.list::<Note>().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct FilterStore<S> {
    backend: S,
    registry: KindRegistry,
    namespace: String,
}

impl<S: KeyValueStore> FilterStore<S> {
    /// Creates a store over `backend`, decoding values with `registry`.
    pub fn new(backend: S, registry: KindRegistry) -> Self {
        FilterStore {
            backend,
            registry,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Prefixes every key with `namespace` instead of the default.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The key prefix in use.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The registry used to decode stored values.
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// The backing store.
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Consumes the filter store, returning the backing store.
    pub fn into_backend(self) -> S {
        self.backend
    }

    fn index_key<E: Queryable>(&self) -> String {
        format!("{}/{}", self.namespace, key_segment(E::ENTITY))
    }

    fn filter_key<E: Queryable>(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.namespace,
            key_segment(E::ENTITY),
            key_segment(name)
        )
    }

    /// Names of the filters stored for `E`, in save order.
    pub fn names<E: Queryable>(&self) -> Result<Vec<String>> {
        match self.backend.get(&self.index_key::<E>())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Returns `true` if a filter named `name` exists for `E`.
    pub fn contains<E: Queryable>(&self, name: &str) -> Result<bool> {
        Ok(self.names::<E>()?.iter().any(|n| n == name))
    }

    /// All filters stored for `E`, in save order.
    ///
    /// Entries whose record is missing or no longer decodes (for example
    /// after a field was renamed) are skipped with a warning.
    pub fn list<E: Queryable>(&self) -> Result<Vec<NamedFilter<E>>> {
        let mut filters = Vec::new();
        for name in self.names::<E>()? {
            match self.load::<E>(&name) {
                Ok(chain) => filters.push(NamedFilter { name, chain }),
                Err(e) => warn!("skipping {} filter '{name}': {e}", E::ENTITY),
            }
        }
        Ok(filters)
    }

    /// Loads one filter.
    ///
    /// Fails with [`QueryError::NodeNotFound`] when nothing is stored under
    /// `name`; decode errors are returned as is.
    pub fn load<E: Queryable>(&self, name: &str) -> Result<QueryNode<E>> {
        let bytes = self
            .backend
            .get(&self.filter_key::<E>(name))?
            .ok_or_else(|| QueryError::NodeNotFound(name.to_string()))?;
        SerializedQueryNode::decode(&bytes, &self.registry)?.deserialize::<E>()
    }

    /// Saves `chain` as `name`.
    ///
    /// Fails with [`QueryError::DuplicateName`] if `name` is already used for
    /// `E`, and with [`QueryError::UnknownKind`] if a compare value has a kind
    /// this store's registry cannot decode. Nothing is written unless the
    /// chain encodes, and the record is rolled back if the index cannot be
    /// updated.
    pub fn save<E: Queryable>(&mut self, chain: &QueryNode<E>, name: &str) -> Result<()> {
        let mut names = self.names::<E>()?;
        if names.iter().any(|n| n == name) {
            return Err(QueryError::DuplicateName(name.to_string()));
        }
        if let Some(kind) = chain
            .iter()
            .map(|node| node.compare_value().kind())
            .find(|kind| !self.registry.contains(kind.as_str()))
        {
            return Err(QueryError::UnknownKind(kind.as_str().to_string()));
        }
        let bytes = chain.serialize().encode()?;
        names.push(name.to_string());
        let index = serde_json::to_vec(&names)?;

        let key = self.filter_key::<E>(name);
        let index_key = self.index_key::<E>();
        self.backend.set(&key, bytes)?;
        if let Err(e) = self.backend.set(&index_key, index) {
            if let Err(rollback) = self.backend.remove(&key) {
                warn!("failed to roll back filter record '{key}': {rollback}");
            }
            return Err(e);
        }
        debug!("saved {} filter '{name}' ({} nodes)", E::ENTITY, chain.len());
        Ok(())
    }

    /// Removes the filter `name`. Removing a missing filter does nothing.
    pub fn remove<E: Queryable>(&mut self, name: &str) -> Result<()> {
        let mut names = self.names::<E>()?;
        let before = names.len();
        names.retain(|n| n != name);
        if names.len() != before {
            let index_key = self.index_key::<E>();
            self.backend.set(&index_key, serde_json::to_vec(&names)?)?;
        }
        let key = self.filter_key::<E>(name);
        self.backend.remove(&key)?;
        debug!("removed {} filter '{name}'", E::ENTITY);
        Ok(())
    }
}

/// Escapes `%` and `/` so a name stays one key segment.
fn key_segment(raw: &str) -> Cow<'_, str> {
    if raw.contains(['%', '/']) {
        Cow::Owned(raw.replace('%', "%25").replace('/', "%2F"))
    } else {
        Cow::Borrowed(raw)
    }
}

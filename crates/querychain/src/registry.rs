//! Kind registry: maps kind tags to decode and default-value routines.
//!
//! Decoding a stored value needs to know which concrete type the tag names.
//! Built-in kinds are always known; caller kinds are added through
//! [`KindRegistryBuilder`] and the result is frozen once built.
//!
//! Registries are plain values handed to whatever decodes filters (see
//! [`FilterStore::new`](crate::FilterStore::new)). For applications that
//! prefer a single process-wide registry, [`KindRegistry::install_global`]
//! sets one exactly once.

use std::fmt;

use chrono::{DateTime, Utc};
use log::warn;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;

use crate::comparator::Comparator;
use crate::error::{QueryError, Result};
use crate::kind::{CustomKind, Kind};
use crate::relative::RelativeDate;
use crate::value::{decode_double, Value};

static GLOBAL: OnceCell<KindRegistry> = OnceCell::new();

#[derive(Clone, Copy)]
struct KindEntry {
    kind: Kind,
    decode: fn(&[u8]) -> Result<Value>,
    default: fn() -> Value,
    comparators: fn() -> &'static [Comparator],
}

impl KindEntry {
    fn of<T: CustomKind>() -> Self {
        KindEntry {
            kind: Kind::of::<T>(),
            decode: decode_custom::<T>,
            default: || Value::custom(T::default()),
            comparators: T::valid_comparators,
        }
    }
}

impl fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindEntry").field("kind", &self.kind).finish()
    }
}

/// Immutable set of value kinds known to a decoder.
///
/// # Example
///
/// ```
/// use querychain::{CustomKind, Kind, KindRegistry, Value};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
/// struct Version(u32, u32);
///
/// impl CustomKind for Version {
///     const KIND: &'static str = "Version";
/// }
///
/// let registry = KindRegistry::builder().register::<Version>().build();
///
/// let (bytes, kind) = Value::custom(Version(1, 4)).encode().unwrap();
/// assert_eq!(kind, Kind::of::<Version>());
///
/// let decoded = registry.decode(&bytes, "Version").unwrap();
/// assert_eq!(decoded.as_custom::<Version>(), Some(&Version(1, 4)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    custom: Vec<KindEntry>,
}

impl KindRegistry {
    /// A registry with only the built-in kinds.
    pub fn builtin() -> Self {
        KindRegistry::default()
    }

    /// Starts a registry with the built-in kinds plus caller kinds.
    pub fn builder() -> KindRegistryBuilder {
        KindRegistryBuilder::default()
    }

    /// Installs `self` as the process-wide registry.
    ///
    /// Succeeds once. Fails with [`QueryError::RegistryAlreadyInstalled`] if
    /// a registry was installed before or [`global`](Self::global) was
    /// already called.
    pub fn install_global(self) -> Result<()> {
        GLOBAL
            .set(self)
            .map_err(|_| QueryError::RegistryAlreadyInstalled)
    }

    /// The process-wide registry.
    ///
    /// Falls back to (and freezes) the built-in registry when none was
    /// installed.
    pub fn global() -> &'static KindRegistry {
        GLOBAL.get_or_init(KindRegistry::builtin)
    }

    /// All known kinds: built-ins first, then caller kinds in registration
    /// order.
    pub fn kinds(&self) -> impl Iterator<Item = Kind> + '_ {
        Kind::BUILTIN
            .iter()
            .copied()
            .chain(self.custom.iter().map(|e| e.kind))
    }

    /// Looks up a kind by tag.
    pub fn lookup(&self, tag: &str) -> Option<Kind> {
        self.kinds().find(|k| k.as_str() == tag)
    }

    /// Returns `true` if the tag names a known kind.
    pub fn contains(&self, tag: &str) -> bool {
        self.lookup(tag).is_some()
    }

    fn custom_entry(&self, tag: &str) -> Option<&KindEntry> {
        self.custom.iter().find(|e| e.kind.as_str() == tag)
    }

    /// Encodes a value into its payload bytes and kind.
    pub fn encode(&self, value: &Value) -> Result<(Vec<u8>, Kind)> {
        if !self.contains(value.kind().as_str()) {
            warn!(
                "encoding {} value that this registry cannot decode",
                value.kind()
            );
        }
        value.encode()
    }

    /// Decodes payload bytes written for the kind `tag`.
    ///
    /// Fails with [`QueryError::UnknownKind`] for an unknown tag and
    /// [`QueryError::DecodingError`] when the bytes do not parse.
    pub fn decode(&self, bytes: &[u8], tag: &str) -> Result<Value> {
        if let Some(kind) = Kind::builtin(tag) {
            return decode_builtin(bytes, kind);
        }
        match self.custom_entry(tag) {
            Some(entry) => (entry.decode)(bytes),
            None => Err(QueryError::UnknownKind(tag.to_string())),
        }
    }

    /// Comparators valid for the kind `tag`.
    pub fn valid_comparators(&self, tag: &str) -> Result<&'static [Comparator]> {
        if let Some(comparators) = Kind::builtin(tag).and_then(Kind::builtin_comparators) {
            return Ok(comparators);
        }
        self.custom_entry(tag)
            .map(|e| (e.comparators)())
            .ok_or_else(|| QueryError::UnknownKind(tag.to_string()))
    }

    /// The value an editor for kind `tag` starts from.
    ///
    /// Uses `starting` when it has the requested kind, otherwise the kind's
    /// default (`false`, `0`, `0.0`, `""`, now, `Today`, or the custom
    /// type's `Default`).
    pub fn default_value(&self, tag: &str, starting: Option<&Value>) -> Result<Value> {
        if let Some(start) = starting.filter(|v| v.kind().as_str() == tag) {
            return Ok(start.clone());
        }
        let value = match Kind::builtin(tag) {
            Some(Kind::BOOL) => Value::Bool(false),
            Some(Kind::INT) => Value::Int(0),
            Some(Kind::DOUBLE) => Value::Double(0.0),
            Some(Kind::STRING) => Value::String(String::new()),
            Some(Kind::DATE) => Value::Date(Utc::now()),
            Some(_) => Value::RelativeDate(RelativeDate::default()),
            None => match self.custom_entry(tag) {
                Some(entry) => (entry.default)(),
                None => return Err(QueryError::UnknownKind(tag.to_string())),
            },
        };
        Ok(value)
    }
}

/// Builder collecting caller kinds before the registry is frozen.
#[derive(Debug, Default)]
pub struct KindRegistryBuilder {
    custom: Vec<KindEntry>,
}

impl KindRegistryBuilder {
    /// Adds a caller kind.
    ///
    /// A tag that is already known (built-in or registered earlier) is
    /// skipped with a warning; the earlier kind keeps resolving.
    pub fn register<T: CustomKind>(mut self) -> Self {
        let entry = KindEntry::of::<T>();
        let tag = entry.kind.as_str();
        if Kind::builtin(tag).is_some() || self.custom.iter().any(|e| e.kind == entry.kind) {
            warn!("kind '{tag}' is already registered, ignoring {}", std::any::type_name::<T>());
            return self;
        }
        self.custom.push(entry);
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> KindRegistry {
        KindRegistry {
            custom: self.custom,
        }
    }
}

fn decode_builtin(bytes: &[u8], kind: Kind) -> Result<Value> {
    let value = match kind {
        Kind::BOOL => Value::Bool(parse(bytes, kind)?),
        Kind::INT => Value::Int(parse(bytes, kind)?),
        Kind::DOUBLE => Value::Double(decode_double(bytes)?),
        Kind::STRING => Value::String(parse(bytes, kind)?),
        Kind::DATE => Value::Date(parse::<DateTime<Utc>>(bytes, kind)?),
        Kind::RELATIVE_DATE => Value::RelativeDate(parse(bytes, kind)?),
        other => return Err(QueryError::UnknownKind(other.as_str().to_string())),
    };
    Ok(value)
}

fn decode_custom<T: CustomKind>(bytes: &[u8]) -> Result<Value> {
    parse::<T>(bytes, Kind::of::<T>()).map(Value::custom)
}

fn parse<T: DeserializeOwned>(bytes: &[u8], kind: Kind) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| QueryError::decoding(kind.as_str(), e))
}

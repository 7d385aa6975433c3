//! Persistence form of query chains.
//!
//! A [`SerializedQueryNode`] mirrors a [`QueryNode`] chain but names fields
//! by display name instead of by field identifier, so stored filters survive
//! reordering or renumbering of an entity's fields as long as display names
//! stay the same.
//!
//! The encoded form is a JSON array with one object per node, in chain
//! order. `link` joins a node to the element after it and is absent on the
//! last one:
//!
//! ```text
//! [
//!   {
//!     "comparator": "greater than or equal to",
//!     "field_name": "Likes",
//!     "value": [49, 48, 48],
//!     "value_kind": "Int",
//!     "link": "and"
//!   },
//!   { "comparator": "equal to", "field_name": "Starred", ... }
//! ]
//! ```
//!
//! `value` holds the JSON payload of the compare value as raw bytes;
//! `value_kind` names the kind used to decode it. The flat layout keeps the
//! document depth constant however long the chain is.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::comparator::Comparator;
use crate::error::{QueryError, Result};
use crate::node::{Connector, QueryNode};
use crate::registry::KindRegistry;
use crate::traits::Queryable;
use crate::value::Value;

/// Entity-independent mirror of a query chain.
///
/// Fields are public so stored documents can be inspected and built by
/// hand. [`encode`](Self::encode) rejects a `link` without a
/// `linked_node`.
pub struct SerializedQueryNode {
    /// Comparator of this node.
    pub comparator: Comparator,
    /// Compare value of this node.
    pub compare_value: Value,
    /// Display name of the field this node reads.
    pub field_name: String,
    /// Connector to the linked node.
    pub link: Option<Connector>,
    /// Rest of the chain.
    pub linked_node: Option<Box<SerializedQueryNode>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireNode {
    comparator: Comparator,
    field_name: String,
    value: Vec<u8>,
    value_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link: Option<Connector>,
}

impl SerializedQueryNode {
    /// Number of nodes in the chain starting here.
    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    /// Always `false`: a chain has at least one node.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn nodes(&self) -> impl Iterator<Item = &SerializedQueryNode> {
        std::iter::successors(Some(self), |node| node.linked_node.as_deref())
    }

    /// Copy of this node without the rest of the chain.
    fn unlinked(&self) -> SerializedQueryNode {
        SerializedQueryNode {
            comparator: self.comparator,
            compare_value: self.compare_value.clone(),
            field_name: self.field_name.clone(),
            link: self.link,
            linked_node: None,
        }
    }

    /// Links `head` to `rest` in order.
    fn from_parts(
        mut head: SerializedQueryNode,
        rest: impl IntoIterator<Item = SerializedQueryNode>,
    ) -> SerializedQueryNode {
        let mut slot = &mut head.linked_node;
        for node in rest {
            slot = &mut slot.insert(Box::new(node)).linked_node;
        }
        head
    }

    /// Encodes the chain as a JSON document.
    ///
    /// Fails with [`QueryError::LinkWithoutLinkedNode`] when a node has a
    /// connector but nothing to connect to.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut wire = Vec::new();
        let mut node = self;
        loop {
            let (value, kind) = node.compare_value.encode()?;
            wire.push(WireNode {
                comparator: node.comparator,
                field_name: node.field_name.clone(),
                value,
                value_kind: kind.as_str().to_string(),
                link: node.link,
            });
            match (node.link, node.linked_node.as_deref()) {
                (Some(_), Some(next)) => node = next,
                (Some(_), None) => return Err(QueryError::LinkWithoutLinkedNode),
                (None, Some(_)) => {
                    warn!("dropping linked node without a connector from '{}'", node.field_name);
                    break;
                }
                (None, None) => break,
            }
        }
        Ok(serde_json::to_vec(&wire)?)
    }

    /// Decodes a document produced by [`encode`](Self::encode).
    ///
    /// Compare values are rebuilt through `registry`, so unknown kinds fail
    /// with [`QueryError::UnknownKind`] and malformed payloads with
    /// [`QueryError::DecodingError`]. A connector on the last node fails
    /// with [`QueryError::LinkWithoutLinkedNode`]; a missing connector
    /// before the last node, or an empty document, is a `DecodingError`.
    pub fn decode(bytes: &[u8], registry: &KindRegistry) -> Result<Self> {
        let wire: Vec<WireNode> = serde_json::from_slice(bytes)?;
        let last = wire
            .len()
            .checked_sub(1)
            .ok_or_else(|| QueryError::decoding("SerializedQueryNode", "empty chain"))?;

        let mut nodes = Vec::with_capacity(wire.len());
        for (index, wire) in wire.into_iter().enumerate() {
            match (wire.link, index == last) {
                (Some(_), true) => return Err(QueryError::LinkWithoutLinkedNode),
                (None, false) => {
                    return Err(QueryError::decoding(
                        "SerializedQueryNode",
                        format!("'{}' has a linked node but no connector", wire.field_name),
                    ))
                }
                _ => {}
            }
            nodes.push(SerializedQueryNode {
                comparator: wire.comparator,
                compare_value: registry.decode(&wire.value, &wire.value_kind)?,
                field_name: wire.field_name,
                link: wire.link,
                linked_node: None,
            });
        }

        let mut nodes = nodes.into_iter();
        let head = nodes
            .next()
            .ok_or_else(|| QueryError::decoding("SerializedQueryNode", "empty chain"))?;
        Ok(Self::from_parts(head, nodes))
    }

    /// Rebuilds a typed chain for entity `E`.
    ///
    /// Field names resolve through [`Queryable::field_for`]; a name that no
    /// longer exists fails with [`QueryError::UnknownFieldName`]. A linked
    /// node without a connector ends the chain.
    pub fn deserialize<E: Queryable>(&self) -> Result<QueryNode<E>> {
        let mut rest = Vec::new();
        let mut node = self;
        while let Some(connector) = node.link {
            let next = node
                .linked_node
                .as_deref()
                .ok_or(QueryError::LinkWithoutLinkedNode)?;
            rest.push((connector, next.typed_node::<E>()?));
            node = next;
        }
        Ok(QueryNode::from_parts(self.typed_node::<E>()?, rest))
    }

    fn typed_node<E: Queryable>(&self) -> Result<QueryNode<E>> {
        let field = E::field_for(&self.field_name)?;
        Ok(QueryNode::new(self.comparator, self.compare_value.clone(), field))
    }
}

// Clone, PartialEq, Debug and Drop walk the chain in a loop so long chains
// do not exhaust the stack.

impl Clone for SerializedQueryNode {
    fn clone(&self) -> Self {
        Self::from_parts(self.unlinked(), self.nodes().skip(1).map(Self::unlinked))
    }
}

impl PartialEq for SerializedQueryNode {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.nodes().zip(other.nodes()).all(|(a, b)| {
                a.comparator == b.comparator
                    && a.compare_value == b.compare_value
                    && a.field_name == b.field_name
                    && a.link == b.link
            })
    }
}

impl fmt::Debug for SerializedQueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes().map(NodeDebug)).finish()
    }
}

struct NodeDebug<'a>(&'a SerializedQueryNode);

impl fmt::Debug for NodeDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializedQueryNode")
            .field("comparator", &self.0.comparator)
            .field("compare_value", &self.0.compare_value)
            .field("field_name", &self.0.field_name)
            .field("link", &self.0.link)
            .finish()
    }
}

impl Drop for SerializedQueryNode {
    fn drop(&mut self) {
        let mut next = self.linked_node.take();
        while let Some(mut node) = next {
            next = node.linked_node.take();
        }
    }
}

impl<E: Queryable> From<&QueryNode<E>> for SerializedQueryNode {
    fn from(node: &QueryNode<E>) -> Self {
        node.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind;

    struct Song {
        plays: i64,
        title: String,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum SongField {
        Plays,
        Title,
    }

    impl Queryable for Song {
        type Field = SongField;

        const ENTITY: &'static str = "Song";

        fn fields() -> &'static [(SongField, Kind)] {
            &[(SongField::Plays, Kind::INT), (SongField::Title, Kind::STRING)]
        }

        fn display_name(field: SongField) -> &'static str {
            match field {
                SongField::Plays => "Plays",
                SongField::Title => "Title",
            }
        }

        fn field_value(&self, field: SongField) -> Option<Value> {
            match field {
                SongField::Plays => Some(Value::Int(self.plays)),
                SongField::Title => Some(Value::from(self.title.as_str())),
            }
        }
    }

    fn leaf(field_name: &str, value: Value) -> SerializedQueryNode {
        SerializedQueryNode {
            comparator: Comparator::Equal,
            compare_value: value,
            field_name: field_name.to_string(),
            link: None,
            linked_node: None,
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut node = QueryNode::<Song>::new(Comparator::Greater, 10, SongField::Plays);
        node.append(SongField::Title, "Intro", Comparator::NotEqual, Connector::And)
            .append(SongField::Plays, 0, Comparator::Equal, Connector::Or);

        let serialized = node.serialize();
        let bytes = serialized.encode().unwrap();
        let decoded = SerializedQueryNode::decode(&bytes, &KindRegistry::builtin()).unwrap();
        assert_eq!(decoded, serialized);
        assert_eq!(decoded.len(), 3);

        let rebuilt = decoded.deserialize::<Song>().unwrap();
        assert_eq!(rebuilt, node);
    }

    #[test]
    fn encoded_document_layout() {
        let node = QueryNode::<Song>::new(Comparator::GreaterOrEqual, 100, SongField::Plays);
        let bytes = node.serialize().encode().unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc.as_array().map(Vec::len), Some(1));
        assert_eq!(doc[0]["comparator"], "greater than or equal to");
        assert_eq!(doc[0]["field_name"], "Plays");
        assert_eq!(doc[0]["value_kind"], "Int");
        assert_eq!(doc[0]["value"], serde_json::json!([49, 48, 48]));
        assert!(doc[0].get("link").is_none());
    }

    #[test]
    fn linked_nodes_are_array_elements() {
        let mut node = QueryNode::<Song>::new(Comparator::Less, 3, SongField::Plays);
        node.append(SongField::Title, "Outro", Comparator::Equal, Connector::Or);
        let bytes = node.serialize().encode().unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc[0]["link"], "or");
        assert_eq!(doc[1]["field_name"], "Title");
        assert!(doc[1].get("link").is_none());
    }

    #[test]
    fn long_chain_round_trip() {
        let mut node = QueryNode::<Song>::new(Comparator::Greater, 0, SongField::Plays);
        for i in 1..250 {
            node.append(SongField::Plays, i, Comparator::NotEqual, Connector::And);
        }
        let bytes = node.serialize().encode().unwrap();
        let decoded = SerializedQueryNode::decode(&bytes, &KindRegistry::builtin()).unwrap();
        assert_eq!(decoded.len(), 250);
        assert_eq!(decoded.deserialize::<Song>().unwrap(), node);
    }

    #[test]
    fn encode_rejects_link_without_node() {
        let mut node = leaf("Plays", Value::Int(1));
        node.link = Some(Connector::And);
        assert!(matches!(
            node.encode(),
            Err(QueryError::LinkWithoutLinkedNode)
        ));
    }

    #[test]
    fn decode_rejects_link_without_node() {
        let doc = br#"[{"comparator":"equal to","field_name":"Plays","value":[49],"value_kind":"Int","link":"or"}]"#;
        let err = SerializedQueryNode::decode(doc, &KindRegistry::builtin()).unwrap_err();
        assert!(matches!(err, QueryError::LinkWithoutLinkedNode));
    }

    #[test]
    fn decode_rejects_empty_chain() {
        let err = SerializedQueryNode::decode(b"[]", &KindRegistry::builtin()).unwrap_err();
        assert!(matches!(err, QueryError::DecodingError { .. }));
    }

    #[test]
    fn decode_rejects_node_without_link() {
        let node = r#"{"comparator":"equal to","field_name":"Plays","value":[49],"value_kind":"Int"}"#;
        let doc = format!("[{node},{node}]");
        let err = SerializedQueryNode::decode(doc.as_bytes(), &KindRegistry::builtin()).unwrap_err();
        assert!(matches!(err, QueryError::DecodingError { .. }));
    }

    #[test]
    fn decode_unknown_kind() {
        let doc = br#"[{"comparator":"equal to","field_name":"Plays","value":[49],"value_kind":"Decimal"}]"#;
        let err = SerializedQueryNode::decode(doc, &KindRegistry::builtin()).unwrap_err();
        assert!(matches!(err, QueryError::UnknownKind(kind) if kind == "Decimal"));
    }

    #[test]
    fn decode_bad_payload() {
        // "x" is not an Int payload.
        let doc = br#"[{"comparator":"equal to","field_name":"Plays","value":[34,120,34],"value_kind":"Int"}]"#;
        let err = SerializedQueryNode::decode(doc, &KindRegistry::builtin()).unwrap_err();
        assert!(matches!(err, QueryError::DecodingError { .. }));
    }

    #[test]
    fn decode_malformed_document() {
        let err = SerializedQueryNode::decode(b"{", &KindRegistry::builtin()).unwrap_err();
        assert!(matches!(err, QueryError::Json(_)));
    }

    #[test]
    fn deserialize_unknown_field_name() {
        let node = leaf("Duration", Value::Int(1));
        let err = node.deserialize::<Song>().unwrap_err();
        assert!(matches!(err, QueryError::UnknownFieldName(name) if name == "Duration"));
    }

    #[test]
    fn deserialize_unknown_name_deep_in_chain() {
        let mut node = leaf("Plays", Value::Int(1));
        node.link = Some(Connector::Or);
        node.linked_node = Some(Box::new(leaf("Artist", Value::from("x"))));
        assert!(matches!(
            node.deserialize::<Song>(),
            Err(QueryError::UnknownFieldName(_))
        ));
    }

    #[test]
    fn deserialize_link_without_node() {
        let mut node = leaf("Plays", Value::Int(1));
        node.link = Some(Connector::And);
        assert!(matches!(
            node.deserialize::<Song>(),
            Err(QueryError::LinkWithoutLinkedNode)
        ));
    }
}

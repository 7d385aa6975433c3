//! Query chains.
//!
//! A [`QueryNode`] holds one comparison and optionally a [`Link`] to the next
//! node, tagged with a [`Connector`]. Chains are linear: appending always
//! attaches at the tail, and evaluation reads the chain in construction
//! order as `n1 OP1 (n2 OP2 (n3 ...))`.

use std::any::Any;
use std::fmt;

use log::error;
use serde::{Deserialize, Serialize};

use crate::comparator::Comparator;
use crate::serialized::SerializedQueryNode;
use crate::traits::Queryable;
use crate::value::Value;

/// Logical connector joining a node to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    /// Both sides must match.
    And,
    /// At least one side must match.
    Or,
}

impl Connector {
    /// Returns the other connector.
    pub fn toggled(self) -> Connector {
        match self {
            Connector::And => Connector::Or,
            Connector::Or => Connector::And,
        }
    }

    /// Combines the result of a node with the result of the rest of its chain.
    pub fn combine(self, this: bool, rest: bool) -> bool {
        match self {
            Connector::And => this && rest,
            Connector::Or => this || rest,
        }
    }

    /// Returns the display name of this connector.
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::Or => "or",
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Forward link from a node to the rest of its chain.
pub struct Link<E: Queryable> {
    connector: Connector,
    next: Box<QueryNode<E>>,
}

impl<E: Queryable> Link<E> {
    /// The connector joining the two nodes.
    pub fn connector(&self) -> Connector {
        self.connector
    }

    /// The next node.
    pub fn next(&self) -> &QueryNode<E> {
        &self.next
    }
}

impl<E: Queryable> Clone for Link<E> {
    fn clone(&self) -> Self {
        Link {
            connector: self.connector,
            next: self.next.clone(),
        }
    }
}

impl<E: Queryable> PartialEq for Link<E> {
    fn eq(&self, other: &Self) -> bool {
        self.connector == other.connector && *self.next == *other.next
    }
}

impl<E: Queryable> fmt::Debug for Link<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("connector", &self.connector)
            .field("next", &self.next)
            .finish()
    }
}

/// One comparison in a chain of predicates over `E`.
///
/// # Example
///
/// ```
/// use querychain::{Comparator, Connector, Kind, QueryNode, Queryable, Value};
///
/// struct Article {
///     likes: i64,
///     starred: bool,
/// }
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Field {
///     Likes,
///     Starred,
/// }
///
/// impl Queryable for Article {
///     type Field = Field;
///     const ENTITY: &'static str = "Article";
///
///     fn fields() -> &'static [(Field, Kind)] {
///         &[(Field::Likes, Kind::INT), (Field::Starred, Kind::BOOL)]
///     }
///
///     fn display_name(field: Field) -> &'static str {
///         match field {
///             Field::Likes => "Likes",
///             Field::Starred => "Starred",
///         }
///     }
///
///     fn field_value(&self, field: Field) -> Option<Value> {
///         match field {
///             Field::Likes => Some(Value::Int(self.likes)),
///             Field::Starred => Some(Value::Bool(self.starred)),
///         }
///     }
/// }
///
/// let mut chain = QueryNode::<Article>::new(Comparator::GreaterOrEqual, 100, Field::Likes);
/// chain.append(Field::Starred, true, Comparator::Equal, Connector::And);
///
/// let articles = vec![
///     Article { likes: 100, starred: false },
///     Article { likes: 100, starred: true },
/// ];
///
/// let matches = chain.filter(&articles);
/// assert_eq!(matches.len(), 1);
/// assert!(matches[0].starred);
/// ```
pub struct QueryNode<E: Queryable> {
    comparator: Comparator,
    compare_value: Value,
    field: E::Field,
    link: Option<Link<E>>,
}

impl<E: Queryable> QueryNode<E> {
    /// Creates a single unlinked node.
    pub fn new(comparator: Comparator, compare_value: impl Into<Value>, field: E::Field) -> Self {
        QueryNode {
            comparator,
            compare_value: compare_value.into(),
            field,
            link: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The comparator of this node.
    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    /// The value candidates are compared against.
    pub fn compare_value(&self) -> &Value {
        &self.compare_value
    }

    /// The field this node reads.
    pub fn field(&self) -> E::Field {
        self.field
    }

    /// The link to the rest of the chain, if any.
    pub fn link(&self) -> Option<&Link<E>> {
        self.link.as_ref()
    }

    /// Number of nodes in the chain starting here.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Always `false`: a chain has at least one node.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the nodes of the chain in construction order.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter { next: Some(self) }
    }

    /// Connectors of the chain in construction order.
    pub fn connectors(&self) -> Vec<Connector> {
        self.iter().filter_map(|node| node.connector()).collect()
    }

    /// The last node of the chain.
    pub fn tail(&self) -> &QueryNode<E> {
        self.iter().last().unwrap_or(self)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Builds a node and attaches it at the tail of the chain.
    pub fn append(
        &mut self,
        field: E::Field,
        compare_value: impl Into<Value>,
        comparator: Comparator,
        connector: Connector,
    ) -> &mut Self {
        self.append_chain(connector, QueryNode::new(comparator, compare_value, field))
    }

    /// Attaches a whole chain at the tail, keeping its own links.
    pub fn append_chain(&mut self, connector: Connector, chain: QueryNode<E>) -> &mut Self {
        self.attach(Link {
            connector,
            next: Box::new(chain),
        });
        self
    }

    fn attach(&mut self, link: Link<E>) {
        let mut slot = &mut self.link;
        while let Some(existing) = slot {
            slot = &mut existing.next.link;
        }
        *slot = Some(link);
    }

    /// Links `head` to `rest` in order. Nodes in `rest` are expected to be
    /// unlinked.
    pub(crate) fn from_parts(
        mut head: QueryNode<E>,
        rest: impl IntoIterator<Item = (Connector, QueryNode<E>)>,
    ) -> Self {
        let mut slot = &mut head.link;
        for (connector, node) in rest {
            let link = slot.insert(Link {
                connector,
                next: Box::new(node),
            });
            slot = &mut link.next.link;
        }
        head
    }

    /// Copy of this node without its link.
    fn unlinked(&self) -> Self {
        QueryNode {
            comparator: self.comparator,
            compare_value: self.compare_value.clone(),
            field: self.field,
            link: None,
        }
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Tests a candidate against the chain.
    ///
    /// Every node is visited on every call; a node whose field is missing or
    /// of the wrong kind is logged and makes its part of the chain `false`.
    pub fn evaluate(&self, candidate: &E) -> bool {
        let steps: Vec<(Option<bool>, Option<Connector>)> = self
            .iter()
            .map(|node| {
                let connector = node.connector();
                (node.evaluate_node(candidate), connector)
            })
            .collect();

        // Fold from the tail so `n1 OP1 (n2 OP2 (...))` groups to the right.
        let mut rest: Option<bool> = None;
        for (this, connector) in steps.into_iter().rev() {
            rest = Some(match (this, connector.zip(rest)) {
                (None, _) => false,
                (Some(this), None) => this,
                (Some(this), Some((connector, rest))) => connector.combine(this, rest),
            });
        }
        rest.unwrap_or(false)
    }

    /// Tests a candidate of unknown type.
    ///
    /// Candidates that are not an `E` never match.
    pub fn evaluate_any(&self, candidate: &dyn Any) -> bool {
        match candidate.downcast_ref::<E>() {
            Some(candidate) => self.evaluate(candidate),
            None => {
                error!("candidate is not a {}, returning false", E::ENTITY);
                false
            }
        }
    }

    fn evaluate_node(&self, candidate: &E) -> Option<bool> {
        let Some(field_value) = candidate.field_value(self.field) else {
            error!(
                "{} has no value for {}, returning false",
                E::ENTITY,
                E::display_name(self.field)
            );
            return None;
        };
        let expected = self.compare_value.kind();
        if !field_value.kind().accepts(expected) {
            error!(
                "{}.{} is a {} value but the filter compares against {}, returning false",
                E::ENTITY,
                E::display_name(self.field),
                field_value.kind(),
                expected
            );
            return None;
        }
        Some(field_value.evaluate(self.comparator, &self.compare_value))
    }

    /// Returns `true` if `other` has the same length, comparators, fields,
    /// compare-value kinds and connectors. Compare values are ignored.
    pub fn same_shape(&self, other: &QueryNode<E>) -> bool {
        self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| {
                a.comparator == b.comparator
                    && a.field == b.field
                    && a.compare_value.kind() == b.compare_value.kind()
                    && a.connector() == b.connector()
            })
    }

    fn connector(&self) -> Option<Connector> {
        self.link.as_ref().map(|link| link.connector)
    }

    /// Converts the chain into its persistence form.
    pub fn serialize(&self) -> SerializedQueryNode {
        let mut head = self.serialize_node();
        let mut slot = &mut head.linked_node;
        for node in self.iter().skip(1) {
            slot = &mut slot.insert(Box::new(node.serialize_node())).linked_node;
        }
        head
    }

    fn serialize_node(&self) -> SerializedQueryNode {
        SerializedQueryNode {
            comparator: self.comparator,
            compare_value: self.compare_value.clone(),
            field_name: E::display_name(self.field).to_string(),
            link: self.connector(),
            linked_node: None,
        }
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Filters a slice, returning references to matching items in order.
    pub fn filter<'a>(&self, items: &'a [E]) -> Vec<&'a E> {
        items.iter().filter(|item| self.evaluate(item)).collect()
    }

    /// Filters and clones matching items.
    pub fn filter_cloned(&self, items: &[E]) -> Vec<E>
    where
        E: Clone,
    {
        self.filter(items).into_iter().cloned().collect()
    }

    /// Filters a vector in place, keeping only matching items.
    pub fn filter_mut(&self, items: &mut Vec<E>) {
        items.retain(|item| self.evaluate(item));
    }

    /// Counts the number of matching items.
    pub fn count(&self, items: &[E]) -> usize {
        items.iter().filter(|item| self.evaluate(item)).count()
    }

    /// Returns `true` if any item matches.
    pub fn any(&self, items: &[E]) -> bool {
        items.iter().any(|item| self.evaluate(item))
    }

    /// Returns `true` if all items match.
    pub fn all(&self, items: &[E]) -> bool {
        items.iter().all(|item| self.evaluate(item))
    }

    /// Finds the first matching item.
    pub fn find<'a>(&self, items: &'a [E]) -> Option<&'a E> {
        items.iter().find(|item| self.evaluate(item))
    }

    /// Finds the first matching item and returns its index.
    pub fn position(&self, items: &[E]) -> Option<usize> {
        items.iter().position(|item| self.evaluate(item))
    }
}

// Clone, PartialEq, Debug and Drop walk the chain in a loop so long chains
// do not exhaust the stack.

impl<E: Queryable> Clone for QueryNode<E> {
    fn clone(&self) -> Self {
        let rest = self
            .iter()
            .filter_map(|node| node.link.as_ref())
            .map(|link| (link.connector, link.next.unlinked()));
        QueryNode::from_parts(self.unlinked(), rest)
    }
}

impl<E: Queryable> PartialEq for QueryNode<E> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| {
                a.comparator == b.comparator
                    && a.field == b.field
                    && a.compare_value == b.compare_value
                    && a.connector() == b.connector()
            })
    }
}

impl<E: Queryable> fmt::Debug for QueryNode<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(NodeDebug)).finish()
    }
}

struct NodeDebug<'a, E: Queryable>(&'a QueryNode<E>);

impl<E: Queryable> fmt::Debug for NodeDebug<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryNode")
            .field("comparator", &self.0.comparator)
            .field("compare_value", &self.0.compare_value)
            .field("field", &self.0.field)
            .field("connector", &self.0.connector())
            .finish()
    }
}

impl<E: Queryable> Drop for QueryNode<E> {
    fn drop(&mut self) {
        let mut next = self.link.take();
        while let Some(mut link) = next {
            next = link.next.link.take();
        }
    }
}

impl<'a, E: Queryable> IntoIterator for &'a QueryNode<E> {
    type Item = &'a QueryNode<E>;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the nodes of a chain.
pub struct Iter<'a, E: Queryable> {
    next: Option<&'a QueryNode<E>>,
}

impl<'a, E: Queryable> Iterator for Iter<'a, E> {
    type Item = &'a QueryNode<E>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.link.as_ref().map(|link| link.next.as_ref());
        Some(node)
    }
}

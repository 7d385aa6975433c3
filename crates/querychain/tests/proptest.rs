//! Property-based tests for querychain using proptest.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use querychain::{
    Comparator, Connector, FilterStore, Kind, KindRegistry, MemoryStore, QueryError, QueryNode,
    Queryable, SerializedQueryNode, Value,
};

// ============================================================================
// Test helpers
// ============================================================================

#[derive(Debug, Clone)]
struct Reading {
    a: i64,
    b: i64,
    label: String,
    flag: bool,
    taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadingField {
    A,
    B,
    Label,
    Flag,
    TakenAt,
}

impl Queryable for Reading {
    type Field = ReadingField;

    const ENTITY: &'static str = "Reading";

    fn fields() -> &'static [(ReadingField, Kind)] {
        &[
            (ReadingField::A, Kind::INT),
            (ReadingField::B, Kind::INT),
            (ReadingField::Label, Kind::STRING),
            (ReadingField::Flag, Kind::BOOL),
            (ReadingField::TakenAt, Kind::DATE),
        ]
    }

    fn display_name(field: ReadingField) -> &'static str {
        match field {
            ReadingField::A => "A",
            ReadingField::B => "B",
            ReadingField::Label => "Label",
            ReadingField::Flag => "Flag",
            ReadingField::TakenAt => "Taken at",
        }
    }

    fn field_value(&self, field: ReadingField) -> Option<Value> {
        match field {
            ReadingField::A => Some(Value::Int(self.a)),
            ReadingField::B => Some(Value::Int(self.b)),
            ReadingField::Label => Some(Value::String(self.label.clone())),
            ReadingField::Flag => Some(Value::Bool(self.flag)),
            ReadingField::TakenAt => Some(Value::Date(self.taken_at)),
        }
    }
}

/// A single condition before it is linked into a chain.
#[derive(Debug, Clone)]
struct Condition {
    field: ReadingField,
    comparator: Comparator,
    value: Value,
}

impl Condition {
    fn node(&self) -> QueryNode<Reading> {
        QueryNode::new(self.comparator, self.value.clone(), self.field)
    }
}

fn date(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn comparator_strategy() -> impl Strategy<Value = Comparator> {
    prop::sample::select(Comparator::ALL.to_vec())
}

fn connector_strategy() -> impl Strategy<Value = Connector> {
    prop_oneof![Just(Connector::And), Just(Connector::Or)]
}

fn int_condition_strategy() -> impl Strategy<Value = Condition> {
    (
        prop_oneof![Just(ReadingField::A), Just(ReadingField::B)],
        comparator_strategy(),
        -20i64..20,
    )
        .prop_map(|(field, comparator, threshold)| Condition {
            field,
            comparator,
            value: Value::Int(threshold),
        })
}

fn any_condition_strategy() -> impl Strategy<Value = Condition> {
    prop_oneof![
        int_condition_strategy(),
        (comparator_strategy(), "[a-z]{0,8}").prop_map(|(comparator, label)| Condition {
            field: ReadingField::Label,
            comparator,
            value: Value::String(label),
        }),
        (comparator_strategy(), any::<bool>()).prop_map(|(comparator, flag)| Condition {
            field: ReadingField::Flag,
            comparator,
            value: Value::Bool(flag),
        }),
        (comparator_strategy(), 0i64..2_000_000_000).prop_map(|(comparator, secs)| Condition {
            field: ReadingField::TakenAt,
            comparator,
            value: Value::Date(date(secs)),
        }),
    ]
}

fn reading_strategy() -> impl Strategy<Value = Reading> {
    (
        -25i64..25,
        -25i64..25,
        "[a-z]{0,8}",
        any::<bool>(),
        0i64..2_000_000_000,
    )
        .prop_map(|(a, b, label, flag, secs)| Reading {
            a,
            b,
            label,
            flag,
            taken_at: date(secs),
        })
}

fn build_chain(first: &Condition, rest: &[(Connector, Condition)]) -> QueryNode<Reading> {
    let mut chain = first.node();
    for (connector, condition) in rest {
        chain.append(
            condition.field,
            condition.value.clone(),
            condition.comparator,
            *connector,
        );
    }
    chain
}

/// Evaluates node-by-node with right-nested grouping:
/// `c0 op0 (c1 op1 (c2 ...))`.
fn right_nested(reading: &Reading, first: &Condition, rest: &[(Connector, Condition)]) -> bool {
    let mut results = vec![first.node().evaluate(reading)];
    results.extend(rest.iter().map(|(_, c)| c.node().evaluate(reading)));

    let mut acc = results[results.len() - 1];
    for i in (0..rest.len()).rev() {
        acc = rest[i].0.combine(results[i], acc);
    }
    acc
}

fn round_trip(chain: &QueryNode<Reading>) -> QueryNode<Reading> {
    let bytes = chain.serialize().encode().unwrap();
    SerializedQueryNode::decode(&bytes, &KindRegistry::builtin())
        .unwrap()
        .deserialize::<Reading>()
        .unwrap()
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// An all-AND chain matches exactly when every condition matches.
    #[test]
    fn and_chain_is_conjunction(
        first in int_condition_strategy(),
        rest in prop::collection::vec(int_condition_strategy(), 0..6),
        reading in reading_strategy(),
    ) {
        let linked: Vec<_> = rest.iter().cloned().map(|c| (Connector::And, c)).collect();
        let chain = build_chain(&first, &linked);

        let expected = first.node().evaluate(&reading)
            && rest.iter().all(|c| c.node().evaluate(&reading));
        prop_assert_eq!(chain.evaluate(&reading), expected);
    }

    /// An all-OR chain matches when any condition matches.
    #[test]
    fn or_chain_is_disjunction(
        first in int_condition_strategy(),
        rest in prop::collection::vec(int_condition_strategy(), 0..6),
        reading in reading_strategy(),
    ) {
        let linked: Vec<_> = rest.iter().cloned().map(|c| (Connector::Or, c)).collect();
        let chain = build_chain(&first, &linked);

        let expected = first.node().evaluate(&reading)
            || rest.iter().any(|c| c.node().evaluate(&reading));
        prop_assert_eq!(chain.evaluate(&reading), expected);
    }

    /// Mixed chains group to the right.
    #[test]
    fn mixed_chain_groups_right(
        first in any_condition_strategy(),
        rest in prop::collection::vec((connector_strategy(), any_condition_strategy()), 0..6),
        reading in reading_strategy(),
    ) {
        let chain = build_chain(&first, &rest);
        prop_assert_eq!(chain.len(), rest.len() + 1);
        prop_assert_eq!(chain.evaluate(&reading), right_nested(&reading, &first, &rest));
    }

    /// Filter never returns more items than the input, and agrees with count.
    #[test]
    fn filter_agrees_with_count(
        first in any_condition_strategy(),
        rest in prop::collection::vec((connector_strategy(), any_condition_strategy()), 0..4),
        readings in prop::collection::vec(reading_strategy(), 0..30),
    ) {
        let chain = build_chain(&first, &rest);
        let filtered = chain.filter(&readings);
        prop_assert!(filtered.len() <= readings.len());
        prop_assert_eq!(filtered.len(), chain.count(&readings));
    }

    /// Persisting a chain and reading it back preserves length, structure and results.
    #[test]
    fn persisted_chain_round_trips(
        first in any_condition_strategy(),
        rest in prop::collection::vec((connector_strategy(), any_condition_strategy()), 0..8),
        readings in prop::collection::vec(reading_strategy(), 0..20),
    ) {
        let chain = build_chain(&first, &rest);
        let restored = round_trip(&chain);

        prop_assert_eq!(restored.len(), chain.len());
        prop_assert!(restored.same_shape(&chain));
        prop_assert_eq!(&restored, &chain);
        prop_assert_eq!(restored.connectors(), chain.connectors());
        for reading in &readings {
            prop_assert_eq!(restored.evaluate(reading), chain.evaluate(reading));
        }
    }

    /// Saving under a taken name fails and leaves the stored chain alone.
    #[test]
    fn duplicate_save_keeps_original(
        original in any_condition_strategy(),
        replacement in any_condition_strategy(),
        name in "[A-Za-z ]{1,12}",
    ) {
        let mut store = FilterStore::new(MemoryStore::new(), KindRegistry::builtin());
        store.save(&original.node(), &name).unwrap();

        let result = store.save(&replacement.node(), &name);
        prop_assert!(matches!(result, Err(QueryError::DuplicateName(_))));
        prop_assert_eq!(store.load::<Reading>(&name).unwrap(), original.node());
        prop_assert_eq!(store.names::<Reading>().unwrap(), vec![name]);
    }

    /// Removing a name that was never saved changes nothing.
    #[test]
    fn removing_missing_name_is_noop(
        saved in prop::collection::btree_set("[a-z]{1,6}", 0..5),
        missing in "[A-Z]{1,6}",
    ) {
        let mut store = FilterStore::new(MemoryStore::new(), KindRegistry::builtin());
        let chain = QueryNode::<Reading>::new(Comparator::Equal, true, ReadingField::Flag);
        for name in &saved {
            store.save(&chain, name).unwrap();
        }
        let before = store.names::<Reading>().unwrap();

        store.remove::<Reading>(&missing).unwrap();
        prop_assert_eq!(store.names::<Reading>().unwrap(), before);
    }
}

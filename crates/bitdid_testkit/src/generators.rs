//! Property-based test generators using proptest.
//!
//! Provides strategies for generating market-data records and sequences of
//! unit-of-work operations.

use bitdid_core::{Currency, Tag};
use proptest::prelude::*;

/// Strategy for generating entity IDs from a small range, so generated
/// operations collide on identity often.
pub fn entity_id_strategy() -> impl Strategy<Value = i64> {
    1i64..16
}

/// Strategy for generating display names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,15}").expect("Invalid regex")
}

/// Strategy for generating currencies.
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    (
        entity_id_strategy(),
        name_strategy(),
        prop::string::string_regex("[A-Z]{2,5}").expect("Invalid regex"),
        prop::option::of(1u32..5000),
        any::<bool>(),
    )
        .prop_map(|(id, name, symbol, rank, is_active)| {
            let mut currency = Currency::new(id, name, symbol);
            currency.rank = rank;
            currency.is_active = is_active;
            currency
        })
}

/// Strategy for generating tags.
pub fn tag_strategy() -> impl Strategy<Value = Tag> {
    (entity_id_strategy(), name_strategy()).prop_map(|(id, name)| Tag::new(id, name))
}

/// An operation applied to a session holding tags.
#[derive(Debug, Clone)]
pub enum TagOp {
    /// Add a new tag.
    Add(Tag),
    /// Rename the tracked tag with this ID in place.
    Rename(i64, String),
    /// Remove the tracked tag with this ID.
    Remove(i64),
    /// Force the tracked tag with this ID to Modified.
    MarkChanged(i64),
    /// Persist.
    Persist,
}

/// Strategy for generating a single tag operation.
pub fn tag_op_strategy() -> impl Strategy<Value = TagOp> {
    prop_oneof![
        3 => tag_strategy().prop_map(TagOp::Add),
        2 => (entity_id_strategy(), name_strategy()).prop_map(|(id, name)| TagOp::Rename(id, name)),
        1 => entity_id_strategy().prop_map(TagOp::Remove),
        1 => entity_id_strategy().prop_map(TagOp::MarkChanged),
        1 => Just(TagOp::Persist),
    ]
}

/// Strategy for generating a sequence of tag operations.
pub fn tag_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<TagOp>> {
    prop::collection::vec(tag_op_strategy(), 1..max_len)
}

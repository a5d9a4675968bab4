//! UTxO set model.
//!
//! Matches the JSON shape produced by the ledger CLI's UTxO query and by the
//! head node's snapshot endpoint: a map keyed `"<txhash>#<index>"` with
//! `{address, value: {lovelace, assets?}}` entries. A fetched set is
//! immutable; the next query supersedes it wholesale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value locked in one output: ada in lovelace plus opaque native assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtxoValue {
    #[serde(default)]
    pub lovelace: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub address: String,
    pub value: UtxoValue,
}

/// Keyed by `"<txhash>#<index>"`. A `BTreeMap` keeps iteration (and thus
/// first-fit selection) deterministic.
pub type UtxoSet = BTreeMap<String, UtxoEntry>;

/// Sum of lovelace across the set.
pub fn total_lovelace(set: &UtxoSet) -> u64 {
    set.values().map(|e| e.value.lovelace).sum()
}

/// Entries held by `address`.
pub fn filter_by_address(set: &UtxoSet, address: &str) -> UtxoSet {
    set.iter()
        .filter(|(_, e)| e.address == address)
        .map(|(k, e)| (k.clone(), e.clone()))
        .collect()
}

/// First entry whose lovelace covers `amount` (first-fit, not best-fit —
/// there is no multi-input coin selection here).
pub fn first_covering(set: &UtxoSet, amount: u64) -> Option<(&String, &UtxoEntry)> {
    set.iter().find(|(_, e)| e.value.lovelace >= amount)
}

/// Largest single balance in the set, 0 when empty.
pub fn largest_lovelace(set: &UtxoSet) -> u64 {
    set.values().map(|e| e.value.lovelace).max().unwrap_or(0)
}

/// Split a `"<txhash>#<index>"` key into its parts.
pub fn split_key(key: &str) -> Option<(&str, u32)> {
    let (hash, index) = key.rsplit_once('#')?;
    Some((hash, index.parse().ok()?))
}

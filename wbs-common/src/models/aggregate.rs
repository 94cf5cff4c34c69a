//! Per-item rollups of scanned boxes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{InvoiceItem, ScanEntry};
use crate::matching::{match_item, unmatched_key};

const UNMATCHED_PREFIX: &str = "unmatched:";

/// Key of a `scannedItems` bucket
///
/// Serialized as the decimal item index, or `unmatched:<normalized name>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ItemKey {
    /// Invoice line, by `itemIndex`
    Matched(u32),
    /// Product read off a label that is not on the invoice
    Unmatched(String),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Matched(index) => write!(f, "{}", index),
            ItemKey::Unmatched(name) => write!(f, "{}{}", UNMATCHED_PREFIX, name),
        }
    }
}

impl From<ItemKey> for String {
    fn from(key: ItemKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ItemKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if let Some(name) = value.strip_prefix(UNMATCHED_PREFIX) {
            return Ok(ItemKey::Unmatched(name.to_string()));
        }
        value
            .parse::<u32>()
            .map(ItemKey::Matched)
            .map_err(|_| format!("invalid item key: {:?}", value))
    }
}

/// Rollup of the boxes attributed to one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAggregate {
    pub item_index: Option<u32>,
    pub item_name: String,
    pub scanned_count: u32,
    pub scanned_weight: f64,
    pub expected_weight: f64,
    pub expected_boxes: u32,
}

/// What a single entry adds to the rollup
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub key: ItemKey,
    pub item_name: String,
    pub weight: f64,
}

/// Attribute `entry` to an invoice item or an unmatched bucket
///
/// Entries without an effective name (pending, failed, or complete with no
/// product name) contribute nothing. An unknown weight counts as zero.
pub fn contribution_of(entry: &ScanEntry, invoice: &[InvoiceItem]) -> Option<Contribution> {
    let weight = entry.effective_weight().unwrap_or(0.0);

    if let Some(item) = entry
        .explicit_item_index()
        .and_then(|index| invoice.iter().find(|item| item.item_index == index))
    {
        return Some(Contribution {
            key: ItemKey::Matched(item.item_index),
            item_name: item.display_name().to_string(),
            weight,
        });
    }

    let name = entry.effective_name()?;
    Some(match match_item(name, invoice) {
        Some(hit) => Contribution {
            key: ItemKey::Matched(hit.item.item_index),
            item_name: hit.item.display_name().to_string(),
            weight,
        },
        None => Contribution {
            key: ItemKey::Unmatched(unmatched_key(name)),
            item_name: name.to_string(),
            weight,
        },
    })
}

/// Fold every entry's contribution into `scannedItems` buckets
pub fn aggregate_entries(
    entries: &[ScanEntry],
    invoice: &[InvoiceItem],
) -> BTreeMap<ItemKey, ItemAggregate> {
    let mut buckets: BTreeMap<ItemKey, ItemAggregate> = BTreeMap::new();

    for contribution in entries.iter().filter_map(|e| contribution_of(e, invoice)) {
        let bucket = buckets
            .entry(contribution.key.clone())
            .or_insert_with(|| empty_bucket(&contribution, invoice));
        bucket.scanned_count = bucket.scanned_count.saturating_add(1);
        bucket.scanned_weight += contribution.weight;
    }

    buckets
}

fn empty_bucket(contribution: &Contribution, invoice: &[InvoiceItem]) -> ItemAggregate {
    let item = match contribution.key {
        ItemKey::Matched(index) => invoice.iter().find(|item| item.item_index == index),
        ItemKey::Unmatched(_) => None,
    };
    ItemAggregate {
        item_index: item.map(|i| i.item_index),
        item_name: contribution.item_name.clone(),
        scanned_count: 0,
        scanned_weight: 0.0,
        expected_weight: item.map_or(0.0, |i| i.quantity_kg),
        expected_boxes: item.map_or(0, |i| i.expected_boxes),
    }
}

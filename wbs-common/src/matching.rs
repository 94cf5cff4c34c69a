//! Invoice item name matching
//!
//! Maps a product name read off a label (by OCR or typed by a worker) to an
//! invoice line item. Rules are tried in priority order across the whole
//! invoice; the first rule with any hit wins:
//!
//! 1. Exact match on the Hebrew name
//! 2. Substring containment either way on the Hebrew name (OCR truncation,
//!    extra words on the label)
//! 3. Case-insensitive exact match on the English name
//! 4. Normalized equality on either name (punctuation and spacing noise)
//!
//! Invoice names are assumed distinct within a session, so within one rule the
//! first item in invoice order is taken.

use serde::Serialize;

use crate::models::InvoiceItem;

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    ExactHebrew,
    SubstringHebrew,
    EnglishIgnoreCase,
    Normalized,
}

/// A successful match against an invoice item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemMatch<'a> {
    pub item: &'a InvoiceItem,
    pub rule: MatchRule,
}

/// Find the invoice item named by `name`, or `None` when unmatched
pub fn match_item<'a>(name: &str, items: &'a [InvoiceItem]) -> Option<ItemMatch<'a>> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let hit = |rule: MatchRule, pred: &dyn Fn(&InvoiceItem) -> bool| {
        items
            .iter()
            .find(|item| pred(item))
            .map(|item| ItemMatch { item, rule })
    };

    hit(MatchRule::ExactHebrew, &|item| item.name_hebrew.trim() == name)
        .or_else(|| {
            hit(MatchRule::SubstringHebrew, &|item| {
                let hebrew = item.name_hebrew.trim();
                !hebrew.is_empty() && (hebrew.contains(name) || name.contains(hebrew))
            })
        })
        .or_else(|| {
            let lowered = name.to_lowercase();
            hit(MatchRule::EnglishIgnoreCase, &|item| {
                let english = item.name_english.trim();
                !english.is_empty() && english.to_lowercase() == lowered
            })
        })
        .or_else(|| {
            let normalized = normalize(name);
            if normalized.is_empty() {
                return None;
            }
            hit(MatchRule::Normalized, &|item| {
                normalize(&item.name_hebrew) == normalized
                    || normalize(&item.name_english) == normalized
            })
        })
}

/// Lowercase `text`, keeping only ASCII alphanumerics and Hebrew letters
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || is_hebrew_letter(*c))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Aggregate key for a name with no invoice match
///
/// Falls back to the trimmed lowercase name when normalization strips
/// everything, so distinct unreadable names stay in distinct buckets.
pub fn unmatched_key(name: &str) -> String {
    let normalized = normalize(name);
    if normalized.is_empty() {
        name.trim().to_lowercase()
    } else {
        normalized
    }
}

fn is_hebrew_letter(c: char) -> bool {
    // Alef through Tav, including final forms
    ('\u{05D0}'..='\u{05EA}').contains(&c)
}

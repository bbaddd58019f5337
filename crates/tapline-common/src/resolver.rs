//! Locator ranking and target matching.
//!
//! Given the element records of the latest observation, the resolver decides
//! which locator to hand to the automation server for a free-text target
//! such as `Login`. When no observed element matches, [`fallback_locators`]
//! supplies the label-derived chain tried afterwards.

use crate::element::{ElementRecord, Locator, Strategy};

/// Fold raw `(key, value)` pairs into a ranked locator list.
///
/// Canonical strategies come first in the fixed order
/// `id > accessibility id > xpath > class name`; unrecognized keys follow in
/// the order they were encountered. Empty values are dropped, and for a
/// repeated strategy the first non-empty value wins.
pub fn normalize(raw: &[(String, String)]) -> Vec<Locator> {
    let mut canonical: [Option<String>; 4] = Default::default();
    let mut overflow: Vec<Locator> = Vec::new();

    for (key, value) in raw {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match Strategy::canonical(key) {
            Some(strategy) => {
                if let Some(rank) = strategy.rank() {
                    canonical[rank].get_or_insert_with(|| value.to_string());
                }
            }
            None => {
                let key = key.trim();
                if !key.is_empty() && !overflow.iter().any(|l| l.strategy.as_str() == key) {
                    overflow.push(Locator::new(Strategy::Other(key.to_string()), value));
                }
            }
        }
    }

    Strategy::RANKED
        .into_iter()
        .zip(canonical)
        .filter_map(|(strategy, value)| value.map(|v| Locator::new(strategy, v)))
        .chain(overflow)
        .collect()
}

/// An observed element selected for a target label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatch<'a> {
    /// Position of the element in the observed list.
    pub index: usize,
    pub element: &'a ElementRecord,
    /// Top-ranked locator of the element.
    pub locator: &'a Locator,
    /// Whether a field equalled the target, as opposed to containing it.
    pub exact: bool,
}

/// Match a target label against observed elements.
///
/// Comparison is case-insensitive over every text-bearing field. Exact
/// equality is tried across the whole list before substring containment, so
/// an exact hit late in the list beats a partial hit early in it. Within a
/// pass the first element in observed order wins. Elements without any
/// locator are skipped.
pub fn match_target<'a>(elements: &'a [ElementRecord], target: &str) -> Option<TargetMatch<'a>> {
    let needle = target.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let find = |exact: bool| {
        elements.iter().enumerate().find_map(|(index, element)| {
            let locator = element.best_locator()?;
            let hit = element.texts().any(|text| {
                let text = text.trim().to_lowercase();
                if exact {
                    text == needle
                } else {
                    text.contains(&needle)
                }
            });
            hit.then_some(TargetMatch {
                index,
                element,
                locator,
                exact,
            })
        })
    };

    find(true).or_else(|| find(false))
}

/// Label-derived locators tried when no observed element resolves:
/// accessibility id by label, then four XPath variants (exact text, exact
/// content description, partial text, partial content description).
pub fn fallback_locators(label: &str) -> Vec<Locator> {
    let label = label.trim();
    if label.is_empty() {
        return Vec::new();
    }
    let literal = xpath_literal(label);
    vec![
        Locator::new(Strategy::AccessibilityId, label),
        Locator::new(Strategy::Xpath, format!("//*[@text={literal}]")),
        Locator::new(Strategy::Xpath, format!("//*[@content-desc={literal}]")),
        Locator::new(Strategy::Xpath, format!("//*[contains(@text,{literal})]")),
        Locator::new(
            Strategy::Xpath,
            format!("//*[contains(@content-desc,{literal})]"),
        ),
    ]
}

/// XPath selector for any element whose text contains `label`.
pub fn text_contains_xpath(label: &str) -> String {
    format!("//*[contains(@text,{})]", xpath_literal(label.trim()))
}

/// Quote a string as an XPath 1.0 literal. XPath has no escape sequences,
/// so a value holding both quote kinds is assembled with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

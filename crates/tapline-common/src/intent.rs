//! Intent classification and argument extraction.
//!
//! Every heuristic here is purely lexical. Target inference in particular
//! takes the quoted substring, else the last significant token, and will
//! pick the wrong word for intents like "tap Settings in the top bar"
//! (yielding `bar`). That behavior is kept stable on purpose; callers that
//! need better accuracy consult the planner when inference yields nothing.

use crate::keywords::current as kw;
use serde::{Deserialize, Serialize};

/// The single action a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Type,
    Scroll,
    Click,
    None,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Type => "type",
            ActionKind::Scroll => "scroll",
            ActionKind::Click => "click",
            ActionKind::None => "none",
        }
    }
}

/// Classify an intent by keyword membership. Type keywords are checked
/// first, then scroll, then click.
pub fn classify(intent: &str) -> ActionKind {
    let lower = intent.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();

    let has = |keywords: &[&str]| {
        keywords.iter().any(|k| {
            if k.is_ascii() {
                words.contains(k)
            } else {
                lower.contains(k)
            }
        })
    };

    if has(kw::TYPE) {
        ActionKind::Type
    } else if has(kw::SCROLL) {
        ActionKind::Scroll
    } else if has(kw::CLICK) {
        ActionKind::Click
    } else {
        ActionKind::None
    }
}

/// Text a type step should enter: whatever follows the first colon, else
/// the first quoted substring.
pub fn extract_type_text(intent: &str) -> Option<String> {
    if let Some(pos) = intent.find([':', '：']) {
        let sep_len = intent[pos..].chars().next().map_or(1, char::len_utf8);
        let rest = strip_quotes(intent[pos + sep_len..].trim());
        if !rest.is_empty() {
            return Some(rest.to_string());
        }
    }
    quoted_text(intent)
}

/// Infer the label a click or scroll step aims at.
pub fn infer_target(intent: &str) -> Option<String> {
    if let Some(quoted) = quoted_text(intent) {
        return Some(quoted);
    }

    intent
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .map(strip_cjk_verb)
        .filter(|token| !token.is_empty())
        .filter(|token| !kw::TARGET_STOPWORDS.contains(&token.to_lowercase().as_str()))
        .next_back()
        .map(str::to_string)
}

const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('“', '”'),
    ('‘', '’'),
    ('「', '」'),
    ('«', '»'),
];

/// First non-empty quoted substring. An ASCII apostrophe inside a word
/// (`don't`) does not open a quote.
pub fn quoted_text(intent: &str) -> Option<String> {
    let mut prev: Option<char> = None;
    for (start, c) in intent.char_indices() {
        let opens_word = prev.is_none_or(|p| !p.is_alphanumeric());
        prev = Some(c);

        let Some(&(_, close)) = QUOTE_PAIRS.iter().find(|(open, _)| *open == c) else {
            continue;
        };
        if c == '\'' && !opens_word {
            continue;
        }

        let body_start = start + c.len_utf8();
        if let Some(len) = intent[body_start..].find(close) {
            let inner = intent[body_start..body_start + len].trim();
            if !inner.is_empty() {
                return Some(inner.to_string());
            }
        }
    }
    None
}

fn strip_quotes(value: &str) -> &str {
    for (open, close) in QUOTE_PAIRS {
        if let Some(inner) = value
            .strip_prefix(*open)
            .and_then(|v| v.strip_suffix(*close))
        {
            return inner.trim();
        }
    }
    value
}

fn strip_cjk_verb(token: &str) -> &str {
    kw::CJK_VERB_PREFIXES
        .iter()
        .find_map(|prefix| token.strip_prefix(*prefix))
        .unwrap_or(token)
}

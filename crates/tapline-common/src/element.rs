use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// How the automation server should look an element up.
///
/// The four canonical strategies are ranked; anything else the locator
/// generator reports lands in [`Strategy::Other`] and ranks after them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Strategy {
    Id,
    AccessibilityId,
    Xpath,
    ClassName,
    Other(String),
}

impl Strategy {
    /// Canonical strategies in priority order.
    pub const RANKED: [Strategy; 4] = [
        Strategy::Id,
        Strategy::AccessibilityId,
        Strategy::Xpath,
        Strategy::ClassName,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Strategy::Id => "id",
            Strategy::AccessibilityId => "accessibility id",
            Strategy::Xpath => "xpath",
            Strategy::ClassName => "class name",
            Strategy::Other(name) => name,
        }
    }

    /// Position in the canonical ranking, `None` for overflow strategies.
    pub fn rank(&self) -> Option<usize> {
        match self {
            Strategy::Id => Some(0),
            Strategy::AccessibilityId => Some(1),
            Strategy::Xpath => Some(2),
            Strategy::ClassName => Some(3),
            Strategy::Other(_) => None,
        }
    }

    /// Fold a raw payload key onto its canonical strategy.
    ///
    /// `resource-id`, `resourceId` and `android:id` all become [`Strategy::Id`];
    /// `content-desc` and the accessibility spellings become
    /// [`Strategy::AccessibilityId`].
    pub fn canonical(key: &str) -> Option<Strategy> {
        match fold_key(key).as_str() {
            "id" | "resourceid" | "androidid" => Some(Strategy::Id),
            "accessibilityid" | "accessibility" | "accessibilitylabel" | "contentdesc"
            | "contentdescription" => Some(Strategy::AccessibilityId),
            "xpath" => Some(Strategy::Xpath),
            "classname" | "class" => Some(Strategy::ClassName),
            _ => None,
        }
    }
}

impl From<String> for Strategy {
    fn from(value: String) -> Self {
        Strategy::canonical(&value).unwrap_or(Strategy::Other(value))
    }
}

impl From<Strategy> for String {
    fn from(value: Strategy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(strategy, value)` pair the server can resolve to an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: Strategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy, self.value)
    }
}

/// Text-bearing element fields a target label is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextField {
    Text,
    Label,
    Name,
    ContentDesc,
    ResourceId,
}

impl TextField {
    pub fn from_key(key: &str) -> Option<TextField> {
        match fold_key(key).as_str() {
            "text" => Some(TextField::Text),
            "label" => Some(TextField::Label),
            "name" => Some(TextField::Name),
            "contentdesc" | "contentdescription" => Some(TextField::ContentDesc),
            "resourceid" => Some(TextField::ResourceId),
            _ => None,
        }
    }
}

/// One element from a locator-candidate payload.
///
/// Records are rebuilt from scratch on every observation; nothing carries
/// over between snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRecord {
    /// Ranked locators, best first.
    pub locators: Vec<Locator>,
    /// Text fields in payload order.
    pub text_fields: Vec<(TextField, String)>,
}

impl ElementRecord {
    pub fn best_locator(&self) -> Option<&Locator> {
        self.locators.first()
    }

    pub fn text(&self, field: TextField) -> Option<&str> {
        self.text_fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.text_fields.iter().map(|(_, v)| v.as_str())
    }
}

/// Lowercase a key and drop separators so `resource-id`, `resource_id` and
/// `resourceId` compare equal.
pub(crate) fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parse the raw locator-generation output into element records.
///
/// The payload is either a JSON array of element objects or an object
/// wrapping one (`elements`, `interactableElements`, or the first array
/// field). Each element may nest its locators under a `locators` object;
/// otherwise the top-level keys that fold onto a canonical strategy are used.
/// Text that is not JSON yields an empty list.
pub fn parse_locator_payload(raw: &str) -> Vec<ElementRecord> {
    let Some(value) = crate::plan::extract_json(raw) else {
        return Vec::new();
    };

    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match element_array(map) {
            Some(items) => items,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(element_from_object)
        .collect()
}

fn element_array(map: &Map<String, Value>) -> Option<&[Value]> {
    for key in ["elements", "interactableElements", "interactable_elements"] {
        if let Some(Value::Array(items)) = map.get(key) {
            return Some(items);
        }
    }
    map.values().find_map(|v| match v {
        Value::Array(items) => Some(items.as_slice()),
        _ => None,
    })
}

fn element_from_object(obj: &Map<String, Value>) -> ElementRecord {
    let raw_locators: Vec<(String, String)> = match obj.get("locators") {
        Some(Value::Object(nested)) => string_entries(nested).collect(),
        _ => string_entries(obj)
            .filter(|(k, _)| Strategy::canonical(k).is_some())
            .collect(),
    };

    let text_fields = string_entries(obj)
        .filter_map(|(k, v)| {
            let field = TextField::from_key(&k)?;
            let v = v.trim();
            (!v.is_empty()).then(|| (field, v.to_string()))
        })
        .collect();

    ElementRecord {
        locators: crate::resolver::normalize(&raw_locators),
        text_fields,
    }
}

fn string_entries(map: &Map<String, Value>) -> impl Iterator<Item = (String, String)> + '_ {
    map.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
}

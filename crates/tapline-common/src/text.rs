use crate::keywords::current as kw;
use regex::Regex;
use std::sync::LazyLock;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static SESSION_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)session(?:[ _-]?id|\b.*?\bid)"?\s*[:=]\s*"?([A-Za-z0-9._-]+)"#).unwrap()
});

/// Bound a response by line count, then by byte count.
///
/// Cuts land on character boundaries and leave a marker saying how much was
/// dropped.
pub fn truncate(text: &str, max_lines: usize, max_bytes: usize) -> String {
    let total_lines = text.lines().count();
    let mut out = if total_lines > max_lines {
        let kept: Vec<&str> = text.lines().take(max_lines).collect();
        format!(
            "{}\n...[truncated {} lines]",
            kept.join("\n"),
            total_lines - max_lines
        )
    } else {
        text.to_string()
    };

    if out.len() > max_bytes {
        let mut cut = max_bytes;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        let dropped = out.len() - cut;
        out.truncate(cut);
        out.push_str(&format!("...[truncated {dropped} bytes]"));
    }
    out
}

/// Reduce a free-text label to something safe inside a file name.
pub fn sanitize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.trim().chars() {
        if c.is_alphanumeric() || c == '-' {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed: String = out.trim_matches('_').chars().take(48).collect();
    if trimmed.is_empty() {
        "event".to_string()
    } else {
        trimmed
    }
}

/// Screenshot file name for a step index and label, e.g. `0007_tap_Login.png`.
pub fn screenshot_name(step: u32, label: &str) -> String {
    format!("{:04}_{}.png", step, sanitize_label(label))
}

/// Whether the UI hierarchy satisfies an expected marker.
///
/// An empty marker is always satisfied; otherwise the marker must occur in
/// the hierarchy, ignoring case.
pub fn verify_expected(hierarchy: &str, expected: &str) -> bool {
    let expected = expected.trim();
    expected.is_empty() || hierarchy.to_lowercase().contains(&expected.to_lowercase())
}

/// Whether the UI hierarchy looks like it carries a permission prompt or
/// confirmation dialog.
pub fn has_alert_keyword(hierarchy: &str) -> bool {
    let lower = hierarchy.to_lowercase();
    kw::ALERT.iter().any(|k| lower.contains(k))
}

/// Infer failure from a response that carries no explicit error flag.
pub fn looks_like_error(text: &str) -> bool {
    let lower = text.to_lowercase();
    kw::ERROR_TOKENS.iter().any(|t| lower.contains(t))
}

/// Pull the first UUID-shaped element handle out of a response.
pub fn parse_element_handle(text: &str) -> Option<String> {
    UUID_RE.find(text).map(|m| m.as_str().to_string())
}

/// Pull an automation-session handle out of a session-creation response.
pub fn parse_session_handle(text: &str) -> Option<String> {
    SESSION_ID_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| parse_element_handle(text))
}

//! Keyword tables driving the text heuristics.
//!
//! Tables are versioned as a unit: a change to any list bumps the module
//! version so traces recorded with an older table can be told apart.

/// Version of the tables re-exported as [`current`].
pub const KEYWORDS_VERSION: u32 = 1;

pub use v1 as current;

pub mod v1 {
    /// Intent words that classify a step as text entry. Checked first.
    pub const TYPE: &[&str] = &[
        "type", "enter", "input", "fill", "write", "输入", "填写", "键入",
    ];

    /// Intent words that classify a step as a scroll. Checked second.
    pub const SCROLL: &[&str] = &["scroll", "swipe", "滑动", "滚动", "下拉", "上滑"];

    /// Intent words that classify a step as a click. Checked last.
    pub const CLICK: &[&str] = &[
        "tap", "click", "press", "open", "select", "choose", "toggle", "check", "hit", "点击",
        "打开", "选择", "进入", "按下",
    ];

    /// Tokens never picked as a click/scroll target.
    pub const TARGET_STOPWORDS: &[&str] = &[
        "tap", "click", "press", "open", "select", "choose", "toggle", "check", "hit", "scroll",
        "swipe", "go", "navigate", "to", "the", "a", "an", "on", "in", "into", "at", "of",
        "for", "and", "then", "button", "icon", "tab", "link", "item", "option", "menu",
        "screen", "page", "field", "until", "visible", "down", "up", "left", "right", "again",
    ];

    /// Verb prefixes stripped from unsegmented CJK tokens.
    pub const CJK_VERB_PREFIXES: &[&str] = &[
        "点击", "打开", "选择", "进入", "按下", "滑动到", "滚动到", "滑动", "滚动",
    ];

    /// Vocabulary of permission prompts and confirmation dialogs, matched
    /// against the lowercased UI hierarchy.
    pub const ALERT: &[&str] = &[
        "permissioncontroller",
        "while using the app",
        "only this time",
        "don't allow",
        "allow",
        "accept",
        "agree",
        "允许",
        "同意",
        "确定",
        "始终允许",
        "仅在使用中允许",
        "erlauben",
        "zulassen",
        "autoriser",
        "permitir",
        "aceptar",
    ];

    /// Response substrings treated as failure when a response carries no
    /// explicit error flag.
    pub const ERROR_TOKENS: &[&str] = &[
        "error:",
        "exception",
        "no such element",
        "nosuchelement",
        "could not",
        "unable to",
        "failed to",
        "not found",
        "timed out",
    ];
}

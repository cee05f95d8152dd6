use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

static STRING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^"((?:[^"\\]|\\.)*)"$"#).expect("string literal pattern")
});

static LANG_STRING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^'((?:[^'\\]|\\.)*)'@([A-Za-z]{2,3})(?:-([A-Za-z0-9]+(?:-[A-Za-z0-9]+)*))?$",
    )
    .expect("language string pattern")
});

/// A string tagged with a language, e.g. `'colour'@en-GB`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangString {
    pub text: String,
    pub language: String,
    pub suffix: Option<String>,
}

impl LangString {
    pub fn new<T: Into<String>, L: Into<String>>(text: T, language: L) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            suffix: None,
        }
    }

    /// Splits a stored tag such as `en-gb` into language and suffix.
    pub fn from_tag<T: Into<String>>(text: T, tag: &str) -> Self {
        let (language, suffix) = match tag.split_once('-') {
            Some((language, suffix)) => (language.to_string(), Some(suffix.to_string())),
            None => (tag.to_string(), None),
        };
        Self {
            text: text.into(),
            language,
            suffix,
        }
    }

    pub fn tag(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}-{}", self.language, suffix),
            None => self.language.clone(),
        }
    }

    pub(super) fn to_literal_text(&self) -> String {
        format!("'{}'@{}", escape(&self.text, '\''), self.tag())
    }
}

pub(super) fn parse_string(text: &str) -> Result<String, ValidationError> {
    let caps = STRING_RE
        .captures(text)
        .ok_or_else(|| ValidationError::syntax(format!("malformed quoted string: {text}")))?;
    Ok(unescape(&caps[1]))
}

pub(super) fn parse_lang_string(text: &str) -> Result<LangString, ValidationError> {
    let caps = LANG_STRING_RE.captures(text).ok_or_else(|| {
        ValidationError::syntax(format!("malformed language-qualified string: {text}"))
    })?;
    Ok(LangString {
        text: unescape(&caps[1]),
        language: caps[2].to_string(),
        suffix: caps.get(3).map(|m| m.as_str().to_string()),
    })
}

pub(super) fn format_string(text: &str) -> String {
    format!("\"{}\"", escape(text, '"'))
}

fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_and_unescape_are_inverse() {
        let raw = "say \"hi\"\tand\\or\nleave";
        assert_eq!(unescape(&escape(raw, '"')), raw);
        assert_eq!(unescape(&escape(raw, '\'')), raw);
    }

    #[test]
    fn unknown_escape_keeps_character() {
        assert_eq!(unescape(r"a\|b"), "a|b");
    }

    #[test]
    fn lang_tag_splits_on_first_hyphen() {
        let value = LangString::from_tag("x", "en-gb-oed");
        assert_eq!(value.language, "en");
        assert_eq!(value.suffix.as_deref(), Some("gb-oed"));
        assert_eq!(value.tag(), "en-gb-oed");
    }
}

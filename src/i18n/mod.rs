//! Internationalization (i18n) support
//!
//! Each language has one flat YAML file, `<i18n_dir>/<lang>.yml`, mapping term
//! keys to strings. Lookups never fail: a key without a translation yields a
//! [`Term`] that renders as `<untranslated KEY>`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Internationalization handler
#[derive(Debug, Clone, Default)]
pub struct I18n {
    /// Current language
    language: String,
    /// key -> translation
    terms: HashMap<String, String>,
}

impl I18n {
    /// Create a handler from an in-memory term map
    pub fn new(language: &str, terms: HashMap<String, String>) -> Self {
        Self {
            language: language.to_string(),
            terms,
        }
    }

    /// Load `<dir>/<language>.yml`.
    ///
    /// A missing or unreadable file is logged and leaves every term
    /// untranslated.
    pub fn load<P: AsRef<Path>>(dir: P, language: &str) -> Self {
        let path = dir.as_ref().join(format!("{}.yml", language));

        let terms = match fs::read_to_string(&path) {
            Ok(content) => match serde_yaml::from_str::<HashMap<String, serde_yaml::Value>>(&content)
            {
                Ok(data) => {
                    tracing::debug!("Loaded language file: {:?}", path);
                    data.into_iter()
                        .filter_map(|(k, v)| yaml_value_to_string(&v).map(|s| (k, s)))
                        .collect()
                }
                Err(e) => {
                    tracing::warn!("Failed to parse language file {:?}: {}", path, e);
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read language file {:?}: {}", path, e);
                HashMap::new()
            }
        };

        Self::new(language, terms)
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Look up a term by key
    pub fn lookup(&self, key: &str) -> Term {
        Term {
            key: key.to_string(),
            value: self.terms.get(key).cloned(),
        }
    }

    /// Check if a translation exists
    pub fn has(&self, key: &str) -> bool {
        self.terms.contains_key(key)
    }
}

/// Convert a scalar YAML value to a string; nested values are not terms
fn yaml_value_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Result of a lookup: the key and its translation, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub key: String,
    pub value: Option<String>,
}

impl Term {
    pub fn is_translated(&self) -> bool {
        self.value.is_some()
    }

    /// Text safe to place in HTML. Translations are trusted markup; the
    /// untranslated marker is escaped so it stays visible.
    pub fn to_html(&self) -> String {
        match &self.value {
            Some(value) => value.clone(),
            None => tera::escape_html(&self.to_string()),
        }
    }

    /// Substitute `{0}`, `{1}`, ... with `positional` and `{name}` with
    /// `named`, HTML-escaping every substituted value
    pub fn format(&self, positional: &[&str], named: &[(&str, &str)]) -> String {
        let Some(template) = &self.value else {
            return self.to_html();
        };
        // Single pass: substituted values are never scanned again
        let mut out = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                rest = &rest[open..];
                break;
            };
            let name = &after[..close];
            let value = match name.parse::<usize>() {
                Ok(i) => positional.get(i).copied(),
                Err(_) => named.iter().find(|(n, _)| *n == name).map(|(_, v)| *v),
            };
            match value {
                Some(value) => out.push_str(&tera::escape_html(value)),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => f.write_str(value),
            None => write!(f, "<untranslated {}>", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i18n() -> I18n {
        let mut terms = HashMap::new();
        terms.insert("home".to_string(), "Home".to_string());
        terms.insert("total_posts".to_string(), "{0} posts by {author}".to_string());
        I18n::new("en", terms)
    }

    #[test]
    fn test_lookup() {
        let i18n = i18n();
        assert_eq!(i18n.lookup("home").to_string(), "Home");
        assert!(i18n.has("home"));

        let missing = i18n.lookup("nope");
        assert!(!missing.is_translated());
        assert_eq!(missing.to_string(), "<untranslated nope>");
        assert_eq!(missing.to_html(), "&lt;untranslated nope&gt;");
    }

    #[test]
    fn test_format_escapes_values() {
        let term = i18n().lookup("total_posts");
        assert_eq!(
            term.format(&["3"], &[("author", "<b>Amia</b>")]),
            "3 posts by &lt;b&gt;Amia&lt;&#x2F;b&gt;"
        );
    }

    #[test]
    fn test_format_does_not_substitute_twice() {
        let mut terms = HashMap::new();
        terms.insert("byline".to_string(), "{author} on {date}, {0}".to_string());
        let term = I18n::new("en", terms).lookup("byline");
        assert_eq!(
            term.format(&["{date}"], &[("date", "{author}"), ("author", "{date}")]),
            "{date} on {author}, {date}"
        );
        assert_eq!(
            term.format(&["{date}"], &[("author", "{date}"), ("date", "{author}")]),
            "{date} on {author}, {date}"
        );
    }

    #[test]
    fn test_format_keeps_unknown_placeholders() {
        let mut terms = HashMap::new();
        terms.insert("odd".to_string(), "{1} {missing} {open".to_string());
        let term = I18n::new("en", terms).lookup("odd");
        assert_eq!(term.format(&["zero"], &[]), "{1} {missing} {open");
    }

    #[test]
    fn test_format_untranslated() {
        let term = i18n().lookup("missing");
        assert_eq!(term.format(&["1"], &[]), "&lt;untranslated missing&gt;");
    }

    #[test]
    fn test_load_language_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("zh.yml"),
            "home: 首页\ncount: 3\nnested:\n  a: b\n",
        )
        .unwrap();
        let i18n = I18n::load(dir.path(), "zh");
        assert_eq!(i18n.language(), "zh");
        assert_eq!(i18n.lookup("home").to_string(), "首页");
        assert_eq!(i18n.lookup("count").to_string(), "3");
        assert!(!i18n.has("nested"));
    }

    #[test]
    fn test_missing_language_file() {
        let dir = tempfile::tempdir().unwrap();
        let i18n = I18n::load(dir.path(), "fr");
        assert!(!i18n.lookup("home").is_translated());
    }
}

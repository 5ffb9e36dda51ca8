//! Front-matter parsing
//!
//! A post document is a YAML metadata block followed by a line containing
//! exactly `---` and the Markdown body:
//!
//! ```text
//! title: Hello World
//! date: 2024-01-15
//! modified: 2024-01-20
//! tags: [rust, blog]
//! description: First post
//! published: true
//! author: Amia
//! ---
//! Body text.
//! ```

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;

use super::PostMetadata;

/// Line that terminates the metadata block
pub const SEPARATOR: &str = "---";

/// A document whose metadata block could not be decoded
#[derive(Debug, thiserror::Error)]
#[error("failed to parse post {file}: {reason}")]
pub struct PostParseError {
    /// Identifier of the offending document
    pub file: String,
    #[source]
    pub reason: serde_yaml::Error,
}

/// Split a document into (metadata block, body).
///
/// Everything before the first line equal to `---` is metadata, everything
/// after that line is the body. Without a separator the whole text is
/// metadata and the body is empty.
pub fn split(raw: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let bare = line.trim_end_matches('\n').trim_end_matches('\r');
        if bare == SEPARATOR {
            return (&raw[..offset], &raw[offset + line.len()..]);
        }
        offset += line.len();
    }
    (raw, "")
}

/// Parse a document into its metadata and body.
///
/// `file` only names the document in the error.
pub fn parse<'a>(file: &str, raw: &'a str) -> Result<(PostMetadata, &'a str), PostParseError> {
    let (meta, body) = split(raw);
    let metadata = serde_yaml::from_str::<PostMetadata>(meta).map_err(|reason| PostParseError {
        file: file.to_string(),
        reason,
    })?;
    Ok((metadata, body))
}

/// Accepts any YAML scalar and turns it into a string
struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a scalar value")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value.to_string())
    }

    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value.to_string())
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value.to_string())
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value.to_string())
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value.to_string())
    }
}

struct ScalarString(String);

impl<'de> Deserialize<'de> for ScalarString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ScalarVisitor).map(ScalarString)
    }
}

/// Custom deserializer that handles a single scalar or a list of scalars,
/// coercing numbers and booleans to strings
pub(crate) fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a scalar or a list of scalars")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value])
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            ScalarVisitor.visit_bool(value).map(|s| vec![s])
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            ScalarVisitor.visit_i64(value).map(|s| vec![s])
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            ScalarVisitor.visit_u64(value).map(|s| vec![s])
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            ScalarVisitor.visit_f64(value).map(|s| vec![s])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(ScalarString(item)) = seq.next_element::<ScalarString>()? {
                vec.push(item);
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const DOC: &str = "title: Hello World
date: 2024-01-15
modified: 2024-01-20
tags:
  - Rust
  - blog
description: \"First post: an introduction\"
published: true
author: Amia
keywords: [intro, 入门]
---
# Heading

Body with --- inside a line.
---
Still body.
";

    #[test]
    fn test_parse_document() {
        let (meta, body) = parse("hello.md", DOC).unwrap();
        assert_eq!(meta.title, "Hello World");
        assert_eq!(meta.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(meta.modified, NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
        assert_eq!(meta.tags, vec!["Rust", "blog"]);
        assert_eq!(meta.description, "First post: an introduction");
        assert!(meta.published);
        assert_eq!(meta.author, "Amia");
        assert_eq!(meta.keywords, vec!["intro", "入门"]);
        assert_eq!(
            body,
            "# Heading\n\nBody with --- inside a line.\n---\nStill body.\n"
        );
    }

    #[test]
    fn test_keywords_default_empty() {
        let doc = "title: T\ndate: 2024-01-01\nmodified: 2024-01-01\ntags: []\n\
                   description: d\npublished: false\nauthor: a\n---\nbody";
        let (meta, body) = parse("t.md", doc).unwrap();
        assert!(meta.keywords.is_empty());
        assert!(!meta.published);
        assert_eq!(body, "body");
    }

    #[test]
    fn test_numeric_tags_are_coerced() {
        let doc = "title: T\ndate: 2024-01-01\nmodified: 2024-01-01\ntags: [2024, true, 1.5, x]\n\
                   description: d\npublished: true\nauthor: a\n---\n";
        let (meta, body) = parse("t.md", doc).unwrap();
        assert_eq!(meta.tags, vec!["2024", "true", "1.5", "x"]);
        assert_eq!(body, "");
    }

    #[test]
    fn test_single_scalar_tag() {
        let doc = "title: T\ndate: 2024-01-01\nmodified: 2024-01-01\ntags: 42\n\
                   description: d\npublished: true\nauthor: a\n---\n";
        let (meta, _) = parse("t.md", doc).unwrap();
        assert_eq!(meta.tags, vec!["42"]);
    }

    #[test]
    fn test_crlf_separator() {
        let doc = "title: T\r\ndate: 2024-01-01\r\nmodified: 2024-01-01\r\ntags: [a]\r\n\
                   description: d\r\npublished: true\r\nauthor: a\r\n---\r\nbody\r\n";
        let (meta, body) = parse("t.md", doc).unwrap();
        assert_eq!(meta.tags, vec!["a"]);
        assert_eq!(body, "body\r\n");
    }

    #[test]
    fn test_missing_separator_is_error() {
        let err = parse("broken.md", "just some text without metadata").unwrap_err();
        assert_eq!(err.file, "broken.md");
        assert!(err.to_string().contains("broken.md"));
    }

    #[test]
    fn test_missing_required_field_is_error() {
        let doc = "title: T\ndate: 2024-01-01\ntags: []\ndescription: d\npublished: true\n---\nbody";
        let err = parse("missing.md", doc).unwrap_err();
        assert!(err.reason.to_string().contains("missing field"));
    }

    #[test]
    fn test_split_without_separator() {
        assert_eq!(split("a: 1\nb: 2"), ("a: 1\nb: 2", ""));
        assert_eq!(split("a: 1\n----\nb"), ("a: 1\n----\nb", ""));
        assert_eq!(split("---\nbody"), ("", "body"));
    }
}

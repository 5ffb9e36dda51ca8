//! Post and Tag models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::frontmatter::string_or_vec;

/// Front-matter metadata of a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub title: String,

    /// Publication date
    pub date: NaiveDate,

    /// Last modified date
    pub modified: NaiveDate,

    /// Tags in authored order; matched case-insensitively
    #[serde(deserialize_with = "string_or_vec")]
    pub tags: Vec<String>,

    pub description: String,

    pub published: bool,

    pub author: String,

    /// Extra search keywords
    #[serde(deserialize_with = "string_or_vec", default)]
    pub keywords: Vec<String>,
}

/// A blog post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    /// Filename stem, unique within a load cycle
    pub slug: String,

    pub metadata: PostMetadata,

    /// Raw markdown content
    pub content: String,
}

impl Post {
    pub fn new(slug: impl Into<String>, metadata: PostMetadata, content: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            metadata,
            content: content.into(),
        }
    }

    /// Case-insensitive tag membership
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.metadata.tags.iter().any(|t| t.to_lowercase() == tag)
    }
}

/// A tag with the number of posts referencing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    pub count: usize,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(tags: &[&str]) -> PostMetadata {
        PostMetadata {
            title: "T".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            modified: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            description: String::new(),
            published: true,
            author: "Amia".to_string(),
            keywords: Vec::new(),
        }
    }

    #[test]
    fn test_has_tag_ignores_case() {
        let post = Post::new("p", metadata(&["Rust", "Web"]), "");
        assert!(post.has_tag("rust"));
        assert!(post.has_tag("WEB"));
        assert!(!post.has_tag("go"));
    }
}

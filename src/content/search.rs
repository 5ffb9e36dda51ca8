//! Keyword search over loaded posts
//!
//! A [`SearchIndex`] is a lower-cased snapshot of every post's searchable
//! fields, rebuilt on each load. A [`SearchEngine`] holds the strategy chosen
//! for the store's lifetime and runs queries against an index.

use jieba_rs::Jieba;

use super::Post;
use crate::config::SearchMethod;

/// Searchable fields of one post, lower-cased
#[derive(Debug, Clone)]
struct IndexEntry {
    slug: String,
    title: String,
    tags: String,
    body: String,
    keywords: String,
}

impl IndexEntry {
    fn from_post(post: &Post) -> Self {
        let meta = &post.metadata;
        Self {
            slug: post.slug.to_lowercase(),
            title: meta.title.to_lowercase(),
            tags: meta.tags.join(", ").to_lowercase(),
            body: post.content.to_lowercase(),
            keywords: meta.keywords.join(", ").to_lowercase(),
        }
    }
}

/// Field snapshot of one load cycle; entry `i` belongs to the `i`-th post
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<IndexEntry>,
}

impl SearchIndex {
    pub fn build<'a, I>(posts: I) -> Self
    where
        I: IntoIterator<Item = &'a Post>,
    {
        Self {
            entries: posts.into_iter().map(IndexEntry::from_post).collect(),
        }
    }
}

/// Splits queries into search tokens
pub struct Segmenter {
    jieba: Jieba,
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            jieba: Jieba::new(),
        }
    }

    /// Lower-cased, de-duplicated tokens; whitespace and punctuation dropped
    pub fn tokens(&self, query: &str) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for word in self.jieba.cut(query, true) {
            if !word.chars().any(char::is_alphanumeric) {
                continue;
            }
            let token = word.trim().to_lowercase();
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        tokens
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Query runner for one strategy
pub struct SearchEngine {
    method: SearchMethod,
    segmenter: Option<Segmenter>,
}

impl SearchEngine {
    pub fn new(method: SearchMethod) -> Self {
        // The segmenter dictionary is only loaded when it is needed
        let segmenter = match method {
            SearchMethod::Fullmatch => None,
            SearchMethod::Tokenized => Some(Segmenter::new()),
        };
        Self { method, segmenter }
    }

    pub fn method(&self) -> SearchMethod {
        self.method
    }

    /// Whether results come back ranked by relevance
    pub fn ranks_by_relevance(&self) -> bool {
        self.method == SearchMethod::Tokenized
    }

    /// Positions of matching entries, in result order.
    ///
    /// An empty (or whitespace-only) query matches nothing.
    pub fn search(&self, index: &SearchIndex, query: &str) -> Vec<usize> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        match &self.segmenter {
            Some(segmenter) => tokenized(index, &segmenter.tokens(query)),
            None => fullmatch(index, &query.to_lowercase()),
        }
    }
}

fn fullmatch(index: &SearchIndex, needle: &str) -> Vec<usize> {
    index
        .entries
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            e.slug.contains(needle)
                || e.title.contains(needle)
                || e.tags.contains(needle)
                || e.keywords.contains(needle)
        })
        .map(|(i, _)| i)
        .collect()
}

/// One hit per (token, field) match; a token found in two fields of a post
/// counts twice.
fn tokenized(index: &SearchIndex, tokens: &[String]) -> Vec<usize> {
    let mut hits: Vec<(usize, usize)> = index
        .entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| {
            let count: usize = tokens
                .iter()
                .map(|t| {
                    [&e.title, &e.tags, &e.body, &e.keywords]
                        .iter()
                        .filter(|field| field.contains(t.as_str()))
                        .count()
                })
                .sum();
            (count > 0).then_some((i, count))
        })
        .collect();

    // Stable: ties keep index order
    hits.sort_by(|a, b| b.1.cmp(&a.1));
    hits.into_iter().map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PostMetadata;
    use chrono::NaiveDate;

    fn post(slug: &str, title: &str, tags: &[&str], body: &str, keywords: &[&str]) -> Post {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Post::new(
            slug,
            PostMetadata {
                title: title.to_string(),
                date,
                modified: date,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                description: String::new(),
                published: true,
                author: "Amia".to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            },
            body,
        )
    }

    #[test]
    fn test_fullmatch_title_substring() {
        let posts = vec![
            post("one", "Learning Rust", &[], "", &[]),
            post("two", "Cooking", &[], "rust in body only", &[]),
        ];
        let index = SearchIndex::build(&posts);
        let engine = SearchEngine::new(SearchMethod::Fullmatch);
        assert_eq!(engine.search(&index, "rust"), vec![0]);
        assert_eq!(engine.search(&index, "  LEARN "), vec![0]);
    }

    #[test]
    fn test_fullmatch_fields_and_order() {
        let posts = vec![
            post("alpha-notes", "A", &[], "", &[]),
            post("b", "B", &["Notes"], "", &[]),
            post("c", "C", &[], "", &["notes"]),
            post("d", "D", &[], "", &[]),
        ];
        let index = SearchIndex::build(&posts);
        let engine = SearchEngine::new(SearchMethod::Fullmatch);
        assert_eq!(engine.search(&index, "notes"), vec![0, 1, 2]);
        assert!(engine.search(&index, "nothing-here").is_empty());
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let posts = vec![post("a", "A", &[], "", &[])];
        let index = SearchIndex::build(&posts);
        for method in [SearchMethod::Fullmatch, SearchMethod::Tokenized] {
            let engine = SearchEngine::new(method);
            assert!(engine.search(&index, "").is_empty());
            assert!(engine.search(&index, "   ").is_empty());
        }
    }

    #[test]
    fn test_tokenized_ranks_more_field_hits_higher() {
        let posts = vec![
            post("one", "Other", &[], "about tokio here", &[]),
            post("two", "Tokio tips", &[], "about tokio here", &[]),
            post("three", "Unrelated", &[], "nothing", &[]),
        ];
        let index = SearchIndex::build(&posts);
        let engine = SearchEngine::new(SearchMethod::Tokenized);
        assert_eq!(engine.search(&index, "tokio"), vec![1, 0]);
    }

    #[test]
    fn test_tokenized_chinese_query() {
        let posts = vec![
            post("a", "机器学习入门", &[], "机器学习的第一课", &[]),
            post("b", "天气", &[], "今天的机器学习笔记", &[]),
            post("c", "晚饭", &[], "今天吃了面条", &[]),
            post("d", "周末", &[], "读了机器学习的书", &[]),
        ];
        let index = SearchIndex::build(&posts);
        let engine = SearchEngine::new(SearchMethod::Tokenized);
        // b and d tie on hits and keep their load order
        assert_eq!(engine.search(&index, "机器学习"), vec![0, 1, 3]);
    }

    #[test]
    fn test_tokenized_ties_keep_load_order() {
        let posts = vec![
            post("zero", "Cooking", &[], "nothing here", &[]),
            post("one", "Notes", &[], "some rust", &[]),
            post("two", "More notes", &[], "more rust", &[]),
            post("three", "Rust", &[], "all about rust", &[]),
            post("four", "Tags", &["rust"], "", &[]),
        ];
        let index = SearchIndex::build(&posts);
        let engine = SearchEngine::new(SearchMethod::Tokenized);
        assert_eq!(engine.search(&index, "rust"), vec![3, 1, 2, 4]);
        assert_eq!(engine.search(&index, "RUST notes"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_segmenter_drops_whitespace_and_duplicates() {
        let segmenter = Segmenter::new();
        let tokens = segmenter.tokens("Rust, rust  async");
        assert_eq!(tokens, vec!["rust", "async"]);
    }
}

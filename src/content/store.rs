//! Content store - the loaded posts, the tag index and the search index
//!
//! All three live in one [`Snapshot`] built off to the side on every load and
//! swapped in atomically, so concurrent readers see either the old or the new
//! load cycle and never a mix.

use anyhow::Result;
use arc_swap::ArcSwapOption;
use indexmap::IndexMap;
use std::str::FromStr;
use std::sync::Arc;

use super::frontmatter;
use super::loader::PostSource;
use super::search::{SearchEngine, SearchIndex};
use super::{Post, Tag};
use crate::config::SearchMethod;

/// Number of posts returned by [`ContentStore::recent`] by default
pub const DEFAULT_RECENT: usize = 5;

/// Query failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Search requested before an index was built
    #[error("search index has not been built")]
    IndexNotBuilt,

    #[error("invalid sort key: {0}")]
    InvalidSortKey(String),

    #[error("invalid tag order: {0}")]
    InvalidTagOrder(String),

    /// Relevance ordering requested from a strategy that does not rank
    #[error("relevance ordering is not supported by the {0} search method")]
    RelevanceUnsupported(SearchMethod),
}

/// Post ordering by one of the two dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    DateAsc,
    DateDesc,
    ModifiedAsc,
    ModifiedDesc,
}

impl SortKey {
    /// Stable sort in place
    pub fn sort(self, posts: &mut [Arc<Post>]) {
        match self {
            SortKey::DateAsc => posts.sort_by(|a, b| a.metadata.date.cmp(&b.metadata.date)),
            SortKey::DateDesc => posts.sort_by(|a, b| b.metadata.date.cmp(&a.metadata.date)),
            SortKey::ModifiedAsc => {
                posts.sort_by(|a, b| a.metadata.modified.cmp(&b.metadata.modified))
            }
            SortKey::ModifiedDesc => {
                posts.sort_by(|a, b| b.metadata.modified.cmp(&a.metadata.modified))
            }
        }
    }
}

impl FromStr for SortKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" | "date_asc" => Ok(SortKey::DateAsc),
            "date_desc" => Ok(SortKey::DateDesc),
            "modified" | "modified_asc" => Ok(SortKey::ModifiedAsc),
            "modified_desc" => Ok(SortKey::ModifiedDesc),
            other => Err(StoreError::InvalidSortKey(other.to_string())),
        }
    }
}

/// Ordering of [`ContentStore::all_tags`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOrder {
    /// Order of first appearance during load
    Insertion,
    PostCountDesc,
    /// Case-insensitive alphabetical
    Name,
}

impl FromStr for TagOrder {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insertion" => Ok(TagOrder::Insertion),
            "post_count" | "post_count_desc" => Ok(TagOrder::PostCountDesc),
            "name" => Ok(TagOrder::Name),
            other => Err(StoreError::InvalidTagOrder(other.to_string())),
        }
    }
}

/// Result ordering of [`ContentStore::search_ordered`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOrder {
    /// The strategy's own order
    Relevance,
    Sort(SortKey),
}

impl FromStr for SearchOrder {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SearchOrder::Relevance),
            other => other.parse().map(SearchOrder::Sort),
        }
    }
}

/// Outcome of one load cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub unpublished: usize,
    /// Documents that failed to parse
    pub failed: Vec<String>,
    /// Documents skipped because their slug was already taken
    pub duplicates: Vec<String>,
}

/// One load cycle's consistent state
struct Snapshot {
    posts: IndexMap<String, Arc<Post>>,
    tags: IndexMap<String, Tag>,
    index: Option<SearchIndex>,
}

impl Snapshot {
    fn build<S: PostSource + ?Sized>(source: &S, with_index: bool) -> Result<(Self, LoadReport)> {
        let mut report = LoadReport::default();
        let mut posts: IndexMap<String, Arc<Post>> = IndexMap::new();

        for doc in source.documents()? {
            let (metadata, body) = match frontmatter::parse(&doc.name, &doc.content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Skipping post: {}", e);
                    report.failed.push(doc.name);
                    continue;
                }
            };
            if !metadata.published {
                tracing::debug!("Skipping unpublished post {}", doc.name);
                report.unpublished += 1;
                continue;
            }
            let slug = doc.slug();
            if posts.contains_key(&slug) {
                tracing::warn!(
                    "Skipping {}: slug {:?} is already used by another post",
                    doc.name,
                    slug
                );
                report.duplicates.push(doc.name);
                continue;
            }
            posts.insert(slug.clone(), Arc::new(Post::new(slug, metadata, body)));
        }

        let mut tags: IndexMap<String, Tag> = IndexMap::new();
        for post in posts.values() {
            for name in &post.metadata.tags {
                tags.entry(name.clone())
                    .or_insert_with(|| Tag::new(name))
                    .count += 1;
            }
        }

        let index = with_index.then(|| SearchIndex::build(posts.values().map(|p| p.as_ref())));

        report.loaded = posts.len();
        Ok((Self { posts, tags, index }, report))
    }
}

/// Owner of the loaded posts; cheap to query from many threads
pub struct ContentStore {
    engine: SearchEngine,
    build_search_index: bool,
    snapshot: ArcSwapOption<Snapshot>,
}

impl ContentStore {
    /// Create an empty store searching with `method`
    pub fn new(method: SearchMethod) -> Self {
        Self {
            engine: SearchEngine::new(method),
            build_search_index: true,
            snapshot: ArcSwapOption::empty(),
        }
    }

    /// Skip building the search index; [`ContentStore::search`] then fails
    /// with [`StoreError::IndexNotBuilt`]
    pub fn with_search_index(mut self, enabled: bool) -> Self {
        self.build_search_index = enabled;
        self
    }

    /// Replace the store's contents with everything in `source`.
    ///
    /// Unparseable documents are logged and skipped. The previous state
    /// stays visible until the new one is complete.
    pub fn load<S: PostSource + ?Sized>(&self, source: &S) -> Result<LoadReport> {
        let (snapshot, report) = Snapshot::build(source, self.build_search_index)?;
        tracing::info!(
            "Loaded {} posts and {} tags ({} unpublished, {} failed)",
            snapshot.posts.len(),
            snapshot.tags.len(),
            report.unpublished,
            report.failed.len()
        );
        self.snapshot.store(Some(Arc::new(snapshot)));
        Ok(report)
    }

    /// Pin the current snapshot; every query on the view answers from it
    pub fn view(&self) -> StoreView<'_> {
        StoreView {
            engine: &self.engine,
            snapshot: self.snapshot.load_full(),
        }
    }

    /// Active search strategy
    pub fn strategy(&self) -> SearchMethod {
        self.engine.method()
    }

    pub fn supports_relevance(&self) -> bool {
        self.engine.ranks_by_relevance()
    }

    pub fn len(&self) -> usize {
        self.view().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, slug: &str) -> Option<Arc<Post>> {
        self.view().get(slug)
    }

    /// All posts in load order
    pub fn all(&self) -> Vec<Arc<Post>> {
        self.view().all()
    }

    /// Sort `posts` by a sort key name such as `modified_desc`
    pub fn order(mut posts: Vec<Arc<Post>>, key: &str) -> Result<Vec<Arc<Post>>, StoreError> {
        key.parse::<SortKey>()?.sort(&mut posts);
        Ok(posts)
    }

    /// The `n` most recently modified posts
    pub fn recent(&self, n: usize) -> Vec<Arc<Post>> {
        self.view().recent(n)
    }

    /// Posts carrying `tag` (case-insensitive), in load order
    pub fn by_tag(&self, tag: &str, limit: Option<usize>) -> Vec<Arc<Post>> {
        self.view().by_tag(tag, limit)
    }

    pub fn all_tags(&self, order: TagOrder) -> Vec<Tag> {
        self.view().all_tags(order)
    }

    /// Posts matching `keyword` in the strategy's native order
    pub fn search(&self, keyword: &str) -> Result<Vec<Arc<Post>>, StoreError> {
        self.view().search(keyword)
    }

    /// Search, then optionally re-order by date
    pub fn search_ordered(
        &self,
        keyword: &str,
        order: SearchOrder,
    ) -> Result<Vec<Arc<Post>>, StoreError> {
        self.view().search_ordered(keyword, order)
    }
}

/// Read access to one load cycle.
///
/// A reload after [`ContentStore::view`] does not affect the view, so a page
/// built from several queries never mixes two load cycles.
pub struct StoreView<'a> {
    engine: &'a SearchEngine,
    snapshot: Option<Arc<Snapshot>>,
}

impl StoreView<'_> {
    pub fn len(&self) -> usize {
        self.snapshot.as_ref().map_or(0, |s| s.posts.len())
    }

    pub fn get(&self, slug: &str) -> Option<Arc<Post>> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.posts.get(slug).cloned())
    }

    pub fn all(&self) -> Vec<Arc<Post>> {
        self.snapshot
            .as_ref()
            .map(|s| s.posts.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn recent(&self, n: usize) -> Vec<Arc<Post>> {
        let mut posts = self.all();
        SortKey::ModifiedDesc.sort(&mut posts);
        posts.truncate(n);
        posts
    }

    pub fn by_tag(&self, tag: &str, limit: Option<usize>) -> Vec<Arc<Post>> {
        let matching = self.all().into_iter().filter(|p| p.has_tag(tag));
        match limit {
            Some(n) => matching.take(n).collect(),
            None => matching.collect(),
        }
    }

    pub fn all_tags(&self, order: TagOrder) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .snapshot
            .as_ref()
            .map(|s| s.tags.values().cloned().collect())
            .unwrap_or_default();
        match order {
            TagOrder::Insertion => {}
            TagOrder::PostCountDesc => tags.sort_by(|a, b| b.count.cmp(&a.count)),
            TagOrder::Name => tags.sort_by_key(|t| t.name.to_lowercase()),
        }
        tags
    }

    pub fn search(&self, keyword: &str) -> Result<Vec<Arc<Post>>, StoreError> {
        let snapshot = self.snapshot.as_ref().ok_or(StoreError::IndexNotBuilt)?;
        let index = snapshot.index.as_ref().ok_or(StoreError::IndexNotBuilt)?;

        Ok(self
            .engine
            .search(index, keyword)
            .into_iter()
            .filter_map(|i| snapshot.posts.get_index(i).map(|(_, p)| Arc::clone(p)))
            .collect())
    }

    pub fn search_ordered(
        &self,
        keyword: &str,
        order: SearchOrder,
    ) -> Result<Vec<Arc<Post>>, StoreError> {
        match order {
            SearchOrder::Relevance if !self.engine.ranks_by_relevance() => {
                Err(StoreError::RelevanceUnsupported(self.engine.method()))
            }
            SearchOrder::Relevance => self.search(keyword),
            SearchOrder::Sort(key) => {
                let mut posts = self.search(keyword)?;
                key.sort(&mut posts);
                Ok(posts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::loader::Document;

    fn doc(name: &str, date: &str, modified: &str, tags: &str, published: bool) -> Document {
        Document::new(
            name,
            format!(
                "title: Title of {name}\ndate: {date}\nmodified: {modified}\ntags: {tags}\n\
                 description: about {name}\npublished: {published}\nauthor: Amia\n---\nBody of {name}\n"
            ),
        )
    }

    fn slugs(posts: &[Arc<Post>]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    fn scenario() -> ContentStore {
        let store = ContentStore::new(SearchMethod::Fullmatch);
        let docs = vec![
            doc("a.md", "2023-12-01", "2024-01-01", "[x]", true),
            doc("b.md", "2023-11-01", "2024-02-01", "[x, y]", true),
            doc("hidden.md", "2024-03-01", "2024-03-01", "[x, secret]", false),
        ];
        store.load(&docs).unwrap();
        store
    }

    #[test]
    fn test_scenario_recent_tags() {
        let store = scenario();
        assert_eq!(slugs(&store.recent(1)), vec!["b"]);
        assert_eq!(slugs(&store.recent(DEFAULT_RECENT)), vec!["b", "a"]);
        assert_eq!(slugs(&store.by_tag("y", None)), vec!["b"]);

        let tags: Vec<_> = store
            .all_tags(TagOrder::PostCountDesc)
            .into_iter()
            .map(|t| (t.name, t.count))
            .collect();
        assert_eq!(tags, vec![("x".to_string(), 2), ("y".to_string(), 1)]);
    }

    #[test]
    fn test_unpublished_is_invisible() {
        let store = scenario();
        assert!(store.get("hidden").is_none());
        assert!(!slugs(&store.recent(10)).contains(&"hidden"));
        assert!(store.search("hidden").unwrap().is_empty());
        assert!(store.by_tag("secret", None).is_empty());
        assert!(store
            .all_tags(TagOrder::Insertion)
            .iter()
            .all(|t| t.name != "secret"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_by_tag_is_case_insensitive() {
        let store = ContentStore::new(SearchMethod::Fullmatch);
        store
            .load(&vec![doc("r.md", "2024-01-01", "2024-01-01", "[Rust]", true)])
            .unwrap();
        assert_eq!(slugs(&store.by_tag("rust", None)), vec!["r"]);
        assert_eq!(slugs(&store.by_tag("RUST", Some(1))), vec!["r"]);
        assert!(store.by_tag("rust", Some(0)).is_empty());
        assert!(store.by_tag("go", None).is_empty());
    }

    #[test]
    fn test_order_desc_reverses_asc() {
        let store = ContentStore::new(SearchMethod::Fullmatch);
        store
            .load(&vec![
                doc("p1.md", "2024-03-01", "2024-03-01", "[]", true),
                doc("p2.md", "2024-01-01", "2024-01-01", "[]", true),
                doc("p3.md", "2024-02-01", "2024-02-01", "[]", true),
            ])
            .unwrap();
        let asc = ContentStore::order(store.all(), "date").unwrap();
        let mut desc = ContentStore::order(store.all(), "date_desc").unwrap();
        desc.reverse();
        assert_eq!(slugs(&asc), slugs(&desc));
        assert_eq!(slugs(&asc), vec!["p2", "p3", "p1"]);
    }

    #[test]
    fn test_invalid_sort_key() {
        let err = ContentStore::order(Vec::new(), "title").unwrap_err();
        assert_eq!(err, StoreError::InvalidSortKey("title".to_string()));
    }

    #[test]
    fn test_search_before_load() {
        let store = ContentStore::new(SearchMethod::Fullmatch);
        assert_eq!(store.search("x").unwrap_err(), StoreError::IndexNotBuilt);
        assert!(store.recent(5).is_empty());
        assert!(store.get("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_search_without_index() {
        let store = ContentStore::new(SearchMethod::Fullmatch).with_search_index(false);
        store
            .load(&vec![doc("a.md", "2024-01-01", "2024-01-01", "[]", true)])
            .unwrap();
        assert_eq!(store.search("a").unwrap_err(), StoreError::IndexNotBuilt);
        assert!(store.get("a").is_some());
    }

    #[test]
    fn test_fullmatch_search_by_title() {
        let store = scenario();
        assert_eq!(slugs(&store.search("title of b").unwrap()), vec!["b"]);
        assert!(store.search("zzz").unwrap().is_empty());
    }

    #[test]
    fn test_parse_failures_are_skipped() {
        let store = ContentStore::new(SearchMethod::Fullmatch);
        let report = store
            .load(&vec![
                Document::new("broken.md", "no metadata here"),
                doc("ok.md", "2024-01-01", "2024-01-01", "[]", true),
            ])
            .unwrap();
        assert_eq!(report.failed, vec!["broken.md"]);
        assert_eq!(report.loaded, 1);
        assert!(store.get("ok").is_some());
    }

    #[test]
    fn test_duplicate_slug_keeps_first() {
        let store = ContentStore::new(SearchMethod::Fullmatch);
        let report = store
            .load(&vec![
                doc("same.markdown", "2024-01-01", "2024-01-01", "[first]", true),
                doc("same.md", "2024-01-01", "2024-01-01", "[second]", true),
            ])
            .unwrap();
        assert_eq!(report.duplicates, vec!["same.md"]);
        assert_eq!(store.get("same").unwrap().metadata.tags, vec!["first"]);
        assert!(store.all_tags(TagOrder::Insertion).iter().all(|t| t.name != "second"));
    }

    #[test]
    fn test_reload_replaces_everything() {
        let store = scenario();
        store
            .load(&vec![doc("c.md", "2024-01-01", "2024-01-01", "[z]", true)])
            .unwrap();
        assert!(store.get("a").is_none());
        assert_eq!(slugs(&store.search("c").unwrap()), vec!["c"]);
        let tags: Vec<_> = store.all_tags(TagOrder::Insertion).into_iter().map(|t| t.name).collect();
        assert_eq!(tags, vec!["z"]);
    }

    #[test]
    fn test_tag_orders() {
        let store = ContentStore::new(SearchMethod::Fullmatch);
        store
            .load(&vec![
                doc("1.md", "2024-01-01", "2024-01-01", "[beta, Alpha]", true),
                doc("2.md", "2024-01-01", "2024-01-01", "[gamma, Alpha]", true),
            ])
            .unwrap();
        let names = |order| -> Vec<String> {
            store.all_tags(order).into_iter().map(|t| t.name).collect()
        };
        assert_eq!(names(TagOrder::Insertion), vec!["beta", "Alpha", "gamma"]);
        assert_eq!(names(TagOrder::Name), vec!["Alpha", "beta", "gamma"]);
        assert_eq!(names(TagOrder::PostCountDesc), vec!["Alpha", "beta", "gamma"]);
        assert_eq!("post_count".parse::<TagOrder>(), Ok(TagOrder::PostCountDesc));
        assert!("count".parse::<TagOrder>().is_err());
    }

    #[test]
    fn test_search_ordered() {
        let store = scenario();
        assert_eq!(
            store.search_ordered("title", SearchOrder::Relevance).unwrap_err(),
            StoreError::RelevanceUnsupported(SearchMethod::Fullmatch)
        );
        let posts = store
            .search_ordered("title", "modified_desc".parse().unwrap())
            .unwrap();
        assert_eq!(slugs(&posts), vec!["b", "a"]);

        let tokenized = ContentStore::new(SearchMethod::Tokenized);
        tokenized
            .load(&vec![doc("a.md", "2024-01-01", "2024-01-01", "[]", true)])
            .unwrap();
        assert!(tokenized.supports_relevance());
        assert_eq!(
            slugs(&tokenized.search_ordered("body", SearchOrder::Relevance).unwrap()),
            vec!["a"]
        );
    }

    #[test]
    fn test_concurrent_readers_during_reload() {
        let store = Arc::new(scenario());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let n = store.len();
                        let tags = store.all_tags(TagOrder::Insertion).len();
                        assert!(n == 2 || n == 1);
                        assert!(tags >= 1);
                    }
                })
            })
            .collect();
        for _ in 0..20 {
            store
                .load(&vec![doc("c.md", "2024-01-01", "2024-01-01", "[z]", true)])
                .unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
    }

    #[test]
    fn test_view_survives_reload() {
        let store = scenario();
        let view = store.view();
        store
            .load(&vec![doc("c.md", "2024-01-01", "2024-01-01", "[z]", true)])
            .unwrap();

        assert_eq!(view.len(), 2);
        assert_eq!(slugs(&view.recent(5)), vec!["b", "a"]);
        assert_eq!(slugs(&view.search("title").unwrap()), vec!["a", "b"]);
        assert!(view.all_tags(TagOrder::Insertion).iter().all(|t| t.name != "z"));

        let fresh = store.view();
        assert_eq!(fresh.len(), 1);
        assert!(fresh.get("c").is_some());
    }
}

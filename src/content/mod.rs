//! Content module - post parsing, loading, indexing and search

pub mod frontmatter;
pub mod loader;
mod markdown;
mod post;
pub mod search;
pub mod store;

pub use frontmatter::PostParseError;
pub use loader::{DirectorySource, Document, PostSource};
pub use markdown::MarkdownRenderer;
pub use post::{Post, PostMetadata, Tag};
pub use store::{
    ContentStore, LoadReport, SearchOrder, SortKey, StoreError, StoreView, TagOrder, DEFAULT_RECENT,
};

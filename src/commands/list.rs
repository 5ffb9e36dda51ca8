//! List site content

use anyhow::{bail, Result};

use crate::content::{ContentStore, SortKey, TagOrder};
use crate::AmiaBlog;

/// Print posts or tags
pub fn run(blog: &AmiaBlog, content_type: &str) -> Result<()> {
    let store = ContentStore::new(blog.config.search_method).with_search_index(false);
    let report = store.load(&blog.post_source())?;
    if store.is_empty() {
        tracing::warn!("No posts found in {:?}", blog.posts_dir);
    }

    match content_type {
        "post" | "posts" => {
            let mut posts = store.all();
            SortKey::ModifiedDesc.sort(&mut posts);
            println!("Posts ({}):", posts.len());
            for post in posts {
                println!(
                    "  {} - {} [{}]",
                    post.metadata.modified.format("%Y-%m-%d"),
                    post.metadata.title,
                    post.slug
                );
            }
            if report.unpublished > 0 {
                println!("({} unpublished)", report.unpublished);
            }
            for name in &report.failed {
                println!("  ! failed to parse {}", name);
            }
        }
        "tag" | "tags" => {
            let tags = store.all_tags(TagOrder::PostCountDesc);
            println!("Tags ({}):", tags.len());
            for tag in tags {
                println!("  {} ({})", tag.name, tag.count);
            }
        }
        _ => {
            bail!("Unknown type: {}. Available: post, tag", content_type);
        }
    }

    Ok(())
}

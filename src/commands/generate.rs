//! Generate the static site

use anyhow::Result;
use std::path::Path;

use crate::generator::{Overwrite, StaticGenerator};
use crate::AmiaBlog;

/// Render the site into `destination`, asking before replacing it unless
/// `remove_existing` is set
pub async fn run(blog: &AmiaBlog, destination: &Path, remove_existing: bool) -> Result<()> {
    let overwrite = if remove_existing {
        Overwrite::Always
    } else {
        Overwrite::Ask
    };

    let generator = StaticGenerator::new(blog, destination, overwrite)?;
    let info = generator.generate().await?;
    tracing::info!(
        "Generated {} posts and {} tag pages in {:.2}ms",
        info.posts,
        info.tags,
        info.duration_ms
    );
    Ok(())
}

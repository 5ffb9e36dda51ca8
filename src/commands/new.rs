//! Create a new post

use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;

use crate::content::{frontmatter, PostMetadata};
use crate::AmiaBlog;

/// Scaffold `<posts_dir>/<slug>.md` with metadata filled in for today
pub fn create_post(
    blog: &AmiaBlog,
    title: &str,
    tags: &[String],
    slug: Option<&str>,
) -> Result<PathBuf> {
    let slug = match slug {
        Some(s) => slug::slugify(s),
        None => slug::slugify(title),
    };
    if slug.is_empty() {
        bail!("cannot derive a file name from {:?}, pass --slug", title);
    }

    fs::create_dir_all(&blog.posts_dir)?;
    let file_path = blog.posts_dir.join(format!("{}.md", slug));
    if file_path.exists() {
        bail!("File already exists: {:?}", file_path);
    }

    let today = chrono::Local::now().date_naive();
    let metadata = PostMetadata {
        title: title.to_string(),
        date: today,
        modified: today,
        tags: tags.to_vec(),
        description: String::new(),
        published: true,
        author: blog
            .config
            .copyright
            .as_ref()
            .map(|c| c.holder.clone())
            .unwrap_or_default(),
        keywords: Vec::new(),
    };

    let content = format!(
        "{}{}\n\n",
        serde_yaml::to_string(&metadata)?,
        frontmatter::SEPARATOR
    );
    fs::write(&file_path, content)?;

    println!("Created: {:?}", file_path);
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    #[test]
    fn test_created_post_parses() {
        let dir = tempfile::tempdir().unwrap();
        let blog = AmiaBlog::with_config(dir.path(), SiteConfig::default());
        let path = create_post(&blog, "Hello: World", &["rust".to_string()], None).unwrap();
        assert_eq!(path, dir.path().join("posts").join("hello-world.md"));

        let raw = fs::read_to_string(&path).unwrap();
        let (metadata, body) = frontmatter::parse("hello-world.md", &raw).unwrap();
        assert_eq!(metadata.title, "Hello: World");
        assert_eq!(metadata.tags, vec!["rust"]);
        assert!(body.trim().is_empty());

        assert!(create_post(&blog, "Hello: World", &[], None).is_err());
    }
}

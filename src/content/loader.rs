//! Content loader - enumerates post documents

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A raw post document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name including extension, e.g. `hello.md`
    pub name: String,
    pub content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Identifier with the extension stripped
    pub fn slug(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
            .to_string()
    }
}

/// Where posts come from
pub trait PostSource {
    /// Every document of the source, in a stable order
    fn documents(&self) -> Result<Vec<Document>>;
}

impl PostSource for Vec<Document> {
    fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.clone())
    }
}

/// Markdown files directly inside a directory, in file-name order
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl PostSource for DirectorySource {
    fn documents(&self) -> Result<Vec<Document>> {
        if !self.dir.exists() {
            tracing::warn!("Posts directory {:?} does not exist", self.dir);
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !is_markdown_file(path) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!("Skipping post with non UTF-8 file name: {:?}", path);
                continue;
            };
            match fs::read_to_string(path) {
                Ok(content) => documents.push(Document::new(name, content)),
                Err(e) => tracing::warn!("Failed to read post {:?}: {}", path, e),
            }
        }

        Ok(documents)
    }
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

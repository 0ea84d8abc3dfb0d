//! The crawled remote hierarchy of one course.

use serde::Serialize;

use crate::listing::FileEntry;

/// Marker recorded on a node whose listing page could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlFailure {
    /// Listing URL that failed.
    pub url: String,
    /// Rendered error.
    pub message: String,
}

/// One remote directory: its files and its sub-directories, in page order.
///
/// Built once by the crawler and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTree {
    /// Local directory name for this node.
    pub label: String,
    /// Listing URL of this node.
    pub url: String,
    /// Files listed directly in this directory.
    pub files: Vec<FileEntry>,
    /// Sub-directories, in the order the listing showed them.
    pub children: Vec<ResourceTree>,
    /// Set when this node's listing could not be fetched; such a node has
    /// no files and no children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CrawlFailure>,
}

impl ResourceTree {
    /// Creates an empty node.
    #[must_use]
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            files: Vec::new(),
            children: Vec::new(),
            error: None,
        }
    }

    /// Creates a node standing in for a sub-tree that could not be crawled.
    #[must_use]
    pub fn failed(label: impl Into<String>, url: impl Into<String>, message: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            error: Some(CrawlFailure {
                url: url.clone(),
                message: message.into(),
            }),
            ..Self::new(label, url)
        }
    }

    /// Adds a file (builder style, mostly for tests and fixtures).
    #[must_use]
    pub fn with_file(mut self, file: FileEntry) -> Self {
        self.files.push(file);
        self
    }

    /// Adds a child node (builder style).
    #[must_use]
    pub fn with_child(mut self, child: ResourceTree) -> Self {
        self.children.push(child);
        self
    }

    /// Number of files in this node and all descendants.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len() + self.children.iter().map(Self::file_count).sum::<usize>()
    }

    /// Number of directories below this node.
    #[must_use]
    pub fn directory_count(&self) -> usize {
        self.children.len()
            + self
                .children
                .iter()
                .map(Self::directory_count)
                .sum::<usize>()
    }

    /// Every failure marker in the tree, depth-first.
    #[must_use]
    pub fn failures(&self) -> Vec<CrawlFailure> {
        let mut out = Vec::new();
        self.collect_failures(&mut out);
        out
    }

    fn collect_failures(&self, out: &mut Vec<CrawlFailure>) {
        if let Some(failure) = &self.error {
            out.push(failure.clone());
        }
        for child in &self.children {
            child.collect_failures(out);
        }
    }
}

// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

/// A handle to a logged artifact: a path plus metadata.
///
/// The artifact itself lives in external storage and is never held open by
/// this crate; results only carry the handle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LogFile {
    path: Utf8PathBuf,
    url: Option<String>,
    content_type: String,
    size: u64,
    compressed: bool,
}

impl LogFile {
    /// Creates a new handle for an artifact stored at `path`.
    pub fn new(path: impl Into<Utf8PathBuf>, content_type: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            url: None,
            content_type: content_type.into(),
            size,
            compressed: false,
        }
    }

    /// Sets the URL the artifact was uploaded to.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Marks the artifact as compressed.
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Returns the artifact path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the upload URL, if any.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns the artifact's content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the artifact size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns true if the artifact is compressed.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while parsing manifests and selecting tests.

use camino::Utf8PathBuf;
use thiserror::Error;

/// An error that occurred while reading or parsing `TEST_MAPPING` manifests.
///
/// All variants are fatal for the operation that produced them: a selection
/// that hits one of these returns no partial results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestMappingError {
    /// A manifest or disabled-test list could not be read.
    #[error("failed to read `{path}`")]
    Read {
        /// The file that could not be read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A manifest did not contain a valid JSON object after comment stripping.
    #[error("failed to parse test mapping at `{path}`")]
    Parse {
        /// The manifest that failed to parse.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// A test entry inside a manifest had an unexpected shape.
    #[error("invalid test entry in `{path}`: {message}")]
    InvalidEntry {
        /// The manifest containing the entry.
        path: Utf8PathBuf,

        /// What was wrong with the entry.
        message: String,
    },

    /// A scan restricted to explicit relative paths found no manifests at all.
    #[error(
        "no {} files found under `{root}` for requested paths: {}",
        crate::TEST_MAPPING_NAME,
        .paths.join(", ")
    )]
    NoManifestsFound {
        /// The scan root.
        root: Utf8PathBuf,

        /// The relative paths that were requested.
        paths: Vec<String>,
    },

    /// An error occurred while walking the manifest tree.
    #[error("failed to walk `{root}`")]
    Walk {
        /// The directory being walked.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: walkdir::Error,
    },

    /// A manifest path inside the tree was not valid UTF-8.
    #[error("manifest path `{}` is not valid UTF-8", .path.display())]
    NonUtf8Path {
        /// The offending path.
        path: std::path::PathBuf,
    },

    /// Two test declarations with different identities were merged.
    #[error(transparent)]
    MergeMismatch(#[from] MergeMismatchError),
}

/// Two [`TestInfo`](crate::TestInfo) values with different identities were
/// merged.
///
/// Merging is only defined for declarations of the same module name with the
/// same host-only flag; anything else is a caller bug and is surfaced rather
/// than coerced.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error(
    "cannot merge test `{other_name}` (host: {other_host_only}) into `{name}` (host: {host_only})"
)]
pub struct MergeMismatchError {
    pub(crate) name: String,
    pub(crate) host_only: bool,
    pub(crate) other_name: String,
    pub(crate) other_host_only: bool,
}

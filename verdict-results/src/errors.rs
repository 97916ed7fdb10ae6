// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the merge engine.

use thiserror::Error;

/// An error produced when attempts or runs cannot be merged.
///
/// These are precondition violations on the caller's side; a failed test run
/// by itself is a normal outcome and is never reported through this type.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum MergeError {
    /// Merging was invoked with the [`NoMerge`](crate::MergeStrategy::NoMerge)
    /// strategy.
    #[error("`NoMerge` is not a valid strategy for merging attempts")]
    NoMergeStrategy,

    /// There was nothing to merge.
    #[error("cannot merge an empty list of attempts")]
    EmptyInput,

    /// Runs with different names were passed to a single merge.
    #[error("cannot merge run `{other}` into run `{name}`")]
    RunNameMismatch {
        /// The name of the first run in the input.
        name: String,

        /// The mismatched name.
        other: String,
    },
}

// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Test-result aggregation for retried test runs.
//!
//! An external executor drives the lifecycle callbacks on [`TestRunResult`]
//! in order, building one [`TestResult`] per case attempt. When a test or a
//! whole run is retried, the per-identity attempts are reconciled into one
//! authoritative outcome under a [`MergeStrategy`] via [`TestResult::merge`]
//! and [`TestRunResult::merge`].

pub mod errors;
mod failure;
mod log_file;
mod merge;
mod run_result;
mod test_result;

pub use failure::*;
pub use log_file::*;
pub use merge::*;
pub use run_result::*;
pub use test_result::*;

// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Test selection from declarative `TEST_MAPPING` manifests.
//!
//! A manifest names which test modules belong to which selection group (for
//! example `presubmit`), with optional filters. This crate parses manifests,
//! resolves the concrete set of tests for a group/keyword filter, and merges
//! conflicting option sets when the same module is declared by several
//! manifests.

pub mod errors;
mod mapping;
mod parser;
mod test_info;
mod test_option;

pub use mapping::*;
pub use test_info::*;
pub use test_option::*;

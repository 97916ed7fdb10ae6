// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Policy deciding how multiple attempts of the same test or run collapse
/// into one canonical outcome.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MergeStrategy {
    /// Keep attempts separate; merging is not allowed under this strategy.
    NoMerge,

    /// A test case or run counts as passed if any attempt passed.
    AnyPassIsPass,

    /// A test case counts as passed if any attempt of that case passed.
    OneTestcasePassIsPass,

    /// A run counts as passed if any attempt of the run completed; individual
    /// cases keep strict any-fail-is-fail semantics.
    OneTestrunPassIsPass,

    /// A single failing attempt fails the test case or run.
    AnyFailIsFail,
}

impl MergeStrategy {
    /// True if one passing attempt decides a test case's merged status.
    pub(crate) fn favors_case_pass(self) -> bool {
        matches!(
            self,
            MergeStrategy::AnyPassIsPass | MergeStrategy::OneTestcasePassIsPass
        )
    }

    /// True if one completed attempt decides run-level completeness and
    /// failure state.
    pub(crate) fn favors_run_pass(self) -> bool {
        matches!(
            self,
            MergeStrategy::AnyPassIsPass | MergeStrategy::OneTestrunPassIsPass
        )
    }
}

// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    FailureDescription, LogFile, MergeStrategy, TestCaseId, TestResult, TestStatus,
    errors::MergeError,
};
use chrono::{DateTime, FixedOffset, Utc};
use indexmap::IndexMap;
use std::{cell::Cell, collections::BTreeMap, time::Duration};
use swrite::{SWrite, swrite};
use tracing::warn;

/// Where a run is in its lifecycle callback sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunState {
    /// No `test_run_started` has been seen yet.
    NotStarted,

    /// The run is open and no case is in flight.
    RunStarted,

    /// A case has started and not yet ended.
    TestInProgress,

    /// `test_run_ended` or `test_run_stopped` closed the run.
    RunEnded,
}

/// Per-status case counts for one run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusCounts {
    /// Cases that never reached a terminal status.
    pub incomplete: usize,

    /// Cases that passed.
    pub passed: usize,

    /// Cases that failed.
    pub failure: usize,

    /// Cases whose assumptions did not hold.
    pub assumption_failure: usize,

    /// Cases that were ignored.
    pub ignored: usize,
}

impl StatusCounts {
    /// Total number of cases counted.
    pub fn total(&self) -> usize {
        self.incomplete + self.passed + self.failure + self.assumption_failure + self.ignored
    }

    fn get(&self, status: TestStatus) -> usize {
        match status {
            TestStatus::Incomplete => self.incomplete,
            TestStatus::Passed => self.passed,
            TestStatus::Failure => self.failure,
            TestStatus::AssumptionFailure => self.assumption_failure,
            TestStatus::Ignored => self.ignored,
        }
    }
}

/// Results for one test run: per-case results plus run-level state.
///
/// A run is built by feeding the executor's lifecycle callbacks in order from
/// a single caller; ingestion is not reentrant, and the count cache uses
/// single-threaded interior mutability, so a value being ingested must not be
/// shared across threads. Merging via [`TestRunResult::merge`] never mutates
/// its inputs.
#[derive(Clone, Debug)]
pub struct TestRunResult {
    name: String,
    test_results: IndexMap<TestCaseId, TestResult>,
    run_metrics: BTreeMap<String, String>,
    run_log_files: IndexMap<String, Vec<LogFile>>,
    is_run_complete: bool,
    elapsed: Duration,
    start_time: Option<DateTime<FixedOffset>>,
    run_failure: Option<FailureDescription>,
    expected_test_count: usize,
    state: RunState,
    current_test: Option<TestCaseId>,
    // Recomputed lazily after any mutation clears it.
    counts: Cell<Option<StatusCounts>>,
}

impl Default for TestRunResult {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunResult {
    /// Creates an empty run; the name is set by the first
    /// [`test_run_started`](Self::test_run_started).
    pub fn new() -> Self {
        Self {
            name: String::new(),
            test_results: IndexMap::new(),
            run_metrics: BTreeMap::new(),
            run_log_files: IndexMap::new(),
            is_run_complete: false,
            elapsed: Duration::ZERO,
            start_time: None,
            run_failure: None,
            expected_test_count: 0,
            state: RunState::NotStarted,
            current_test: None,
            counts: Cell::new(None),
        }
    }

    /// Returns the run name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the per-case results in start order.
    pub fn test_results(&self) -> &IndexMap<TestCaseId, TestResult> {
        &self.test_results
    }

    /// Returns the run-level metrics.
    pub fn run_metrics(&self) -> &BTreeMap<String, String> {
        &self.run_metrics
    }

    /// Returns the artifacts logged at run scope, in log order. Several
    /// artifacts may share one name.
    pub fn run_log_files(&self) -> &IndexMap<String, Vec<LogFile>> {
        &self.run_log_files
    }

    /// Returns true if the run ran to completion.
    pub fn is_run_complete(&self) -> bool {
        self.is_run_complete
    }

    /// Returns the total elapsed time reported for the run.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns the time the run first started, if it did.
    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        self.start_time
    }

    /// Returns the recorded run-level failure, if any.
    pub fn run_failure(&self) -> Option<&FailureDescription> {
        self.run_failure.as_ref()
    }

    /// Returns the number of cases the executor announced.
    pub fn expected_test_count(&self) -> usize {
        self.expected_test_count
    }

    /// Returns where the run is in its callback sequence.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns the identity of the case currently in flight, if any.
    pub fn current_test(&self) -> Option<&TestCaseId> {
        self.current_test.as_ref()
    }

    /// True if a run-level failure was recorded.
    pub fn is_run_failure(&self) -> bool {
        self.run_failure.is_some()
    }

    /// The recorded run failure rendered as one message, if any.
    pub fn run_failure_message(&self) -> Option<String> {
        self.run_failure.as_ref().map(ToString::to_string)
    }

    /// True if any case in this run failed.
    pub fn has_failed_tests(&self) -> bool {
        self.status_counts().failure > 0
    }

    /// Per-status case counts, cached until the next mutation.
    pub fn status_counts(&self) -> StatusCounts {
        if let Some(counts) = self.counts.get() {
            return counts;
        }
        let mut counts = StatusCounts::default();
        for result in self.test_results.values() {
            match result.status() {
                TestStatus::Incomplete => counts.incomplete += 1,
                TestStatus::Passed => counts.passed += 1,
                TestStatus::Failure => counts.failure += 1,
                TestStatus::AssumptionFailure => counts.assumption_failure += 1,
                TestStatus::Ignored => counts.ignored += 1,
            }
        }
        self.counts.set(Some(counts));
        counts
    }

    /// Number of cases currently in `status`.
    pub fn tests_with_status(&self, status: TestStatus) -> usize {
        self.status_counts().get(status)
    }

    /// Number of cases that reached a terminal status.
    pub fn completed_test_count(&self) -> usize {
        let counts = self.status_counts();
        counts.total() - counts.incomplete
    }

    /// One-line human-readable count summary, e.g.
    /// `Total tests 3, passed 2, failure 1, `.
    pub fn text_summary(&self) -> String {
        let counts = self.status_counts();
        let mut summary = format!("Total tests {}, ", counts.total());
        for status in [
            TestStatus::Passed,
            TestStatus::Failure,
            TestStatus::AssumptionFailure,
            TestStatus::Ignored,
            TestStatus::Incomplete,
        ] {
            let count = counts.get(status);
            if count > 0 {
                swrite!(summary, "{} {}, ", status.summary_label(), count);
            }
        }
        summary
    }

    fn mark_dirty(&mut self) {
        self.counts.set(None);
    }

    /// Records the start of the run at the current instant.
    ///
    /// See [`test_run_started_at`](Self::test_run_started_at).
    pub fn test_run_started(&mut self, name: impl Into<String>, expected_test_count: usize) {
        self.test_run_started_at(name, expected_test_count, Utc::now().fixed_offset());
    }

    /// Records the start of the run.
    ///
    /// Repeat calls for the same run accumulate `expected_test_count`: a
    /// restarted run remembers the bigger expectation. A call after the run
    /// ended re-opens it for another attempt cycle.
    pub fn test_run_started_at(
        &mut self,
        name: impl Into<String>,
        expected_test_count: usize,
        start_time: DateTime<FixedOffset>,
    ) {
        if matches!(self.state, RunState::RunStarted | RunState::TestInProgress) {
            warn!(run = %self.name, "test_run_started arrived while the run was already open");
        }
        self.name = name.into();
        self.expected_test_count += expected_test_count;
        self.is_run_complete = false;
        if self.start_time.is_none() {
            self.start_time = Some(start_time);
        }
        self.state = RunState::RunStarted;
        self.current_test = None;
        self.mark_dirty();
    }

    /// Records the start of a case at the current instant.
    pub fn test_started(&mut self, id: TestCaseId) {
        self.test_started_at(id, Utc::now().fixed_offset());
    }

    /// Records the start of a case. Starting the same identity again replaces
    /// its previous result within this run.
    pub fn test_started_at(&mut self, id: TestCaseId, start_time: DateTime<FixedOffset>) {
        match self.state {
            RunState::NotStarted | RunState::RunEnded => {
                warn!(test = %id, "test_started arrived outside an open run");
            }
            RunState::TestInProgress => {
                if let Some(current) = &self.current_test {
                    warn!(
                        test = %id,
                        current = %current,
                        "test_started arrived while another case was in flight"
                    );
                }
            }
            RunState::RunStarted => {}
        }
        self.test_results.insert(id.clone(), TestResult::started(start_time));
        self.current_test = Some(id);
        self.state = RunState::TestInProgress;
        self.mark_dirty();
    }

    /// Records a case failure from a stack trace or a prebuilt description.
    pub fn test_failed(&mut self, id: &TestCaseId, failure: impl Into<FailureDescription>) {
        self.result_mut(id).record_failure(failure.into());
    }

    /// Records that a case's assumptions did not hold.
    pub fn test_assumption_failure(&mut self, id: &TestCaseId, trace: impl Into<String>) {
        self.result_mut(id).record_assumption_failure(trace);
    }

    /// Records that a case was ignored.
    pub fn test_ignored(&mut self, id: &TestCaseId) {
        self.result_mut(id).record_ignored();
    }

    /// Records the end of a case at the current instant.
    pub fn test_ended(&mut self, id: &TestCaseId, metrics: BTreeMap<String, String>) {
        self.test_ended_at(id, Utc::now().fixed_offset(), metrics);
    }

    /// Records the end of a case. A case with no prior failure, ignore or
    /// assumption event is promoted to passed.
    pub fn test_ended_at(
        &mut self,
        id: &TestCaseId,
        end_time: DateTime<FixedOffset>,
        metrics: BTreeMap<String, String>,
    ) {
        self.result_mut(id).record_ended(end_time, metrics);
        if self.current_test.as_ref() == Some(id) {
            self.current_test = None;
            self.state = RunState::RunStarted;
        }
    }

    /// Records a run-level failure from a message or a prebuilt description.
    ///
    /// Repeat calls accumulate into a composite failure; earlier causes are
    /// never overwritten.
    pub fn test_run_failed(&mut self, failure: impl Into<FailureDescription>) {
        self.run_failure = Some(FailureDescription::aggregate(
            self.run_failure.take(),
            failure.into(),
        ));
        self.mark_dirty();
    }

    /// Records that the run was stopped before completion after `elapsed`.
    pub fn test_run_stopped(&mut self, elapsed: Duration) {
        self.elapsed += elapsed;
        self.is_run_complete = false;
        self.state = RunState::RunEnded;
        self.current_test = None;
        self.mark_dirty();
    }

    /// Records the end of the run. Elapsed time accumulates across attempt
    /// cycles and `run_metrics` are merged into the run-level metrics.
    pub fn test_run_ended(&mut self, elapsed: Duration, run_metrics: BTreeMap<String, String>) {
        self.elapsed += elapsed;
        self.run_metrics.extend(run_metrics);
        self.is_run_complete = true;
        self.state = RunState::RunEnded;
        self.current_test = None;
        self.mark_dirty();
    }

    /// Records a saved artifact.
    ///
    /// The artifact is attached to the run; if a case is in flight it is
    /// recorded on that case as well.
    pub fn test_log_saved(&mut self, name: impl Into<String>, log_file: LogFile) {
        let name = name.into();
        if let Some(current) = &self.current_test
            && let Some(result) = self.test_results.get_mut(current)
        {
            result.add_log_file(name.clone(), log_file.clone());
        }
        self.run_log_files.entry(name).or_default().push(log_file);
        self.mark_dirty();
    }

    fn result_mut(&mut self, id: &TestCaseId) -> &mut TestResult {
        self.mark_dirty();
        self.test_results.entry(id.clone()).or_insert_with(|| {
            warn!(test = %id, "event arrived for a case that never started");
            TestResult::started(Utc::now().fixed_offset())
        })
    }

    /// Merges several attempts of the same run into one canonical result.
    ///
    /// All runs must share one name. Run metrics are unioned with a later run
    /// winning on key collision, the log-file multimap accumulates, elapsed
    /// times sum, and the merged start time is the earliest. Completeness and
    /// run failure resolve per strategy family: pass-favoring strategies
    /// treat one completed attempt as complete and clear the run failure
    /// unless every attempt failed, while the remaining strategies require
    /// all attempts to have completed and keep any failure present. Per-case
    /// results are grouped by identity in first-appearance order and folded
    /// through [`TestResult::merge`] under the same strategy.
    /// `expected_test_count` is the maximum across attempts, unlike the
    /// within-run accumulation of repeated
    /// [`test_run_started`](Self::test_run_started) calls.
    ///
    /// `strategy` must not be [`MergeStrategy::NoMerge`] and `runs` must be
    /// non-empty.
    pub fn merge(runs: &[TestRunResult], strategy: MergeStrategy) -> Result<Self, MergeError> {
        if strategy == MergeStrategy::NoMerge {
            return Err(MergeError::NoMergeStrategy);
        }
        let Some(first) = runs.first() else {
            return Err(MergeError::EmptyInput);
        };
        for run in runs {
            if run.name != first.name {
                return Err(MergeError::RunNameMismatch {
                    name: first.name.clone(),
                    other: run.name.clone(),
                });
            }
        }

        let mut run_metrics = BTreeMap::new();
        let mut run_log_files: IndexMap<String, Vec<LogFile>> = IndexMap::new();
        let mut elapsed = Duration::ZERO;
        let mut start_time: Option<DateTime<FixedOffset>> = None;
        let mut expected_test_count = 0;
        let mut any_complete = false;
        let mut all_complete = true;
        let mut run_failures = Vec::new();
        let mut attempts_by_case: IndexMap<TestCaseId, Vec<TestResult>> = IndexMap::new();

        for run in runs {
            run_metrics.extend(
                run.run_metrics
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
            for (name, log_files) in &run.run_log_files {
                run_log_files
                    .entry(name.clone())
                    .or_default()
                    .extend(log_files.iter().cloned());
            }
            elapsed += run.elapsed;
            start_time = match (start_time, run.start_time) {
                (Some(earliest), Some(start)) => Some(earliest.min(start)),
                (earliest, start) => earliest.or(start),
            };
            expected_test_count = expected_test_count.max(run.expected_test_count);
            any_complete |= run.is_run_complete;
            all_complete &= run.is_run_complete;
            if let Some(failure) = &run.run_failure {
                run_failures.push(failure.clone());
            }
            for (id, result) in &run.test_results {
                attempts_by_case
                    .entry(id.clone())
                    .or_default()
                    .push(result.clone());
            }
        }

        let is_run_complete = if strategy.favors_run_pass() {
            any_complete
        } else {
            all_complete
        };
        let run_failure = if strategy.favors_run_pass() && run_failures.len() < runs.len() {
            // At least one attempt ran without a run-level failure.
            None
        } else {
            FailureDescription::aggregate_all(run_failures)
        };

        let mut test_results = IndexMap::with_capacity(attempts_by_case.len());
        for (id, attempts) in attempts_by_case {
            test_results.insert(id, TestResult::merge(&attempts, strategy)?);
        }

        Ok(Self {
            name: first.name.clone(),
            test_results,
            run_metrics,
            run_log_files,
            is_run_complete,
            elapsed,
            start_time,
            run_failure,
            expected_test_count,
            state: RunState::RunEnded,
            current_test: None,
            counts: Cell::new(None),
        })
    }
}

/// Equality covers the recorded outcome of a run; ingestion bookkeeping (the
/// callback state machine and the count cache) is excluded.
impl PartialEq for TestRunResult {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.test_results == other.test_results
            && self.run_metrics == other.run_metrics
            && self.run_log_files == other.run_log_files
            && self.is_run_complete == other.is_run_complete
            && self.elapsed == other.elapsed
            && self.start_time == other.start_time
            && self.run_failure == other.run_failure
            && self.expected_test_count == other.expected_test_count
    }
}

impl Eq for TestRunResult {}

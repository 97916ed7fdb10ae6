// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{FailureDescription, LogFile, MergeStrategy, errors::MergeError};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::Serialize;
use std::{collections::BTreeMap, fmt};

/// Synthetic metric set on a merged result whose attempts both passed and
/// failed under a pass-favoring strategy.
pub const IS_FLAKY_KEY: &str = "is_flaky";

/// The status of a single test case attempt.
///
/// A case starts out [`Incomplete`](TestStatus::Incomplete) and moves to
/// exactly one terminal status; a case that never receives a terminal event
/// stays incomplete.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum TestStatus {
    /// The case started but no terminal event arrived.
    Incomplete,

    /// The case passed.
    Passed,

    /// The case failed.
    Failure,

    /// A test assumption did not hold; the case neither passed nor failed.
    AssumptionFailure,

    /// The case was ignored.
    Ignored,
}

impl TestStatus {
    /// Returns true once a terminal event has set this status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TestStatus::Incomplete)
    }

    pub(crate) fn summary_label(self) -> &'static str {
        match self {
            TestStatus::Incomplete => "incomplete",
            TestStatus::Passed => "passed",
            TestStatus::Failure => "failure",
            TestStatus::AssumptionFailure => "assumption_failure",
            TestStatus::Ignored => "ignored",
        }
    }
}

/// Identity of one test case within a run.
///
/// Grouping attempts across retries keys on this identity.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TestCaseId {
    class_name: String,
    method_name: String,
}

impl TestCaseId {
    /// Creates a new test case identity.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Returns the class (or suite) name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the method (or case) name.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)
    }
}

/// Outcome of one attempt of a test case.
///
/// Created when the case starts; mutated by the owning run as lifecycle
/// events arrive; an immutable snapshot thereafter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestResult {
    status: TestStatus,
    failure: Option<FailureDescription>,
    metrics: BTreeMap<String, String>,
    log_files: IndexMap<String, LogFile>,
    start_time: DateTime<FixedOffset>,
    end_time: Option<DateTime<FixedOffset>>,
}

impl TestResult {
    /// Creates a result for a case that just started.
    pub fn started(start_time: DateTime<FixedOffset>) -> Self {
        Self {
            status: TestStatus::Incomplete,
            failure: None,
            metrics: BTreeMap::new(),
            log_files: IndexMap::new(),
            start_time,
            end_time: None,
        }
    }

    /// Returns the case status.
    pub fn status(&self) -> TestStatus {
        self.status
    }

    /// Returns the recorded failure, if any.
    pub fn failure(&self) -> Option<&FailureDescription> {
        self.failure.as_ref()
    }

    /// Returns the metrics reported when the case ended.
    pub fn metrics(&self) -> &BTreeMap<String, String> {
        &self.metrics
    }

    /// Returns the artifacts logged while the case was in flight, in log
    /// order.
    pub fn log_files(&self) -> &IndexMap<String, LogFile> {
        &self.log_files
    }

    /// Returns the time the case started.
    pub fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time
    }

    /// Returns the time the case ended, if it did.
    pub fn end_time(&self) -> Option<DateTime<FixedOffset>> {
        self.end_time
    }

    pub(crate) fn record_failure(&mut self, failure: FailureDescription) {
        self.status = TestStatus::Failure;
        self.failure = Some(failure);
    }

    pub(crate) fn record_assumption_failure(&mut self, trace: impl Into<String>) {
        self.status = TestStatus::AssumptionFailure;
        self.failure = Some(FailureDescription::from_trace(trace));
    }

    pub(crate) fn record_ignored(&mut self) {
        self.status = TestStatus::Ignored;
    }

    pub(crate) fn record_ended(
        &mut self,
        end_time: DateTime<FixedOffset>,
        metrics: BTreeMap<String, String>,
    ) {
        if !self.status.is_terminal() {
            self.status = TestStatus::Passed;
        }
        self.metrics.extend(metrics);
        self.end_time = Some(end_time);
    }

    pub(crate) fn add_log_file(&mut self, name: impl Into<String>, log_file: LogFile) {
        self.log_files.insert(name.into(), log_file);
    }

    /// Collapses several attempts of the same case into one canonical result.
    ///
    /// Metrics and logged files are unioned across all attempts (a later
    /// attempt wins on a plain key collision); the merged result spans from
    /// the earliest start to the latest end. The merged status follows
    /// `strategy`:
    ///
    /// * pass-favoring strategies report `Passed` if any attempt passed, and
    ///   additionally mark the result flaky (metric [`IS_FLAKY_KEY`]) when
    ///   another attempt failed;
    /// * the remaining strategies report `Failure` if any attempt failed.
    ///
    /// With neither a pass nor a fail deciding, `Ignored` outranks
    /// `AssumptionFailure` outranks `Incomplete`.
    ///
    /// `strategy` must not be [`MergeStrategy::NoMerge`] and `attempts` must
    /// be non-empty.
    pub fn merge(
        attempts: &[TestResult],
        strategy: MergeStrategy,
    ) -> Result<TestResult, MergeError> {
        if strategy == MergeStrategy::NoMerge {
            return Err(MergeError::NoMergeStrategy);
        }
        let Some(first) = attempts.first() else {
            return Err(MergeError::EmptyInput);
        };

        let mut counts = StatusTally::default();
        let mut metrics = BTreeMap::new();
        let mut log_files = IndexMap::new();
        let mut failures = Vec::new();
        let mut start_time = first.start_time;
        let mut end_time = None;

        for attempt in attempts {
            counts.add(attempt.status);
            metrics.extend(
                attempt
                    .metrics
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
            for (name, log_file) in &attempt.log_files {
                log_files.insert(name.clone(), log_file.clone());
            }
            if let Some(failure) = &attempt.failure {
                failures.push(failure.clone());
            }
            start_time = start_time.min(attempt.start_time);
            end_time = end_time.max(attempt.end_time);
        }

        let status = if strategy.favors_case_pass() {
            if counts.passed > 0 {
                if counts.failure > 0 {
                    metrics.insert(IS_FLAKY_KEY.to_owned(), "true".to_owned());
                }
                TestStatus::Passed
            } else if counts.failure > 0 {
                TestStatus::Failure
            } else {
                counts.non_terminal_precedence()
            }
        } else if counts.failure > 0 {
            TestStatus::Failure
        } else if counts.ignored > 0 || counts.assumption_failure > 0 || counts.incomplete > 0 {
            counts.non_terminal_precedence()
        } else {
            TestStatus::Passed
        };

        Ok(TestResult {
            status,
            failure: FailureDescription::aggregate_all(failures),
            metrics,
            log_files,
            start_time,
            end_time,
        })
    }
}

#[derive(Debug, Default)]
struct StatusTally {
    passed: usize,
    failure: usize,
    incomplete: usize,
    assumption_failure: usize,
    ignored: usize,
}

impl StatusTally {
    fn add(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failure => self.failure += 1,
            TestStatus::Incomplete => self.incomplete += 1,
            TestStatus::AssumptionFailure => self.assumption_failure += 1,
            TestStatus::Ignored => self.ignored += 1,
        }
    }

    /// Precedence when neither a pass nor a fail decides the merged status.
    fn non_terminal_precedence(&self) -> TestStatus {
        if self.ignored > 0 {
            TestStatus::Ignored
        } else if self.assumption_failure > 0 {
            TestStatus::AssumptionFailure
        } else {
            TestStatus::Incomplete
        }
    }
}

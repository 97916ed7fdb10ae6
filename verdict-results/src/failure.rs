// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Serialize;
use std::fmt;

/// Detail for one recorded failure: a message or stack trace, plus the
/// component that reported it when known.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FailureDetail {
    message: String,
    origin: Option<String>,
}

impl FailureDetail {
    /// Creates a new detail from a failure message or stack trace.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin: None,
        }
    }

    /// Sets the component that reported the failure.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the reporting component, if recorded.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// A failure reported for a test case or a run.
///
/// Retries and repeated run-failure callbacks produce several underlying
/// failures for one identity; the composite form preserves every one of them
/// in arrival order so no cause is lost for diagnosis.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum FailureDescription {
    /// One failure.
    Single(FailureDetail),

    /// Several underlying failures preserved together.
    Multi(Vec<FailureDetail>),
}

impl FailureDescription {
    /// Creates a description from a failure message or stack trace.
    pub fn from_trace(trace: impl Into<String>) -> Self {
        FailureDescription::Single(FailureDetail::new(trace))
    }

    /// Returns the underlying failures in arrival order.
    pub fn details(&self) -> &[FailureDetail] {
        match self {
            FailureDescription::Single(detail) => std::slice::from_ref(detail),
            FailureDescription::Multi(details) => details,
        }
    }

    fn into_details(self) -> Vec<FailureDetail> {
        match self {
            FailureDescription::Single(detail) => vec![detail],
            FailureDescription::Multi(details) => details,
        }
    }

    /// Folds `next` into `prior`, flattening composites and preserving every
    /// underlying failure.
    pub fn aggregate(prior: Option<FailureDescription>, next: FailureDescription) -> FailureDescription {
        match prior {
            None => next,
            Some(prior) => {
                let mut details = prior.into_details();
                details.extend(next.into_details());
                FailureDescription::Multi(details)
            }
        }
    }

    /// Combines zero or more descriptions into at most one. A single input is
    /// returned unchanged.
    pub fn aggregate_all(
        failures: impl IntoIterator<Item = FailureDescription>,
    ) -> Option<FailureDescription> {
        failures
            .into_iter()
            .fold(None, |prior, next| Some(Self::aggregate(prior, next)))
    }
}

impl From<String> for FailureDescription {
    fn from(trace: String) -> Self {
        FailureDescription::from_trace(trace)
    }
}

impl From<&str> for FailureDescription {
    fn from(trace: &str) -> Self {
        FailureDescription::from_trace(trace)
    }
}

impl From<FailureDetail> for FailureDescription {
    fn from(detail: FailureDetail) -> Self {
        FailureDescription::Single(detail)
    }
}

impl fmt::Display for FailureDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDescription::Single(detail) => write!(f, "{}", detail.message),
            FailureDescription::Multi(details) => {
                write!(f, "There were {} failures:", details.len())?;
                for detail in details {
                    write!(f, "\n  {}", detail.message)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn aggregate_single_is_identity() {
        let failure = FailureDescription::from_trace("boom");
        assert_eq!(
            FailureDescription::aggregate_all([failure.clone()]),
            Some(failure)
        );
        assert_eq!(
            FailureDescription::aggregate_all(Vec::<FailureDescription>::new()),
            None
        );
    }

    #[test]
    fn aggregate_flattens_composites() {
        let first = FailureDescription::from_trace("first");
        let second = FailureDescription::Multi(vec![
            FailureDetail::new("second"),
            FailureDetail::new("third"),
        ]);

        let combined = FailureDescription::aggregate(Some(first), second);
        let messages: Vec<_> = combined
            .details()
            .iter()
            .map(FailureDetail::message)
            .collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn display_lists_all_messages() {
        let combined = FailureDescription::aggregate(
            Some(FailureDescription::from_trace("first")),
            FailureDescription::from_trace("second"),
        );
        let rendered = combined.to_string();
        assert!(rendered.contains("2 failures"), "{rendered}");
        assert!(rendered.contains("first"), "{rendered}");
        assert!(rendered.contains("second"), "{rendered}");
    }
}

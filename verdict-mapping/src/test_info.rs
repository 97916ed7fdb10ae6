// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{TestOption, errors::MergeMismatchError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

pub(crate) const INCLUDE_ANNOTATION: &str = "include-annotation";
pub(crate) const EXCLUDE_ANNOTATION: &str = "exclude-annotation";

/// One test module's full invocation descriptor.
///
/// A `TestInfo` is created for each entry parsed out of a manifest. Its
/// identity for grouping purposes is `(name, host_only)`; when the same
/// identity is declared by several manifests, [`TestInfo::merge`] combines the
/// declarations into one descriptor that maximizes combined coverage.
///
/// The option list is kept sorted by option name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TestInfo {
    name: String,
    host_only: bool,
    options: Vec<TestOption>,
    sources: BTreeSet<String>,
    keywords: BTreeSet<String>,
}

impl TestInfo {
    /// Creates a new `TestInfo` declared by the manifest at `source`.
    pub fn new(
        name: impl Into<String>,
        host_only: bool,
        mut options: Vec<TestOption>,
        source: impl Into<String>,
        keywords: BTreeSet<String>,
    ) -> Self {
        options.sort();
        let mut sources = BTreeSet::new();
        sources.insert(source.into());
        Self {
            name: name.into(),
            host_only,
            options,
            sources,
            keywords,
        }
    }

    /// Returns the test module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this test runs on the host rather than on a device.
    pub fn host_only(&self) -> bool {
        self.host_only
    }

    /// Returns the options attached to this declaration, sorted by name.
    pub fn options(&self) -> &[TestOption] {
        &self.options
    }

    /// Returns the manifest paths that declared this test.
    pub fn sources(&self) -> &BTreeSet<String> {
        &self.sources
    }

    /// Returns the keywords a caller must supply for this test to be selected.
    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    /// Merges this declaration with another declaration of the same module,
    /// returning a new descriptor whose options cover at least the union of
    /// what the two sides would run.
    ///
    /// Both sides must have the same name and host-only flag.
    ///
    /// If either side carries only exclusive options (or none at all), that
    /// side already runs everything not explicitly excluded, so the merged
    /// options are the intersection of the two exclusive sets and every
    /// inclusive option is dropped. Otherwise options are merged per kind:
    /// non-exclusive options are unioned, exclusive options are intersected,
    /// `include-annotation` is kept only when both sides require it, and
    /// `exclude-annotation` is kept when either side declares it.
    pub fn merge(&self, other: &TestInfo) -> Result<TestInfo, MergeMismatchError> {
        if self.name != other.name || self.host_only != other.host_only {
            return Err(MergeMismatchError {
                name: self.name.clone(),
                host_only: self.host_only,
                other_name: other.name.clone(),
                other_host_only: other.host_only,
            });
        }

        let merged = if exclusive_only(&self.options) || exclusive_only(&other.options) {
            let ours = exclusive_set(&self.options);
            let theirs = exclusive_set(&other.options);
            ours.intersection(&theirs).cloned().collect::<BTreeSet<_>>()
        } else {
            let ours = OptionBuckets::partition(&self.options);
            let theirs = OptionBuckets::partition(&other.options);

            let mut merged = BTreeSet::new();
            merged.extend(ours.non_exclusive.union(&theirs.non_exclusive).cloned());
            merged.extend(
                ours.include_annotations
                    .intersection(&theirs.include_annotations)
                    .cloned(),
            );
            merged.extend(ours.exclusive.intersection(&theirs.exclusive).cloned());
            merged.extend(
                ours.exclude_annotations
                    .union(&theirs.exclude_annotations)
                    .cloned(),
            );
            merged
        };

        let mut sources = self.sources.clone();
        sources.extend(other.sources.iter().cloned());
        let mut keywords = self.keywords.clone();
        keywords.extend(other.keywords.iter().cloned());

        // BTreeSet iteration is already in canonical option order.
        Ok(TestInfo {
            name: self.name.clone(),
            host_only: self.host_only,
            options: merged.into_iter().collect(),
            sources,
            keywords,
        })
    }
}

/// Collapses duplicate declarations of the same `(name, host_only)` identity
/// into one descriptor per module, folding duplicates through
/// [`TestInfo::merge`].
pub fn merge_tests(
    tests: impl IntoIterator<Item = TestInfo>,
) -> Result<BTreeSet<TestInfo>, MergeMismatchError> {
    let mut by_identity: BTreeMap<(String, bool), TestInfo> = BTreeMap::new();
    for test in tests {
        match by_identity.entry((test.name.clone(), test.host_only)) {
            Entry::Occupied(mut entry) => {
                let merged = entry.get().merge(&test)?;
                entry.insert(merged);
            }
            Entry::Vacant(entry) => {
                entry.insert(test);
            }
        }
    }
    Ok(by_identity.into_values().collect())
}

/// True if every option in the list is exclusive. An empty list counts as
/// exclusive-only: it runs everything and excludes nothing.
fn exclusive_only(options: &[TestOption]) -> bool {
    options.iter().all(TestOption::is_exclusive)
}

fn exclusive_set(options: &[TestOption]) -> BTreeSet<TestOption> {
    options
        .iter()
        .filter(|option| option.is_exclusive())
        .cloned()
        .collect()
}

/// The four option kinds that merge differently.
#[derive(Debug, Default)]
struct OptionBuckets {
    non_exclusive: BTreeSet<TestOption>,
    include_annotations: BTreeSet<TestOption>,
    exclusive: BTreeSet<TestOption>,
    exclude_annotations: BTreeSet<TestOption>,
}

impl OptionBuckets {
    fn partition(options: &[TestOption]) -> Self {
        let mut buckets = OptionBuckets::default();
        for option in options {
            if option.name() == INCLUDE_ANNOTATION {
                buckets.include_annotations.insert(option.clone());
            } else if option.name() == EXCLUDE_ANNOTATION {
                buckets.exclude_annotations.insert(option.clone());
            } else if option.is_exclusive() {
                buckets.exclusive.insert(option.clone());
            } else {
                buckets.non_exclusive.insert(option.clone());
            }
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;

    fn option(name: &str, value: &str) -> TestOption {
        TestOption::new(name, value)
    }

    fn info(name: &str, host_only: bool, options: Vec<TestOption>, source: &str) -> TestInfo {
        TestInfo::new(name, host_only, options, source, BTreeSet::new())
    }

    #[test]
    fn merge_requires_matching_identity() {
        let device = info("CtsExampleTestCases", false, vec![], "a/TEST_MAPPING");
        let host = info("CtsExampleTestCases", true, vec![], "b/TEST_MAPPING");
        let renamed = info("CtsOtherTestCases", false, vec![], "b/TEST_MAPPING");

        device.merge(&host).unwrap_err();
        device.merge(&renamed).unwrap_err();
    }

    #[test]
    fn merge_exclusive_only_side_keeps_common_exclusions() {
        let this = info(
            "module",
            false,
            vec![
                option("include-filter", "v1"),
                option("exclude-annotation", "flaky"),
            ],
            "a/TEST_MAPPING",
        );
        let other = info(
            "module",
            false,
            vec![
                option("exclude-annotation", "flaky"),
                option("exclude-filter", "v2"),
            ],
            "b/TEST_MAPPING",
        );

        let merged = this.merge(&other).unwrap();
        assert_eq!(merged.options(), &[option("exclude-annotation", "flaky")]);
        assert_eq!(
            merged.sources(),
            &btreeset! {"a/TEST_MAPPING".to_owned(), "b/TEST_MAPPING".to_owned()}
        );
    }

    #[test]
    fn merge_both_sides_empty_runs_everything() {
        let this = info("module", false, vec![], "a/TEST_MAPPING");
        let other = info("module", false, vec![option("include-filter", "v1")], "b/TEST_MAPPING");

        // `this` has no restrictions at all, so nothing survives.
        let merged = this.merge(&other).unwrap();
        assert!(merged.options().is_empty());
    }

    #[test]
    fn merge_general_case() {
        let this = info(
            "module",
            false,
            vec![
                option("include-filter", "v1"),
                option("exclude-filter", "ex1"),
                option("exclude-filter", "ex2"),
                option("exclude-annotation", "flaky"),
                option("include-annotation", "presubmit"),
            ],
            "a/TEST_MAPPING",
        );
        let other = info(
            "module",
            false,
            vec![option("exclude-filter", "ex1"), option("include-filter", "v3")],
            "b/TEST_MAPPING",
        );

        let merged = this.merge(&other).unwrap();
        // Both include-filters survive, only the shared exclude-filter does,
        // the one-sided include-annotation is dropped and the one-sided
        // exclude-annotation is kept.
        assert_eq!(
            merged.options(),
            &[
                option("exclude-annotation", "flaky"),
                option("exclude-filter", "ex1"),
                option("include-filter", "v1"),
                option("include-filter", "v3"),
            ]
        );
    }

    #[test]
    fn merge_unions_keywords() {
        let this = TestInfo::new(
            "module",
            false,
            vec![option("include-filter", "v1")],
            "a/TEST_MAPPING",
            btreeset! {"stable".to_owned()},
        );
        let other = TestInfo::new(
            "module",
            false,
            vec![option("include-filter", "v2")],
            "b/TEST_MAPPING",
            btreeset! {"nightly".to_owned()},
        );

        let merged = this.merge(&other).unwrap();
        assert_eq!(
            merged.keywords(),
            &btreeset! {"nightly".to_owned(), "stable".to_owned()}
        );
    }

    #[test]
    fn merge_tests_collapses_by_identity() {
        let tests = vec![
            info("a", false, vec![option("include-filter", "v1")], "x/TEST_MAPPING"),
            info("a", false, vec![option("include-filter", "v2")], "y/TEST_MAPPING"),
            info("a", true, vec![], "x/TEST_MAPPING"),
            info("b", false, vec![], "x/TEST_MAPPING"),
        ];

        let merged = merge_tests(tests).unwrap();
        assert_eq!(merged.len(), 3);

        let device_a = merged
            .iter()
            .find(|test| test.name() == "a" && !test.host_only())
            .unwrap();
        assert_eq!(
            device_a.options(),
            &[option("include-filter", "v1"), option("include-filter", "v2")]
        );
        assert_eq!(device_a.sources().len(), 2);
    }
}

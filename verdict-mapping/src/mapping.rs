// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{TestInfo, errors::TestMappingError, merge_tests, parser};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The file name every manifest must have.
pub const TEST_MAPPING_NAME: &str = "TEST_MAPPING";

/// Sibling file listing tests excluded from the `presubmit` group, one name
/// per line.
pub const DISABLED_PRESUBMIT_TESTS_NAME: &str = "disabled-presubmit-tests";

const PRESUBMIT_GROUP: &str = "presubmit";

/// A parsed `TEST_MAPPING` manifest: selection group → declared test modules.
///
/// One instance corresponds to one manifest file. The collection is built at
/// parse time and read-only afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestMapping {
    test_collection: BTreeMap<String, BTreeSet<TestInfo>>,
}

impl TestMapping {
    /// Parses the contents of one manifest.
    ///
    /// `source` is the manifest's root-relative path; it is recorded in every
    /// resulting [`TestInfo`] and used in error messages. Malformed input is
    /// fatal and produces no partial result.
    pub fn parse(content: &str, source: impl AsRef<Utf8Path>) -> Result<Self, TestMappingError> {
        let source = source.as_ref();
        let test_collection = parser::parse_groups(content, source, source.as_str())?;
        Ok(Self { test_collection })
    }

    /// Reads and parses the manifest at `path`, recording its path relative
    /// to `root` as the source.
    pub fn from_file(path: &Utf8Path, root: &Utf8Path) -> Result<Self, TestMappingError> {
        let content = std::fs::read_to_string(path).map_err(|error| TestMappingError::Read {
            path: path.to_owned(),
            error,
        })?;
        let source = path.strip_prefix(root).unwrap_or(path);
        Self::parse(&content, source)
    }

    /// Returns the parsed collection, keyed by group name.
    pub fn test_collection(&self) -> &BTreeMap<String, BTreeSet<TestInfo>> {
        &self.test_collection
    }

    /// Returns the tests declared under `group` that survive filtering.
    ///
    /// A test is dropped when its name is in `disabled_tests`, when its
    /// host-only flag doesn't match `host_only`, or when it is keyword-gated:
    /// a test that declares keywords is only selected if the caller supplies
    /// every one of them.
    pub fn matching_tests(
        &self,
        group: &str,
        disabled_tests: &BTreeSet<String>,
        host_only: bool,
        keywords: &BTreeSet<String>,
    ) -> BTreeSet<TestInfo> {
        let Some(tests) = self.test_collection.get(group) else {
            return BTreeSet::new();
        };
        tests
            .iter()
            .filter(|test| {
                if disabled_tests.contains(test.name()) {
                    debug!(test = test.name(), "skipping disabled test");
                    return false;
                }
                if test.host_only() != host_only {
                    return false;
                }
                if keywords.is_empty() {
                    test.keywords().is_empty()
                } else {
                    test.keywords().iter().all(|keyword| keywords.contains(keyword))
                }
            })
            .cloned()
            .collect()
    }
}

/// Restricts a manifest scan to an explicit set of root-relative paths.
///
/// Callers thread the restriction through each scan rather than configuring
/// it process-wide. The default value scans the whole tree.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanPaths {
    relative_paths: Vec<Utf8PathBuf>,
}

impl ScanPaths {
    /// Scans the entire tree under the root.
    pub fn all() -> Self {
        Self::default()
    }

    /// Scans only the given root-relative paths. Each path may point at a
    /// manifest file or at a subtree to walk.
    pub fn restricted(paths: impl IntoIterator<Item = impl Into<Utf8PathBuf>>) -> Self {
        Self {
            relative_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if this scan is limited to explicit paths.
    pub fn is_restricted(&self) -> bool {
        !self.relative_paths.is_empty()
    }

    fn scan_roots(&self, root: &Utf8Path) -> Vec<Utf8PathBuf> {
        if self.is_restricted() {
            self.relative_paths.iter().map(|path| root.join(path)).collect()
        } else {
            vec![root.to_owned()]
        }
    }
}

/// Parses every `TEST_MAPPING` manifest under `root`, honoring the path
/// restriction in `paths`.
///
/// Individual restricted paths that don't exist are skipped with a warning,
/// but a restricted scan that finds no manifest at all is an error: the
/// caller asked for specific manifests and none of them are present.
pub fn all_test_mappings(
    root: &Utf8Path,
    paths: &ScanPaths,
) -> Result<Vec<TestMapping>, TestMappingError> {
    let mut mappings = Vec::new();
    for scan_root in paths.scan_roots(root) {
        if !scan_root.as_std_path().exists() {
            warn!(path = %scan_root, "requested test mapping path does not exist");
            continue;
        }
        for entry in WalkDir::new(&scan_root).sort_by_file_name() {
            let entry = entry.map_err(|error| TestMappingError::Walk {
                root: scan_root.clone(),
                error,
            })?;
            if !entry.file_type().is_file() || entry.file_name() != TEST_MAPPING_NAME {
                continue;
            }
            let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
                TestMappingError::NonUtf8Path {
                    path: entry.path().to_owned(),
                }
            })?;
            debug!(path = %path, "parsing test mapping");
            mappings.push(TestMapping::from_file(path, root)?);
        }
    }

    if mappings.is_empty() && paths.is_restricted() {
        return Err(TestMappingError::NoManifestsFound {
            root: root.to_owned(),
            paths: paths
                .relative_paths
                .iter()
                .map(|path| path.to_string())
                .collect(),
        });
    }
    Ok(mappings)
}

/// Resolves the tests to run for `group` across every manifest under `root`.
///
/// `root` is an extracted manifest bundle: a directory tree holding
/// `TEST_MAPPING` files plus an optional top-level
/// [`disabled-presubmit-tests`](DISABLED_PRESUBMIT_TESTS_NAME) list, which is
/// consulted only when `group` is `presubmit`. Duplicate declarations of the
/// same `(name, host_only)` identity across manifests are collapsed through
/// [`TestInfo::merge`].
pub fn select_tests(
    root: &Utf8Path,
    group: &str,
    host_only: bool,
    keywords: &BTreeSet<String>,
    paths: &ScanPaths,
) -> Result<BTreeSet<TestInfo>, TestMappingError> {
    let disabled_tests = if group == PRESUBMIT_GROUP {
        read_disabled_tests(&root.join(DISABLED_PRESUBMIT_TESTS_NAME))?
    } else {
        BTreeSet::new()
    };

    let mut selected = Vec::new();
    for mapping in all_test_mappings(root, paths)? {
        selected.extend(mapping.matching_tests(group, &disabled_tests, host_only, keywords));
    }
    Ok(merge_tests(selected)?)
}

/// Returns every test declared under `root`, grouped by selection group, with
/// duplicate identities collapsed per group.
pub fn all_tests(
    root: &Utf8Path,
) -> Result<BTreeMap<String, BTreeSet<TestInfo>>, TestMappingError> {
    let mut groups: BTreeMap<String, Vec<TestInfo>> = BTreeMap::new();
    for mapping in all_test_mappings(root, &ScanPaths::all())? {
        for (group, tests) in &mapping.test_collection {
            groups
                .entry(group.clone())
                .or_default()
                .extend(tests.iter().cloned());
        }
    }
    groups
        .into_iter()
        .map(|(group, tests)| Ok((group, merge_tests(tests)?)))
        .collect()
}

fn read_disabled_tests(path: &Utf8Path) -> Result<BTreeSet<String>, TestMappingError> {
    if !path.as_std_path().exists() {
        return Ok(BTreeSet::new());
    }
    let content = std::fs::read_to_string(path).map_err(|error| TestMappingError::Read {
        path: path.to_owned(),
        error,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

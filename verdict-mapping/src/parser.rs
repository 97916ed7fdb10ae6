// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoding of a single `TEST_MAPPING` manifest.
//!
//! Manifests are JSON with line comments. Comments are stripped with a scan
//! that consumes quoted strings first, so `//` or `#` inside a string literal
//! survives; the remainder is decoded against a strict schema.

use crate::{TestInfo, TestOption, errors::TestMappingError};
use camino::Utf8Path;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

/// Reserved top-level key resolved by the manifest-tree aggregator, not per
/// file.
const IMPORTS_KEY: &str = "imports";

/// Alternation order matters: quoted strings are consumed (and kept) before
/// the comment branch can see their contents.
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"("(?:[^"\\]|\\.)*")|[ \t]*(?://|#).*"#).expect("comment regex is valid")
});

/// Strips `//` and `#` line comments, leaving quoted strings intact.
pub(crate) fn strip_comments(input: &str) -> String {
    COMMENT_RE
        .replace_all(input, |caps: &Captures<'_>| match caps.get(1) {
            Some(quoted) => quoted.as_str().to_owned(),
            None => String::new(),
        })
        .into_owned()
}

/// A single test entry inside a manifest group.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    name: String,
    #[serde(default)]
    host: bool,
    #[serde(default)]
    keywords: BTreeSet<String>,
    #[serde(default)]
    options: Vec<BTreeMap<String, String>>,
}

impl ManifestEntry {
    fn into_test_info(self, path: &Utf8Path, source: &str) -> Result<TestInfo, TestMappingError> {
        let mut options = Vec::with_capacity(self.options.len());
        for object in self.options {
            let mut fields = object.into_iter();
            match (fields.next(), fields.next()) {
                (Some((name, value)), None) => options.push(TestOption::new(name, value)),
                _ => {
                    return Err(TestMappingError::InvalidEntry {
                        path: path.to_owned(),
                        message: format!(
                            "test `{}` has an option object that does not contain exactly one key",
                            self.name
                        ),
                    });
                }
            }
        }
        Ok(TestInfo::new(self.name, self.host, options, source, self.keywords))
    }
}

/// Decodes manifest text into `group name → set of tests`.
///
/// Any malformed input is fatal: no partial result is returned.
pub(crate) fn parse_groups(
    content: &str,
    path: &Utf8Path,
    source: &str,
) -> Result<BTreeMap<String, BTreeSet<TestInfo>>, TestMappingError> {
    let stripped = strip_comments(content);
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&stripped).map_err(|error| TestMappingError::Parse {
            path: path.to_owned(),
            error,
        })?;

    let mut groups = BTreeMap::new();
    for (group, value) in raw {
        if group == IMPORTS_KEY {
            continue;
        }
        let entries: Vec<ManifestEntry> =
            serde_json::from_value(value).map_err(|error| TestMappingError::Parse {
                path: path.to_owned(),
                error,
            })?;
        let tests = entries
            .into_iter()
            .map(|entry| entry.into_test_info(path, source))
            .collect::<Result<BTreeSet<_>, _>>()?;
        groups.insert(group, tests);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Result<BTreeMap<String, BTreeSet<TestInfo>>, TestMappingError> {
        parse_groups(content, Utf8Path::new("a/TEST_MAPPING"), "a/TEST_MAPPING")
    }

    #[test]
    fn strip_comments_keeps_string_literals() {
        let input = indoc! {r#"
            // a line comment
            {
              # another comment
              "presubmit": [
                {
                  "name": "some//test#name"
                }
              ]
            }
        "#};
        let stripped = strip_comments(input);
        assert!(stripped.contains("some//test#name"), "literal kept: {stripped}");
        assert!(!stripped.contains("line comment"), "comment stripped: {stripped}");
        assert!(!stripped.contains("another"), "hash comment stripped: {stripped}");
    }

    #[test]
    fn parses_groups_and_ignores_imports() {
        let content = indoc! {r#"
            {
              "imports": [
                {
                  "path": "frameworks/base"
                }
              ],
              "presubmit": [
                {
                  "name": "CtsExampleTestCases",
                  "options": [
                    {
                      "include-filter": "android.example.cts.Foo"
                    }
                  ]
                }
              ],
              "postsubmit": [
                {
                  "name": "CtsOtherTestCases",
                  "host": true,
                  "keywords": ["nightly"]
                }
              ]
            }
        "#};

        let groups = parse(content).unwrap();
        assert_eq!(
            groups.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["postsubmit", "presubmit"]
        );

        let presubmit = &groups["presubmit"];
        assert_eq!(presubmit.len(), 1);
        let test = presubmit.iter().next().unwrap();
        assert_eq!(test.name(), "CtsExampleTestCases");
        assert!(!test.host_only());
        assert_eq!(
            test.options(),
            &[TestOption::new("include-filter", "android.example.cts.Foo")]
        );
        assert_eq!(
            test.sources().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["a/TEST_MAPPING"]
        );

        let postsubmit = &groups["postsubmit"];
        let test = postsubmit.iter().next().unwrap();
        assert!(test.host_only());
        assert!(test.keywords().contains("nightly"));
    }

    #[test]
    fn malformed_json_is_fatal() {
        parse("{ not json").unwrap_err();
    }

    #[test]
    fn unknown_entry_field_is_rejected() {
        let content = r#"{"presubmit": [{"name": "x", "hots": true}]}"#;
        let error = parse(content).unwrap_err();
        assert!(matches!(error, TestMappingError::Parse { .. }), "{error}");
    }

    #[test]
    fn non_string_option_value_is_rejected() {
        let content = r#"{"presubmit": [{"name": "x", "options": [{"shard-count": 3}]}]}"#;
        parse(content).unwrap_err();
    }

    #[test]
    fn multi_key_option_object_is_rejected() {
        let content =
            r#"{"presubmit": [{"name": "x", "options": [{"a": "1", "b": "2"}]}]}"#;
        let error = parse(content).unwrap_err();
        assert!(matches!(error, TestMappingError::InvalidEntry { .. }), "{error}");
    }

    #[test]
    fn missing_name_is_rejected() {
        let content = r#"{"presubmit": [{"host": true}]}"#;
        parse(content).unwrap_err();
    }

    #[test]
    fn trailing_comment_on_a_value_line_is_stripped() {
        let content = indoc! {r#"
            {
              "presubmit": [
                {
                  "name": "CtsExampleTestCases" // run on presubmit
                }
              ]
            }
        "#};
        parse(content).unwrap();
    }
}

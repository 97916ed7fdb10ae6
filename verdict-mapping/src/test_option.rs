// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Serialize;
use std::fmt;

/// A single named filter or annotation token attached to a test module.
///
/// Whether an option widens or narrows the set of sub-tests a module runs is
/// derived from its name. Options sort lexicographically by name, which is
/// the canonical order for serialization and equality of option lists.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TestOption {
    name: String,
    value: String,
}

impl TestOption {
    /// Creates a new `TestOption`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the option name, e.g. `include-filter`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the option value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true if this option widens the set of sub-tests a module runs.
    pub fn is_inclusive(&self) -> bool {
        self.name.contains("include") || self.name.contains("positive")
    }

    /// Returns true if this option narrows the set of sub-tests a module runs.
    pub fn is_exclusive(&self) -> bool {
        self.name.contains("exclude") || self.name.contains("negative")
    }
}

impl fmt::Display for TestOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}={}", self.name, self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("include-filter", true, false; "include filter is inclusive")]
    #[test_case("positive-testname", true, false; "positive is inclusive")]
    #[test_case("exclude-filter", false, true; "exclude filter is exclusive")]
    #[test_case("negative-testname", false, true; "negative is exclusive")]
    #[test_case("instrumentation-arg", false, false; "plain option is neither")]
    fn predicates(name: &str, inclusive: bool, exclusive: bool) {
        let option = TestOption::new(name, "value");
        assert_eq!(option.is_inclusive(), inclusive);
        assert_eq!(option.is_exclusive(), exclusive);
    }

    #[test]
    fn ordering_is_by_name_then_value() {
        let mut options = vec![
            TestOption::new("include-filter", "b"),
            TestOption::new("exclude-annotation", "flaky"),
            TestOption::new("include-filter", "a"),
        ];
        options.sort();
        assert_eq!(
            options,
            vec![
                TestOption::new("exclude-annotation", "flaky"),
                TestOption::new("include-filter", "a"),
                TestOption::new("include-filter", "b"),
            ]
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            TestOption::new("include-filter", "com.example.Foo").to_string(),
            "include-filter=com.example.Foo"
        );
        assert_eq!(TestOption::new("no-isolated-storage", "").to_string(), "no-isolated-storage");
    }
}

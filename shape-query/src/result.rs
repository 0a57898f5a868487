//! Three-valued test results.

use std::fmt;
use std::ops::Not;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of testing an element against a matcher.
///
/// `Deferred` is a first-class answer meaning "not knowable yet": the test
/// depends on an element the walk has not reached. It is not an error and it is
/// not a nullable boolean. Combinators follow Kleene's strong logic, so a
/// deferred conjunct never becomes `Passed` on its own and a `NotPassed`
/// conjunct always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TestResult {
    /// The element satisfies the test
    Passed,
    /// The element does not satisfy the test
    NotPassed,
    /// The answer depends on elements not visited yet
    Deferred,
}

impl TestResult {
    /// `Passed` for `true`, `NotPassed` for `false`.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value { Self::Passed } else { Self::NotPassed }
    }

    /// Conjunction.
    ///
    /// `Passed ∧ x = x`, `NotPassed ∧ x = NotPassed`, and `Deferred ∧ x` is
    /// `NotPassed` if `x` is, `Deferred` otherwise.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::NotPassed, _) | (_, Self::NotPassed) => Self::NotPassed,
            (Self::Passed, x) | (x, Self::Passed) => x,
            (Self::Deferred, Self::Deferred) => Self::Deferred,
        }
    }

    /// Disjunction, the dual of [`and`](Self::and).
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Passed, _) | (_, Self::Passed) => Self::Passed,
            (Self::NotPassed, x) | (x, Self::NotPassed) => x,
            (Self::Deferred, Self::Deferred) => Self::Deferred,
        }
    }

    /// Swap `Passed` and `NotPassed`. An unresolved answer stays unresolved.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Passed => Self::NotPassed,
            Self::NotPassed => Self::Passed,
            Self::Deferred => Self::Deferred,
        }
    }

    /// Lazy conjunction: `other` is only evaluated unless `self` is `NotPassed`.
    #[must_use]
    pub fn and_then(self, other: impl FnOnce() -> Self) -> Self {
        match self {
            Self::NotPassed => Self::NotPassed,
            _ => self.and(other()),
        }
    }

    /// Lazy disjunction: `other` is only evaluated unless `self` is `Passed`.
    #[must_use]
    pub fn or_else(self, other: impl FnOnce() -> Self) -> Self {
        match self {
            Self::Passed => Self::Passed,
            _ => self.or(other()),
        }
    }

    /// Conjunction of every item, `Passed` for none.
    pub fn all(results: impl IntoIterator<Item = Self>) -> Self {
        let mut acc = Self::Passed;
        for result in results {
            acc = acc.and(result);
            if acc == Self::NotPassed {
                break;
            }
        }
        acc
    }

    /// Disjunction of every item, `NotPassed` for none.
    pub fn any(results: impl IntoIterator<Item = Self>) -> Self {
        let mut acc = Self::NotPassed;
        for result in results {
            acc = acc.or(result);
            if acc == Self::Passed {
                break;
            }
        }
        acc
    }

    /// Whether this is `Passed`.
    #[must_use]
    pub fn is_passed(self) -> bool {
        self == Self::Passed
    }

    /// Whether this is `NotPassed`.
    #[must_use]
    pub fn is_not_passed(self) -> bool {
        self == Self::NotPassed
    }

    /// Whether this is `Deferred`.
    #[must_use]
    pub fn is_deferred(self) -> bool {
        self == Self::Deferred
    }

    /// Whether the answer is final.
    #[must_use]
    pub fn is_resolved(self) -> bool {
        self != Self::Deferred
    }
}

impl Not for TestResult {
    type Output = Self;

    fn not(self) -> Self {
        self.negate()
    }
}

impl From<bool> for TestResult {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::NotPassed => write!(f, "NOT_PASSED"),
            Self::Deferred => write!(f, "DEFERRED"),
        }
    }
}

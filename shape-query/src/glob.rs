//! Sequence glob automaton.
//!
//! A [`Glob`] matches an ordered sequence of subjects against an ordered list
//! of pattern items. Items that [match all](GlobItem::matches_all) consume zero
//! or more subjects, every other item consumes exactly one. The pattern is
//! compiled once into a small NFA whose states are pattern positions; a test
//! simulates every branch at the same time, so there is no backtracking.
//!
//! Item tests are three-valued: a branch carries the conjunction of the item
//! tests along its path and the sequence verdict is the disjunction over the
//! branches that end in a terminal state.

use crate::TestResult;
use std::fmt;

/// A pattern item that can stand in a [`Glob`].
pub trait GlobItem {
    /// Whether the item consumes any number of subjects, including none.
    fn matches_all(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    item: usize,
    target: usize,
}

/// Ordered pattern over a sequence, compiled into an NFA.
#[derive(Debug, Clone)]
pub struct Glob<T> {
    items: Vec<T>,
    // transitions[state] lists the edges leaving `state`
    transitions: Vec<Vec<Transition>>,
    terminal: Vec<bool>,
}

impl<T: GlobItem> Glob<T> {
    /// Compile a pattern.
    ///
    /// State 0 is the start state. Each item adds one state reached from every
    /// current state. A match-all item also loops on its own state and keeps
    /// the current states alive, which is the branch that consumes nothing.
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        let mut transitions = vec![Vec::new()];
        let mut current = vec![0];

        for (index, item) in items.iter().enumerate() {
            let state = transitions.len();
            transitions.push(Vec::new());
            for &from in &current {
                transitions[from].push(Transition {
                    item: index,
                    target: state,
                });
            }
            if item.matches_all() {
                transitions[state].push(Transition {
                    item: index,
                    target: state,
                });
                current.push(state);
            } else {
                current.clear();
                current.push(state);
            }
        }

        let mut terminal = vec![false; transitions.len()];
        for state in current {
            terminal[state] = true;
        }

        Self {
            items,
            transitions,
            terminal,
        }
    }

    /// Whether any item matches all.
    #[must_use]
    pub fn has_match_all(&self) -> bool {
        self.items.iter().any(|item| item.matches_all())
    }
}

impl<T> Glob<T> {
    /// The pattern items in order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of pattern items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the pattern has no items; it then only matches an empty
    /// sequence.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Test `subjects` against the pattern.
    ///
    /// `test` decides whether one item accepts one subject. Transitions whose
    /// item test is `NotPassed` are not taken; a `Deferred` item test keeps the
    /// branch alive with a deferred verdict.
    pub fn test<S, F>(&self, subjects: &[S], mut test: F) -> TestResult
    where
        F: FnMut(&T, &S) -> TestResult,
    {
        let mut live: Vec<Option<TestResult>> = vec![None; self.transitions.len()];
        live[0] = Some(TestResult::Passed);

        for subject in subjects {
            let mut next: Vec<Option<TestResult>> = vec![None; self.transitions.len()];
            let mut any_live = false;

            for (state, verdict) in live.iter().enumerate() {
                let Some(verdict) = *verdict else {
                    continue;
                };
                for transition in &self.transitions[state] {
                    let item_result = test(&self.items[transition.item], subject);
                    if item_result.is_not_passed() {
                        continue;
                    }
                    let branch = verdict.and(item_result);
                    let slot = &mut next[transition.target];
                    *slot = Some(slot.map_or(branch, |previous| previous.or(branch)));
                    any_live = true;
                }
            }

            if !any_live {
                return TestResult::NotPassed;
            }
            live = next;
        }

        TestResult::any(
            live.iter()
                .zip(&self.terminal)
                .filter_map(|(verdict, &terminal)| if terminal { *verdict } else { None }),
        )
    }
}

impl<T: PartialEq> PartialEq for Glob<T> {
    fn eq(&self, other: &Self) -> bool {
        // the automaton is a function of the items
        self.items == other.items
    }
}

impl<T: Eq> Eq for Glob<T> {}

impl<T: fmt::Display> Glob<T> {
    /// Render the items joined by `separator`.
    pub fn join(&self, separator: &str) -> String {
        self.items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

//! Variable bindings seen by one plan node.

use shape_graph::NodeId;
use std::collections::HashMap;

/// What a variable reference is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding<E> {
    /// No constraint: every reference passes
    Any,
    /// The referenced element must match the given defining node
    Definer(NodeId),
    /// The referenced element must be exactly this element
    Exact(E),
}

/// Immutable map from variable name to [`Binding`].
///
/// Contexts are never changed in place; [`MatchContext::bind`] derives a new
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContext<E> {
    bindings: HashMap<String, Binding<E>>,
}

impl<E> Default for MatchContext<E> {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }
}

impl<E: Clone> MatchContext<E> {
    /// Empty context: every variable is unconstrained.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this context with `variable` bound to `binding`.
    #[must_use]
    pub fn bind(&self, variable: &str, binding: Binding<E>) -> Self {
        let mut bindings = self.bindings.clone();
        let _ = bindings.insert(variable.to_string(), binding);
        Self { bindings }
    }

    /// Binding for `variable`; `None` means unconstrained.
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&Binding<E>> {
        self.bindings.get(variable)
    }

    /// Whether the context mentions `variable` at all.
    #[must_use]
    pub fn contains(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    /// Bound variable names, unordered.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_derives_new_context() {
        let empty = MatchContext::<String>::new();
        let bound = empty.bind("x", Binding::Exact("A".to_string()));

        assert!(empty.get("x").is_none());
        assert_eq!(bound.get("x"), Some(&Binding::Exact("A".to_string())));

        let rebound = bound.bind("x", Binding::Any);
        assert_eq!(bound.get("x"), Some(&Binding::Exact("A".to_string())));
        assert_eq!(rebound.get("x"), Some(&Binding::Any));
        assert!(rebound.contains("x"));
        assert_eq!(rebound.variables().collect::<Vec<_>>(), vec!["x"]);
    }
}

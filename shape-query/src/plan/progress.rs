//! Incremental evaluation of a plan over one walk.
//!
//! The walk reports elements in depth-first order through [`Progress::start`]
//! and [`Progress::finish`]. Each node of the plan is evaluated on three
//! levels, all memoised per `(node, element)`:
//!
//! - *own*: the node's matcher alone
//! - *local*: own, plus every child group matched by some walked child
//! - *match*: local, plus the parent node matching the walk parent
//!
//! Verdicts that depend on elements not walked yet, or on children still to
//! come, are DEFERRED. Resolved verdicts never change and are cached for the
//! rest of the walk; deferred ones are recomputed after every step. Once the
//! walk is over, [`Progress::finish_walk`] iterates the deferred verdicts to a
//! fixpoint and settles whatever remains circular as NOT_PASSED.

use super::{Binding, MatchContext, Plan};
use crate::TestResult;
use crate::matcher::Scope;
use crate::model::ElementModel;
use shape_graph::NodeId;
use std::collections::{HashMap, HashSet};
use tracing::{Span, debug, debug_span, trace, warn};

/// What [`Progress::start`] tells the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkInstruction {
    /// Whether the element's members can influence any verdict
    pub descend: bool,
    /// The element's verdict so far
    pub result: TestResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Stage {
    Own,
    Local,
    Match,
}

#[derive(Debug)]
struct Visit<E> {
    parent: Option<E>,
    children: Vec<E>,
    finished: bool,
}

type Key<E> = (Stage, NodeId, E);

/// State of one walk over a model.
///
/// Created by [`Plan::begin`]. A progress serves exactly one walk; start a
/// new one for every walk.
pub struct Progress<'a, M: ElementModel> {
    plan: &'a Plan,
    model: &'a M,
    contexts: Vec<MatchContext<M::Element>>,
    visits: HashMap<M::Element, Visit<M::Element>>,
    started: Vec<M::Element>,
    stack: Vec<M::Element>,
    closed: bool,
    resolved: HashMap<Key<M::Element>, TestResult>,
    pass: HashMap<Key<M::Element>, TestResult>,
    active: HashSet<Key<M::Element>>,
    // Verdict assumed for a key that is already being computed
    assume: TestResult,
    span: Span,
}

impl<'a, M: ElementModel> Progress<'a, M> {
    pub(super) fn new(plan: &'a Plan, model: &'a M) -> Self {
        let contexts = plan
            .layouts
            .iter()
            .map(|layout| {
                layout
                    .definers
                    .iter()
                    .fold(MatchContext::new(), |context, (variable, definer)| {
                        let binding = definer.map_or(Binding::Any, Binding::Definer);
                        context.bind(variable, binding)
                    })
            })
            .collect();

        Self {
            plan,
            model,
            contexts,
            visits: HashMap::new(),
            started: Vec::new(),
            stack: Vec::new(),
            closed: false,
            resolved: HashMap::new(),
            pass: HashMap::new(),
            active: HashSet::new(),
            assume: TestResult::Deferred,
            span: debug_span!("progress", nodes = plan.node_count()),
        }
    }

    /// Pin `variable` to exactly `element` for the whole walk.
    ///
    /// Must be called before the walk starts. Binding a variable no statement
    /// references has no effect.
    #[must_use]
    pub fn bind(mut self, variable: &str, element: M::Element) -> Self {
        let mut bound = false;
        for context in &mut self.contexts {
            if context.contains(variable) {
                *context = context.bind(variable, Binding::Exact(element.clone()));
                bound = true;
            }
        }
        if !bound {
            warn!(%variable, "no statement references the bound variable");
        }
        if !self.started.is_empty() {
            warn!(%variable, "variable bound after the walk started");
            self.resolved.clear();
        }
        self
    }

    /// The walk enters `element`.
    ///
    /// The element's walk parent is the innermost element not finished yet.
    pub fn start(&mut self, element: M::Element) -> WalkInstruction {
        let span = self.span.clone();
        let _entered = span.enter();

        if self.visits.contains_key(&element) {
            warn!(element = ?element, "element started twice");
            self.pass.clear();
            return WalkInstruction {
                descend: false,
                result: self.verdict(&element),
            };
        }

        let parent = self.stack.last().cloned();
        if self.model.enclosing(&element) != parent {
            debug!(element = ?element, walk_parent = ?parent, "walk parent differs from enclosing element");
        }
        if let Some(visit) = parent.as_ref().and_then(|p| self.visits.get_mut(p)) {
            visit.children.push(element.clone());
        }
        let _ = self.visits.insert(
            element.clone(),
            Visit {
                parent,
                children: Vec::new(),
                finished: false,
            },
        );
        self.stack.push(element.clone());
        self.started.push(element.clone());

        self.pass.clear();
        let result = self.verdict(&element);
        let descend = self.should_descend(&element);
        trace!(element = ?element, %result, descend, "started");
        WalkInstruction { descend, result }
    }

    /// The walk leaves `element`; its members are complete.
    ///
    /// Elements still open inside `element` are finished with it.
    pub fn finish(&mut self, element: &M::Element) -> TestResult {
        let span = self.span.clone();
        let _entered = span.enter();

        match self.stack.iter().rposition(|open| open == element) {
            Some(position) => {
                if position + 1 != self.stack.len() {
                    warn!(
                        element = ?element,
                        open = self.stack.len() - position - 1,
                        "finishing an element with members still open"
                    );
                }
                for open in self.stack.split_off(position) {
                    if let Some(visit) = self.visits.get_mut(&open) {
                        visit.finished = true;
                    }
                }
            }
            None => {
                warn!(element = ?element, "finishing an element that is not open");
                if !self.visits.contains_key(element) {
                    return TestResult::NotPassed;
                }
            }
        }

        self.pass.clear();
        let result = self.verdict(element);
        trace!(element = ?element, %result, "finished");
        result
    }

    /// End the walk and settle every started element's verdict.
    ///
    /// References to elements never walked fail from here on. Verdicts that
    /// stay DEFERRED only because they depend on each other are NOT_PASSED.
    #[must_use]
    pub fn finish_walk(mut self) -> HashMap<M::Element, TestResult> {
        let span = self.span.clone();
        let _entered = span.enter();

        self.closed = true;
        if !self.stack.is_empty() {
            debug!(open = self.stack.len(), "closing walk with open elements");
            for open in std::mem::take(&mut self.stack) {
                if let Some(visit) = self.visits.get_mut(&open) {
                    visit.finished = true;
                }
            }
        }

        let plan = self.plan;
        let elements = std::mem::take(&mut self.started);
        let mut previous = usize::MAX;
        let mut passes = 0_usize;
        let deferred = loop {
            self.pass.clear();
            passes += 1;
            let mut deferred = 0_usize;
            for &node in &plan.order {
                for element in &elements {
                    if self.evaluate(Stage::Match, node, element).is_deferred() {
                        deferred += 1;
                    }
                }
            }
            if deferred == 0 || deferred >= previous {
                break deferred;
            }
            previous = deferred;
        };

        if deferred > 0 {
            debug!(deferred, "settling circular verdicts as not passed");
            self.assume = TestResult::NotPassed;
            self.pass.clear();
        }

        let verdicts: HashMap<M::Element, TestResult> = elements
            .iter()
            .map(|element| {
                let verdict = match self.verdict(element) {
                    TestResult::Deferred => TestResult::NotPassed,
                    resolved => resolved,
                };
                (element.clone(), verdict)
            })
            .collect();

        debug!(
            elements = verdicts.len(),
            passed = verdicts.values().filter(|r| r.is_passed()).count(),
            passes,
            "walk finished"
        );
        verdicts
    }

    /// OR over the reported groups.
    fn verdict(&mut self, element: &M::Element) -> TestResult {
        let plan = self.plan;
        let mut result = TestResult::NotPassed;
        for &node in &plan.reported {
            result = result.or(self.evaluate(Stage::Match, node, element));
            if result.is_passed() {
                break;
            }
        }
        result
    }

    // Types always descend; other members only if a node with children can
    // match them.
    fn should_descend(&mut self, element: &M::Element) -> bool {
        if self.model.shape(element).is_type() {
            return true;
        }
        let plan = self.plan;
        plan.order.iter().any(|&node| {
            !plan.layout_of(node).child_groups.is_empty()
                && !self.evaluate(Stage::Own, node, element).is_not_passed()
        })
    }

    fn evaluate(&mut self, stage: Stage, node: NodeId, element: &M::Element) -> TestResult {
        let key = (stage, node, element.clone());
        if let Some(&result) = self.resolved.get(&key) {
            return result;
        }
        if let Some(&result) = self.pass.get(&key) {
            return result;
        }
        if self.active.contains(&key) {
            return self.assume;
        }

        let _ = self.active.insert(key.clone());
        let result = match stage {
            Stage::Own => self.own(node, element),
            Stage::Local => self.local(node, element),
            Stage::Match => self.matched(node, element),
        };
        let _ = self.active.remove(&key);

        if result.is_resolved() {
            let _ = self.resolved.insert(key, result);
        } else {
            let _ = self.pass.insert(key, result);
        }
        result
    }

    fn own(&mut self, node: NodeId, element: &M::Element) -> TestResult {
        let plan = self.plan;
        let model = self.model;
        let Some(data) = plan.node(node) else {
            return TestResult::NotPassed;
        };
        let mut scope = NodeScope {
            progress: self,
            node,
        };
        data.matcher().test(model, element, &mut scope)
    }

    fn local(&mut self, node: NodeId, element: &M::Element) -> TestResult {
        let mut result = self.evaluate(Stage::Own, node, element);
        let plan = self.plan;
        for &group in &plan.layout_of(node).child_groups {
            if result.is_not_passed() {
                break;
            }
            result = result.and(self.some_child(group, element));
        }
        result
    }

    // Some walked child of `element` locally matches `group`.
    fn some_child(&mut self, group: NodeId, element: &M::Element) -> TestResult {
        let Some(visit) = self.visits.get(element) else {
            return self.unwalked();
        };
        let children = visit.children.clone();
        let finished = visit.finished;

        let mut result = TestResult::NotPassed;
        for child in &children {
            result = result.or(self.evaluate(Stage::Local, group, child));
            if result.is_passed() {
                return result;
            }
        }
        if result.is_not_passed() && !finished {
            TestResult::Deferred
        } else {
            result
        }
    }

    fn matched(&mut self, node: NodeId, element: &M::Element) -> TestResult {
        let local = self.evaluate(Stage::Local, node, element);
        if local.is_not_passed() {
            return local;
        }
        let plan = self.plan;
        let Some(parent_group) = plan.layout_of(node).parent else {
            return local;
        };
        let walk_parent = self.visits.get(element).and_then(|visit| visit.parent.clone());
        match walk_parent {
            Some(parent) => local.and(self.evaluate(Stage::Match, parent_group, &parent)),
            None => TestResult::NotPassed,
        }
    }

    fn reference(&mut self, node: NodeId, variable: &str, target: Option<&M::Element>) -> TestResult {
        let definer = match self.contexts[node.index()].get(variable) {
            None | Some(Binding::Any) => return TestResult::Passed,
            Some(Binding::Exact(bound)) => return TestResult::from_bool(target == Some(bound)),
            Some(Binding::Definer(definer)) => *definer,
        };
        let Some(target) = target else {
            return TestResult::NotPassed;
        };
        if !self.visits.contains_key(target) {
            return self.unwalked();
        }
        self.evaluate(Stage::Match, definer, target)
    }

    fn unwalked(&self) -> TestResult {
        if self.closed {
            TestResult::NotPassed
        } else {
            TestResult::Deferred
        }
    }
}

struct NodeScope<'p, 'a, M: ElementModel> {
    progress: &'p mut Progress<'a, M>,
    node: NodeId,
}

impl<M: ElementModel> Scope<M::Element> for NodeScope<'_, '_, M> {
    fn reference(&mut self, variable: &str, target: Option<&M::Element>) -> TestResult {
        self.progress.reference(self.node, variable, target)
    }
}

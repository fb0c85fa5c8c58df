use indexmap::IndexMap;
use log::debug;

use crate::binder::{Continuation, Flow};
use crate::error::Result;
use crate::goal::Conjunction;
use crate::predicate::{Fact, Predicate, Rule};
use crate::store::Store;
use crate::term::Term;

/// One solution, as the named variables of the query store see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Each named variable, fully resolved. Unbound ones stay `Ref`.
    pub bindings: IndexMap<String, Term>,
}

impl Answer {
    /// Read every named variable of `store`.
    #[must_use]
    pub fn from_store(store: &Store) -> Self {
        let bindings = store
            .named_vars()
            .map(|(name, handle)| (name.to_string(), store.reify(&handle.term())))
            .collect();
        Self { bindings }
    }

    /// The resolved term of the variable called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings.get(name)
    }
}

/// The resolution engine: an ordered database of facts and rules.
///
/// Solutions come out depth-first, goals left to right, predicates in
/// declaration order. Every predicate that matches a goal is tried; there is
/// no indexing and no cut.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    predicates: Vec<Predicate>,
}

impl Engine {
    /// Create an empty engine
    #[must_use]
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Append a predicate to the database.
    pub fn add(&mut self, predicate: impl Into<Predicate>) {
        self.predicates.push(predicate.into());
    }

    /// Add a fact, captured as `term` currently resolves in `store`.
    pub fn add_fact(&mut self, store: &Store, term: impl Into<Term>) {
        let fact = Fact::new(store, term);
        debug!("add fact #{} ({} vars)", self.predicates.len(), fact.vars());
        self.add(fact);
    }

    /// Add the rule `head :- body`, captured as it currently resolves in
    /// `store`.
    pub fn add_rule(&mut self, store: &Store, head: impl Into<Term>, body: impl Into<Conjunction>) {
        let rule = Rule::new(store, head, body);
        debug!(
            "add rule #{} ({} goals, {} vars)",
            self.predicates.len(),
            rule.body_len(),
            rule.vars()
        );
        self.add(rule);
    }

    /// The database, in declaration order.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Number of predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Whether the database is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Resolve `goals` in continuation-passing style.
    ///
    /// The empty conjunction calls `continuation` once. Otherwise each
    /// predicate is tried on the first goal in turn, and every match
    /// continues with the remaining goals before the next predicate is
    /// tried. Recursion depth grows with the length of the proof; prefer
    /// [`Engine::solve`] for long derivations.
    ///
    /// # Errors
    ///
    /// Whatever `continuation` returns. An error abandons every remaining
    /// alternative.
    pub fn resolve(
        &self,
        store: &Store,
        goals: &[Term],
        continuation: &mut Continuation<'_>,
    ) -> Result<Flow> {
        let Some((goal, rest)) = goals.split_first() else {
            return continuation(store);
        };
        for predicate in &self.predicates {
            let flow = predicate.resolve(self, store, goal, &mut |next: &Store| {
                self.resolve(next, rest, continuation)
            })?;
            if flow.is_stop() {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Enumerate the solutions of `goals` lazily.
    ///
    /// Each item is the store holding one solution's bindings. The search
    /// keeps its choice points on the heap, so proof depth is not bounded by
    /// the native stack. Solutions arrive in the same order as with
    /// [`Engine::resolve`].
    pub fn solve(&self, store: &Store, goals: impl Into<Conjunction>) -> Solutions<'_> {
        let goals: Conjunction = goals.into();
        Solutions {
            predicates: &self.predicates,
            stack: vec![Frame {
                store: store.clone(),
                goals: goals.into_iter().collect(),
                next: 0,
            }],
        }
    }

    /// Call `continuation` once per solution of `goals`, until the search is
    /// exhausted or the continuation returns [`Flow::Stop`].
    ///
    /// `store` is never modified: after this returns, however it returns,
    /// the caller's store is exactly what it was before.
    ///
    /// # Errors
    ///
    /// Whatever `continuation` returns. An error ends the search.
    pub fn query<F>(
        &self,
        store: &Store,
        goals: impl Into<Conjunction>,
        mut continuation: F,
    ) -> Result<Flow>
    where
        F: FnMut(&Store) -> Result<Flow>,
    {
        let goals: Conjunction = goals.into();
        debug!("query with {} goals", goals.len());
        let mut count = 0usize;
        for solution in self.solve(store, goals) {
            count += 1;
            if continuation(&solution)?.is_stop() {
                debug!("query stopped after {count} solutions");
                return Ok(Flow::Stop);
            }
        }
        debug!("query exhausted after {count} solutions");
        Ok(Flow::Continue)
    }

    /// Returns every solution of `goals` as named-variable bindings.
    #[must_use]
    pub fn answers(&self, store: &Store, goals: impl Into<Conjunction>) -> Vec<Answer> {
        self.solve(store, goals)
            .map(|solution| Answer::from_store(&solution))
            .collect()
    }

    /// Returns whether `goals` has at least one solution
    #[must_use]
    pub fn ask(&self, store: &Store, goals: impl Into<Conjunction>) -> bool {
        self.solve(store, goals).next().is_some()
    }
}

/// One choice point: a store version, the goals still to prove under it,
/// and the next predicate to try on the first of them.
#[derive(Debug)]
struct Frame {
    store: Store,
    goals: im::Vector<Term>,
    next: usize,
}

/// Lazy iterator over the solutions of a query. See [`Engine::solve`].
#[derive(Debug)]
pub struct Solutions<'e> {
    predicates: &'e [Predicate],
    stack: Vec<Frame>,
}

impl Iterator for Solutions<'_> {
    type Item = Store;

    fn next(&mut self) -> Option<Store> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(goal) = frame.goals.front().cloned() else {
                return self.stack.pop().map(|frame| frame.store);
            };
            let Some(predicate) = self.predicates.get(frame.next) else {
                self.stack.pop();
                continue;
            };
            frame.next += 1;

            if let Some(activation) = predicate.activate(&frame.store, &goal) {
                let mut goals = frame.goals.skip(1);
                for body_goal in activation.body.into_iter().rev() {
                    goals.push_front(body_goal);
                }
                let store = activation.store.with_substitution(&activation.substitution);
                self.stack.push(Frame {
                    store,
                    goals,
                    next: 0,
                });
            }
        }
    }
}

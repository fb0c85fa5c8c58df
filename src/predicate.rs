use indexmap::IndexSet;

use crate::binder::{try_binding, Continuation, Flow};
use crate::engine::Engine;
use crate::error::Result;
use crate::goal::Conjunction;
use crate::store::Store;
use crate::term::{Reference, Term};
use crate::unify::{unify_head, Substitution};

/// A clause stored with its variables renumbered `0..vars`.
///
/// Renumbering happens once, when the clause enters the database, so no two
/// clauses share a variable and the clause no longer depends on the store it
/// was built in. Each activation shifts the numbers onto freshly reserved
/// references.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Template {
    terms: Vec<Term>,
    vars: u64,
}

impl Template {
    fn new(store: &Store, terms: &[Term]) -> Self {
        // slots are numbered in order of first mention across all terms
        let mut slots: IndexSet<Reference> = IndexSet::new();
        let terms = terms
            .iter()
            .map(|term| {
                store.reify(term).map_refs(&mut |reference| {
                    let (slot, _) = slots.insert_full(reference);
                    Term::Ref(Reference(slot as u64))
                })
            })
            .collect();
        Self {
            terms,
            vars: slots.len() as u64,
        }
    }

    /// Copy the clause onto fresh references reserved in `store`.
    fn instantiate(&self, store: &mut Store) -> Vec<Term> {
        if self.vars == 0 {
            return self.terms.clone();
        }
        let base = store.reserve(self.vars);
        self.terms
            .iter()
            .map(|term| term.map_refs(&mut |slot| Term::Ref(base.offset(slot.index()))))
            .collect()
    }
}

/// An unconditional truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    template: Template,
}

impl Fact {
    /// Capture `term` as it currently resolves in `store`.
    #[must_use]
    pub fn new(store: &Store, term: impl Into<Term>) -> Self {
        Self {
            template: Template::new(store, &[term.into()]),
        }
    }

    /// Number of distinct variables in the fact.
    #[must_use]
    pub fn vars(&self) -> u64 {
        self.template.vars
    }
}

/// A head that holds when every goal of its body holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    template: Template,
}

impl Rule {
    /// Capture `head :- body` as they currently resolve in `store`.
    /// Head and body share variables by reference.
    #[must_use]
    pub fn new(store: &Store, head: impl Into<Term>, body: impl Into<Conjunction>) -> Self {
        let body: Conjunction = body.into();
        let mut terms = vec![head.into()];
        terms.extend(body);
        Self {
            template: Template::new(store, &terms),
        }
    }

    /// Number of goals in the body.
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.template.terms.len() - 1
    }

    /// Number of distinct variables across head and body.
    #[must_use]
    pub fn vars(&self) -> u64 {
        self.template.vars
    }
}

/// A successful head match of one predicate activation.
#[derive(Debug, Clone)]
pub struct Activation {
    /// The store the fresh variables were reserved in, before binding.
    pub store: Store,
    /// Bindings that make the renamed head equal to the goal.
    pub substitution: Substitution,
    /// The renamed body still to prove; empty for facts.
    pub body: Conjunction,
}

/// A database entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// An unconditional truth.
    Fact(Fact),
    /// A conditional truth.
    Rule(Rule),
}

impl Predicate {
    /// Rename this predicate apart and unify its head with `goal`.
    ///
    /// Returns `None` when the head does not match; that is an empty branch,
    /// not an error.
    #[must_use]
    pub fn activate(&self, store: &Store, goal: &Term) -> Option<Activation> {
        let template = match self {
            Predicate::Fact(fact) => &fact.template,
            Predicate::Rule(rule) => &rule.template,
        };
        let mut store = store.clone();
        let fresh = store.next_ref();
        let mut terms = template.instantiate(&mut store).into_iter();
        let head = terms.next()?;
        let substitution = unify_head(&store, &head, goal, fresh)?;
        Some(Activation {
            store,
            substitution,
            body: terms.collect(),
        })
    }

    /// Resolve `goal` against this predicate alone, calling `continuation`
    /// once per solution.
    ///
    /// A fact succeeds at most once. A rule hands its body to `engine` and
    /// succeeds once per body solution.
    ///
    /// # Errors
    ///
    /// Whatever `continuation` returns.
    pub fn resolve(
        &self,
        engine: &Engine,
        store: &Store,
        goal: &Term,
        continuation: &mut Continuation<'_>,
    ) -> Result<Flow> {
        let Some(activation) = self.activate(store, goal) else {
            return Ok(Flow::Continue);
        };
        match self {
            Predicate::Fact(_) => try_binding(
                &activation.store,
                &activation.substitution,
                |next| continuation(next),
            ),
            Predicate::Rule(_) => try_binding(
                &activation.store,
                &activation.substitution,
                |next| engine.resolve(next, activation.body.goals(), continuation),
            ),
        }
    }
}

impl From<Fact> for Predicate {
    fn from(fact: Fact) -> Self {
        Predicate::Fact(fact)
    }
}

impl From<Rule> for Predicate {
    fn from(rule: Rule) -> Self {
        Predicate::Rule(rule)
    }
}

use indexmap::IndexMap;
use log::trace;
use smallvec::SmallVec;

use crate::store::Store;
use crate::term::{Reference, Step, Term};

/// Bindings produced by one unification, in discovery order.
///
/// A reference appears at most once. Entries may mention references bound
/// by other entries. Stores resolve those chains on read, and
/// [`Substitution::fixed`] resolves them eagerly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: IndexMap<Reference, Term>,
}

impl Substitution {
    /// Create an empty substitution
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding. Rebinding a reference replaces its term in place.
    pub fn push(&mut self, reference: Reference, term: Term) {
        self.bindings.insert(reference, term);
    }

    /// The term bound to `reference`, if any.
    #[must_use]
    pub fn get(&self, reference: Reference) -> Option<&Term> {
        self.bindings.get(&reference)
    }

    /// Whether no bindings were needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Iterate bindings in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (Reference, &Term)> + '_ {
        self.bindings.iter().map(|(&reference, term)| (reference, term))
    }

    /// Substitute every entry through all the others, so that no term
    /// mentions a reference bound by this substitution.
    #[must_use]
    pub fn fixed(&self) -> Substitution {
        let bindings = self
            .bindings
            .iter()
            .map(|(&reference, term)| (reference, self.expand(term)))
            .collect();
        Substitution { bindings }
    }

    fn expand(&self, term: &Term) -> Term {
        term.rebuild(|node| match self.walk(node) {
            Term::Pair(first, second) => Step::Split(first, second),
            other => Step::Done(other.clone()),
        })
    }

    fn walk<'a>(&'a self, mut term: &'a Term) -> &'a Term {
        while let Term::Ref(reference) = term {
            match self.bindings.get(reference) {
                Some(bound) => term = bound,
                None => break,
            }
        }
        term
    }
}

impl IntoIterator for Substitution {
    type Item = (Reference, Term);
    type IntoIter = indexmap::map::IntoIter<Reference, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.into_iter()
    }
}

/// Follow a term through the pending substitution and the store.
fn deref(store: &Store, subst: &Substitution, term: &Term) -> Term {
    deref_traced(store, subst, term).0
}

/// Like [`deref`], also reporting whether a pending binding was crossed.
fn deref_traced(store: &Store, subst: &Substitution, term: &Term) -> (Term, bool) {
    let mut current = store.walk(term);
    let mut crossed = false;
    while let Term::Ref(reference) = current {
        match subst.get(*reference) {
            Some(bound) => {
                current = store.walk(bound);
                crossed = true;
            }
            None => break,
        }
    }
    (current.clone(), crossed)
}

/// Does `var` occur anywhere inside `term`?
fn occurs(store: &Store, subst: &Substitution, var: Reference, term: &Term) -> bool {
    let mut stack: SmallVec<[Term; 16]> = SmallVec::new();
    stack.push(term.clone());

    while let Some(t) = stack.pop() {
        match &deref(store, subst, &t) {
            Term::Ref(reference) => {
                if *reference == var {
                    return true;
                }
            }
            Term::Pair(first, second) => {
                stack.push(Term::clone(second));
                stack.push(Term::clone(first));
            }
            Term::Const(_) => {}
        }
    }

    false
}

/// Unify two terms as seen through `store`.
///
/// Returns the bindings that make both terms structurally equal, or `None`
/// if they cannot be unified. No partial substitution is ever returned.
/// A variable never binds to a structure that contains it.
#[must_use]
pub fn unify(store: &Store, left: &Term, right: &Term) -> Option<Substitution> {
    unify_from(store, left, right, None)
}

/// Unify a freshly renamed clause head with a goal.
///
/// `fresh` is the first reference reserved for the head's variables; the
/// goal and every binding in `store` must only mention older references.
/// While every pending binding is on a fresh reference, a goal subterm
/// reached without crossing one of them cannot contain a fresh variable, so
/// binding a fresh variable to it skips the occurs-check. Otherwise this is
/// [`unify`].
pub(crate) fn unify_head(
    store: &Store,
    head: &Term,
    goal: &Term,
    fresh: Reference,
) -> Option<Substitution> {
    unify_from(store, head, goal, Some(fresh))
}

fn unify_from(
    store: &Store,
    left: &Term,
    right: &Term,
    fresh: Option<Reference>,
) -> Option<Substitution> {
    let is_fresh = |reference: Reference| fresh.is_some_and(|first| reference >= first);
    let mut subst = Substitution::new();
    // set once a reference older than `fresh` is bound
    let mut old_bound = false;
    // the flag: the right-hand side was reached without crossing `subst`
    let mut worklist: SmallVec<[(Term, Term, bool); 32]> = SmallVec::new();
    worklist.push((left.clone(), right.clone(), true));

    while let Some((a, b, untouched)) = worklist.pop() {
        let a = deref(store, &subst, &a);
        let (b, crossed) = deref_traced(store, &subst, &b);
        let untouched = untouched && !crossed;

        match (&a, &b) {
            (Term::Ref(x), Term::Ref(y)) if x == y => {}
            (Term::Ref(var), other) | (other, Term::Ref(var)) => {
                let var = *var;
                let unseen =
                    a.as_reference() == Some(var) && untouched && !old_bound && is_fresh(var);
                if !unseen && occurs(store, &subst, var, other) {
                    trace!("occurs check failed for {var}");
                    return None;
                }
                if fresh.is_some() && !is_fresh(var) {
                    old_bound = true;
                }
                subst.push(var, other.clone());
            }
            (Term::Const(x), Term::Const(y)) => {
                if x != y {
                    trace!("constant mismatch: {x} vs {y}");
                    return None;
                }
            }
            (Term::Pair(a1, a2), Term::Pair(b1, b2)) => {
                // second halves go underneath so the first halves bind first
                worklist.push((Term::clone(a2), Term::clone(b2), untouched));
                worklist.push((Term::clone(a1), Term::clone(b1), untouched));
            }
            (a, b) => {
                trace!("shape mismatch: {} vs {}", a.kind(), b.kind());
                return None;
            }
        }
    }

    Some(subst)
}

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::term::{Handle, Reference, Step, Term, Value};
use crate::unify::Substitution;

/// The binding universe at one point of a search.
///
/// A store is a persistent value: [`Store::with_substitution`] returns a new
/// version that shares every untouched binding with its parent, and no
/// operation on the new version is visible through the old one. Cloning is
/// cheap, so backtracking is just dropping the child version.
///
/// Bound terms are never rewritten when new bindings arrive. Every read walks
/// `Ref` chains through the bindings of the version it is called on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    /// Every reference bound to a term
    bindings: im::HashMap<Reference, Term>,
    /// Source-level variable names, in first-mention order
    named_vars: Arc<IndexMap<String, Reference>>,
    next_ref: u64,
}

impl Store {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, unbound reference.
    pub fn allocate(&mut self) -> Reference {
        let reference = Reference(self.next_ref);
        self.next_ref += 1;
        reference
    }

    /// Allocate `count` contiguous references and return the first.
    pub fn reserve(&mut self, count: u64) -> Reference {
        let first = Reference(self.next_ref);
        self.next_ref += count;
        first
    }

    /// The reference the next allocation will return.
    #[must_use]
    pub fn next_ref(&self) -> Reference {
        Reference(self.next_ref)
    }

    /// Number of bound references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Return the variable called `name`, creating it on first mention.
    ///
    /// Mentioning the same name twice on the same store yields the same
    /// reference.
    pub fn make_variable(&mut self, name: &str) -> Handle {
        if let Some(&reference) = self.named_vars.get(name) {
            return Handle::new(reference);
        }
        let reference = self.allocate();
        Arc::make_mut(&mut self.named_vars).insert(name.to_string(), reference);
        Handle::new(reference)
    }

    /// Look up a named variable without creating it.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<Handle> {
        self.named_vars.get(name).copied().map(Handle::new)
    }

    /// Iterate named variables in first-mention order.
    pub fn named_vars(&self) -> impl Iterator<Item = (&str, Handle)> + '_ {
        self.named_vars
            .iter()
            .map(|(name, &reference)| (name.as_str(), Handle::new(reference)))
    }

    /// An anonymous variable, distinct from every other.
    pub fn fresh_variable(&mut self) -> Handle {
        Handle::new(self.allocate())
    }

    /// Build a constant leaf.
    pub fn make_const(&mut self, value: impl Into<Value>) -> Handle {
        let reference = self.allocate();
        self.bindings.insert(reference, Term::Const(value.into()));
        Handle::new(reference)
    }

    /// The `Nil` constant used to terminate lists.
    pub fn nil(&mut self) -> Handle {
        self.make_const(Value::Nil)
    }

    /// Build a pair node.
    ///
    /// Each side is stored as what it currently resolves to: the bound term
    /// if the handle is bound, otherwise a bare `Ref`, so later bindings of
    /// that child are seen through the pair.
    pub fn pair(&mut self, first: Handle, second: Handle) -> Handle {
        let node = Term::pair(self.node(first), self.node(second));
        let reference = self.allocate();
        self.bindings.insert(reference, node);
        Handle::new(reference)
    }

    /// Build a proper list of `items`, terminated by `Nil`.
    pub fn list(&mut self, items: &[Handle]) -> Handle {
        let mut tail = self.nil();
        for &item in items.iter().rev() {
            tail = self.pair(item, tail);
        }
        tail
    }

    /// Build `functor(args...)` as `pair(functor, list(args))`.
    pub fn compound(&mut self, functor: impl Into<Value>, args: &[Handle]) -> Handle {
        let head = self.make_const(functor);
        let tail = self.list(args);
        self.pair(head, tail)
    }

    fn node(&self, handle: Handle) -> Term {
        let reference = handle.reference();
        self.bindings
            .get(&reference)
            .cloned()
            .unwrap_or(Term::Ref(reference))
    }

    /// The term bound to `reference`, if any.
    #[must_use]
    pub fn bound(&self, reference: Reference) -> Option<&Term> {
        self.bindings.get(&reference)
    }

    /// Whether `reference` is bound in this version.
    #[must_use]
    pub fn is_bound(&self, reference: Reference) -> bool {
        self.bindings.contains_key(&reference)
    }

    /// Follow `Ref` chains until reaching a structure or an unbound reference.
    #[must_use]
    pub fn walk<'a>(&'a self, mut term: &'a Term) -> &'a Term {
        while let Term::Ref(reference) = term {
            match self.bindings.get(reference) {
                Some(bound) => term = bound,
                None => break,
            }
        }
        term
    }

    /// Shallow resolution: the top-level shape of `term` in this version.
    #[must_use]
    pub fn resolve(&self, term: impl Into<Term>) -> Term {
        let term = term.into();
        self.walk(&term).clone()
    }

    /// Deep resolution: `term` with every bound reference replaced.
    /// Unbound references stay as `Ref`.
    #[must_use]
    pub fn reify(&self, term: &Term) -> Term {
        term.rebuild(|node| match self.walk(node) {
            Term::Pair(first, second) => Step::Split(first, second),
            other => Step::Done(other.clone()),
        })
    }

    /// The payload of a constant leaf.
    ///
    /// # Errors
    ///
    /// [`Error::UnboundAccess`] if the term is an unbound variable,
    /// [`Error::ShapeMismatch`] if it is a pair.
    pub fn value_of(&self, term: impl Into<Term>) -> Result<Value> {
        let term = term.into();
        match self.walk(&term) {
            Term::Const(value) => Ok(value.clone()),
            Term::Ref(reference) => Err(Error::UnboundAccess(*reference)),
            found @ Term::Pair(..) => Err(Error::ShapeMismatch {
                expected: "constant",
                found: found.kind(),
            }),
        }
    }

    /// The first element of a pair.
    ///
    /// # Errors
    ///
    /// [`Error::UnboundAccess`] if the term is an unbound variable,
    /// [`Error::ShapeMismatch`] if it is a constant.
    pub fn car(&self, term: impl Into<Term>) -> Result<Term> {
        self.split(&term.into()).map(|(first, _)| first)
    }

    /// The second element of a pair.
    ///
    /// # Errors
    ///
    /// Same as [`Store::car`].
    pub fn cdr(&self, term: impl Into<Term>) -> Result<Term> {
        self.split(&term.into()).map(|(_, second)| second)
    }

    fn split(&self, term: &Term) -> Result<(Term, Term)> {
        match self.walk(term) {
            Term::Pair(first, second) => Ok((Term::clone(first), Term::clone(second))),
            Term::Ref(reference) => Err(Error::UnboundAccess(*reference)),
            found @ Term::Const(_) => Err(Error::ShapeMismatch {
                expected: "pair",
                found: found.kind(),
            }),
        }
    }

    /// Unbound references reachable from `term`, in first-occurrence order.
    #[must_use]
    pub fn free_vars(&self, term: &Term) -> IndexSet<Reference> {
        let mut vars = IndexSet::new();
        let mut stack: SmallVec<[&Term; 16]> = SmallVec::new();
        stack.push(term);

        while let Some(next) = stack.pop() {
            match self.walk(next) {
                Term::Ref(reference) => {
                    vars.insert(*reference);
                }
                Term::Pair(first, second) => {
                    stack.push(second);
                    stack.push(first);
                }
                Term::Const(_) => {}
            }
        }

        vars
    }

    /// Copy `term` with each free variable replaced by a fresh reference.
    pub fn rename(&mut self, term: &Term) -> Term {
        self.rename_all(std::slice::from_ref(term))
            .pop()
            .unwrap_or_else(|| term.clone())
    }

    /// Rename several terms together, so a variable shared between them maps
    /// to the same fresh reference in every copy.
    pub fn rename_all(&mut self, terms: &[Term]) -> Vec<Term> {
        let reified: Vec<Term> = terms.iter().map(|term| self.reify(term)).collect();
        let mut fresh: IndexMap<Reference, Reference> = IndexMap::new();
        let mut renamed = Vec::with_capacity(reified.len());
        for term in &reified {
            renamed.push(term.map_refs(&mut |old| {
                let new = *fresh.entry(old).or_insert_with(|| {
                    let reference = Reference(self.next_ref);
                    self.next_ref += 1;
                    reference
                });
                Term::Ref(new)
            }));
        }
        renamed
    }

    /// A new version with `substitution` applied. `self` is left untouched.
    ///
    /// Entries are inserted as they are. One that mentions a reference bound
    /// by another entry is resolved on read, like any other chain; the
    /// occurs-check in [`unify`](crate::unify()) keeps those chains finite.
    #[must_use]
    pub fn with_substitution(&self, substitution: &Substitution) -> Store {
        let mut next = self.clone();
        for (reference, term) in substitution.iter() {
            next.bindings.insert(reference, term.clone());
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Term {
        Term::Const(Value::Int(n))
    }

    #[test]
    fn test_const_value() {
        let mut store = Store::new();
        let nil = store.nil();
        let n = store.make_const(123);
        assert_eq!(store.value_of(nil).unwrap(), Value::Nil);
        assert_eq!(store.value_of(n).unwrap(), Value::Int(123));
    }

    #[test]
    fn test_pair_decomposition() {
        let mut store = Store::new();
        let nil = store.nil();
        let three = store.make_const(3);
        let p = store.pair(nil, three);

        assert_eq!(store.value_of(store.car(p).unwrap()).unwrap(), Value::Nil);
        assert_eq!(store.value_of(store.cdr(p).unwrap()).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_nested_pairs_with_variable() {
        let mut store = Store::new();
        let nil = store.nil();
        let one = store.make_const(1);
        let left = store.pair(nil, one);
        let v = store.make_variable("v");
        let three = store.make_const(3);
        let right = store.pair(v, three);
        let t = store.pair(left, right);

        let car = store.car(t).unwrap();
        assert_eq!(store.value_of(store.car(car.clone()).unwrap()).unwrap(), Value::Nil);
        assert_eq!(store.value_of(store.cdr(car).unwrap()).unwrap(), Value::Int(1));
        let cdr = store.cdr(t).unwrap();
        assert_eq!(store.value_of(store.cdr(cdr.clone()).unwrap()).unwrap(), Value::Int(3));
        assert!(matches!(
            store.value_of(store.car(cdr).unwrap()),
            Err(Error::UnboundAccess(r)) if r == v.reference()
        ));
    }

    #[test]
    fn test_variables_shared_by_name() {
        let mut store = Store::new();
        let a = store.make_variable("1");
        let b = store.make_variable("2");
        let c = store.make_variable("1");
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(store.named("2"), Some(b));
        assert_eq!(store.named("3"), None);
        let names: Vec<&str> = store.named_vars().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["1", "2"]);
    }

    #[test]
    fn test_unbound_access_is_an_error() {
        let mut store = Store::new();
        let one = store.make_const(1);
        let z = store.make_variable("z");
        let t = store.pair(one, z);
        assert_eq!(store.value_of(store.car(t).unwrap()).unwrap(), Value::Int(1));
        assert!(matches!(store.value_of(z), Err(Error::UnboundAccess(_))));
        assert!(matches!(store.car(z), Err(Error::UnboundAccess(_))));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut store = Store::new();
        let one = store.make_const(1);
        let p = store.pair(one, one);
        assert!(matches!(
            store.car(one),
            Err(Error::ShapeMismatch { expected: "pair", found: "constant" })
        ));
        assert!(matches!(
            store.value_of(p),
            Err(Error::ShapeMismatch { expected: "constant", found: "pair" })
        ));
    }

    #[test]
    fn test_list_and_compound_layout() {
        let mut store = Store::new();
        let one = store.make_const(1);
        let two = store.make_const(2);
        let list = store.list(&[one, two]);
        assert_eq!(
            store.reify(&list.term()),
            Term::pair(int(1), Term::pair(int(2), Term::Const(Value::Nil)))
        );

        let x = store.make_variable("X");
        let goal = store.compound("member", &[x, list]);
        let reified = store.reify(&goal.term());
        assert_eq!(
            store.value_of(store.car(goal).unwrap()).unwrap(),
            Value::from("member")
        );
        assert_eq!(store.free_vars(&reified).into_iter().collect::<Vec<_>>(), vec![
            x.reference()
        ]);
    }

    #[test]
    fn test_substitution_visible_through_containers() {
        let mut store = Store::new();
        let x = store.make_variable("x");
        let one = store.make_const(1);
        let p = store.pair(x, one);

        let mut subst = Substitution::new();
        subst.push(x.reference(), int(5));
        let next = store.with_substitution(&subst);

        assert_eq!(next.reify(&p.term()), Term::pair(int(5), int(1)));
        // the parent version never sees the binding
        assert_eq!(store.reify(&p.term()), Term::pair(x.term(), int(1)));
        assert!(!store.is_bound(x.reference()));
    }

    #[test]
    fn test_with_substitution_resolves_chains_on_read() {
        let mut store = Store::new();
        let x = store.make_variable("x");
        let y = store.make_variable("y");

        let mut subst = Substitution::new();
        subst.push(x.reference(), Term::pair(y.term(), int(2)));
        subst.push(y.reference(), int(1));
        let next = store.with_substitution(&subst);

        // stored as given, seen through
        assert_eq!(
            next.bound(x.reference()),
            Some(&Term::pair(y.term(), int(2)))
        );
        assert_eq!(next.reify(&x.term()), Term::pair(int(1), int(2)));
        assert_eq!(next.value_of(next.car(x).unwrap()).unwrap(), Value::Int(1));
        assert_eq!(next.value_of(y).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_long_list_reify_and_free_vars() {
        let mut store = Store::new();
        let mut items: Vec<Handle> = (0..20_000).map(|n| store.make_const(n)).collect();
        let hole = store.make_variable("Hole");
        items.push(hole);
        let list = store.list(&items);

        let reified = store.reify(&list.term());
        let mut cell = &reified;
        let mut len = 0;
        while let Term::Pair(_, rest) = cell {
            len += 1;
            cell = rest;
        }
        assert_eq!(len, 20_001);
        assert_eq!(*cell, Term::Const(Value::Nil));

        let vars = store.free_vars(&list.term());
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec![hole.reference()]);
    }

    #[test]
    fn test_rename_all_is_consistent() {
        let mut store = Store::new();
        let x = store.make_variable("x");
        let y = store.make_variable("y");
        let head = store.pair(x, y);
        let body = store.pair(y, x);

        let before = store.next_ref();
        let renamed = store.rename_all(&[head.term(), body.term()]);
        let vars = store.free_vars(&renamed[0]);
        assert_eq!(vars.len(), 2);
        assert!(vars.iter().all(|r| *r >= before));
        assert!(!vars.contains(&x.reference()));

        let (a, b) = match (&renamed[0], &renamed[1]) {
            (Term::Pair(a1, b1), Term::Pair(a2, b2)) => {
                assert_eq!(a1, b2);
                assert_eq!(b1, a2);
                (a1.clone(), b1.clone())
            }
            _ => panic!("renaming changed the shape"),
        };
        assert_ne!(a, b);
    }

    #[test]
    fn test_rename_leaves_constants() {
        let mut store = Store::new();
        let one = store.make_const(1);
        let renamed = store.rename(&one.term());
        assert_eq!(renamed, int(1));
    }
}

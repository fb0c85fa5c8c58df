use std::fmt;
use std::mem;
use std::sync::{Arc, OnceLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identity of one logical variable slot.
///
/// References are allocated monotonically by a [`Store`](crate::Store) and
/// are never reused along one store lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reference(pub u64);

impl Reference {
    /// The raw slot number.
    #[must_use]
    pub fn index(self) -> u64 {
        self.0
    }

    /// The reference `n` slots after this one.
    #[must_use]
    pub(crate) fn offset(self, n: u64) -> Self {
        Self(self.0 + n)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

/// Payload of a constant leaf. Equality is by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// The empty constant; terminates lists.
    Nil,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A string or symbol.
    Str(String),
}

impl Value {
    /// The integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The string payload, if this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is the `Nil` sentinel.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("[]"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Nil
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// A structural value: constant, pair, or reference to a variable slot.
///
/// A `Ref` inside a term is looked up in the current store whenever the term
/// is inspected, so bindings made after the term was built are seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Term {
    /// A leaf holding a value.
    Const(Value),
    /// A cons of two terms.
    Pair(Arc<Term>, Arc<Term>),
    /// A variable slot, bound or not depending on the store.
    Ref(Reference),
}

impl Term {
    /// Build a pair from two terms.
    #[must_use]
    pub fn pair(first: Term, second: Term) -> Self {
        Term::Pair(Arc::new(first), Arc::new(second))
    }

    /// Whether this is a constant leaf.
    #[must_use]
    pub fn is_const(&self) -> bool {
        matches!(self, Term::Const(_))
    }

    /// Whether this is a pair.
    #[must_use]
    pub fn is_pair(&self) -> bool {
        matches!(self, Term::Pair(..))
    }

    /// The reference, if this is a `Ref`.
    #[must_use]
    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Term::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Short name of the term's shape, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Term::Const(_) => "constant",
            Term::Pair(..) => "pair",
            Term::Ref(_) => "variable",
        }
    }

    /// Rewrite every `Ref` through `f`, leaving the rest of the shape intact.
    /// `f` sees references in left-to-right order.
    pub(crate) fn map_refs(&self, f: &mut impl FnMut(Reference) -> Term) -> Term {
        self.rebuild(|term| match term {
            Term::Pair(first, second) => Step::Split(first, second),
            Term::Ref(r) => Step::Done(f(*r)),
            Term::Const(_) => Step::Done(term.clone()),
        })
    }

    /// Rebuild `self` bottom-up with an explicit stack.
    ///
    /// `visit` is called on every node reached, first children before
    /// second ones, and decides whether the node is split into two children
    /// or replaced outright.
    pub(crate) fn rebuild<'a>(&'a self, mut visit: impl FnMut(&'a Term) -> Step<'a>) -> Term {
        // `None` marks a pair whose two children are on top of `built`
        let mut pending: Vec<Option<&'a Term>> = vec![Some(self)];
        let mut built: Vec<Term> = Vec::new();

        while let Some(next) = pending.pop() {
            match next.map(&mut visit) {
                Some(Step::Split(first, second)) => {
                    pending.push(None);
                    pending.push(Some(second));
                    pending.push(Some(first));
                }
                Some(Step::Done(term)) => built.push(term),
                None => {
                    if let (Some(second), Some(first)) = (built.pop(), built.pop()) {
                        built.push(Term::pair(first, second));
                    }
                }
            }
        }

        built.pop().unwrap_or_else(|| self.clone())
    }
}

/// What [`Term::rebuild`] does with one node.
pub(crate) enum Step<'a> {
    /// Rebuild a pair from these two children.
    Split(&'a Term, &'a Term),
    /// Use this term in place of the node.
    Done(Term),
}

/// Pairs are torn down with an explicit stack, so dropping a long list does
/// not recurse once per cell.
impl Drop for Term {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        detach_children(self, &mut stack);
        while let Some(child) = stack.pop() {
            if let Ok(mut term) = Arc::try_unwrap(child) {
                detach_children(&mut term, &mut stack);
            }
        }
    }
}

/// Move the uniquely owned pair children of `term` onto `stack`, leaving a
/// shared leaf in their place.
fn detach_children(term: &mut Term, stack: &mut Vec<Arc<Term>>) {
    if let Term::Pair(first, second) = term {
        for child in [first, second] {
            if Arc::get_mut(child).is_some_and(|inner| inner.is_pair()) {
                stack.push(mem::replace(child, hollow()));
            }
        }
    }
}

fn hollow() -> Arc<Term> {
    static HOLLOW: OnceLock<Arc<Term>> = OnceLock::new();
    Arc::clone(HOLLOW.get_or_init(|| Arc::new(Term::Const(Value::Nil))))
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Term::Const(value)
    }
}

impl From<Reference> for Term {
    fn from(r: Reference) -> Self {
        Term::Ref(r)
    }
}

impl From<Handle> for Term {
    fn from(h: Handle) -> Self {
        Term::Ref(h.reference())
    }
}

/// A lightweight name for a term node held in a [`Store`](crate::Store).
///
/// Every constructor on the store returns a handle; its content is whatever
/// the handle's reference resolves to in the store it is read through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(Reference);

impl Handle {
    pub(crate) fn new(reference: Reference) -> Self {
        Self(reference)
    }

    /// The reference naming this node.
    #[must_use]
    pub fn reference(self) -> Reference {
        self.0
    }

    /// This handle as a term.
    #[must_use]
    pub fn term(self) -> Term {
        Term::Ref(self.0)
    }
}

use crate::term::{Handle, Term};

/// An ordered sequence of goals that must all succeed.
///
/// "And" is concatenation, so conjunctions compose associatively and the
/// empty conjunction always succeeds exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conjunction {
    goals: Vec<Term>,
}

impl Conjunction {
    /// The empty conjunction
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A conjunction of one goal
    #[must_use]
    pub fn single(goal: impl Into<Term>) -> Self {
        Self {
            goals: vec![goal.into()],
        }
    }

    /// `self` followed by `other`.
    #[must_use]
    pub fn and(mut self, other: impl Into<Conjunction>) -> Self {
        self.goals.extend(other.into().goals);
        self
    }

    /// Append one goal.
    pub fn push(&mut self, goal: impl Into<Term>) {
        self.goals.push(goal.into());
    }

    /// The goals, left to right.
    #[must_use]
    pub fn goals(&self) -> &[Term] {
        &self.goals
    }

    /// Iterate the goals, left to right.
    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.goals.iter()
    }

    /// The first goal.
    #[must_use]
    pub fn head(&self) -> Option<&Term> {
        self.goals.first()
    }

    /// Everything after the first goal.
    #[must_use]
    pub fn tail(&self) -> &[Term] {
        self.goals.get(1..).unwrap_or_default()
    }

    /// Number of goals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.goals.len()
    }

    /// Whether there are no goals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

impl From<Term> for Conjunction {
    fn from(goal: Term) -> Self {
        Self::single(goal)
    }
}

impl From<Handle> for Conjunction {
    fn from(goal: Handle) -> Self {
        Self::single(goal)
    }
}

impl From<Vec<Term>> for Conjunction {
    fn from(goals: Vec<Term>) -> Self {
        Self { goals }
    }
}

impl From<&[Handle]> for Conjunction {
    fn from(goals: &[Handle]) -> Self {
        goals.iter().copied().collect()
    }
}

impl<const N: usize> From<[Handle; N]> for Conjunction {
    fn from(goals: [Handle; N]) -> Self {
        goals.into_iter().collect()
    }
}

impl<G: Into<Term>> FromIterator<G> for Conjunction {
    fn from_iter<I: IntoIterator<Item = G>>(iter: I) -> Self {
        Self {
            goals: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl IntoIterator for Conjunction {
    type Item = Term;
    type IntoIter = std::vec::IntoIter<Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.goals.into_iter()
    }
}

impl<'a> IntoIterator for &'a Conjunction {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.goals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Reference, Value};

    fn goal(n: u64) -> Term {
        Term::Ref(Reference(n))
    }

    #[test]
    fn test_and_is_concatenation() {
        let left = Conjunction::single(goal(1)).and(goal(2));
        let right = Conjunction::from(vec![goal(3), goal(4)]);
        let both = left.clone().and(right.clone());
        assert_eq!(both.goals(), &[goal(1), goal(2), goal(3), goal(4)]);

        let grouped = left.and(Conjunction::single(goal(3)).and(Conjunction::single(goal(4))));
        assert_eq!(grouped, both);
    }

    #[test]
    fn test_empty_is_identity() {
        let c = Conjunction::single(Term::Const(Value::Int(1)));
        assert_eq!(Conjunction::new().and(c.clone()), c);
        assert_eq!(c.clone().and(Conjunction::new()), c);
    }

    #[test]
    fn test_head_and_tail() {
        let c: Conjunction = vec![goal(1), goal(2), goal(3)].into();
        assert_eq!(c.head(), Some(&goal(1)));
        assert_eq!(c.tail(), &[goal(2), goal(3)]);

        let empty = Conjunction::new();
        assert_eq!(empty.head(), None);
        assert!(empty.tail().is_empty());
    }
}

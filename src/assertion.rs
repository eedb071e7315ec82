//! Comparisons that report a failure instead of panicking, so a scenario can
//! carry on reporting the steps after it.

use std::fmt::{self, Display};

/// How two values were expected to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `left == right`
    Eq,
    /// `left != right`
    Ne,
    /// `left < right`
    Lt,
    /// `left > right`
    Gt,
}

impl Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Eq => "==",
            Relation::Ne => "!=",
            Relation::Lt => "<",
            Relation::Gt => ">",
        })
    }
}

/// An expected relation that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{context}: expected {left} {relation} {right}")]
pub struct AssertionFailure {
    /// What was being checked.
    pub context: String,
    /// The expected relation.
    pub relation: Relation,
    /// The left-hand value.
    pub left: String,
    /// The right-hand value.
    pub right: String,
}

fn ensure<T: Display>(
    holds: bool,
    context: &str,
    relation: Relation,
    left: &T,
    right: &T,
) -> Result<(), AssertionFailure> {
    if holds {
        return Ok(());
    }
    Err(AssertionFailure {
        context: context.to_string(),
        relation,
        left: left.to_string(),
        right: right.to_string(),
    })
}

/// Require `left == right`.
pub fn ensure_eq<T: PartialEq + Display>(
    context: &str,
    left: T,
    right: T,
) -> Result<(), AssertionFailure> {
    ensure(left == right, context, Relation::Eq, &left, &right)
}

/// Require `left != right`.
pub fn ensure_ne<T: PartialEq + Display>(
    context: &str,
    left: T,
    right: T,
) -> Result<(), AssertionFailure> {
    ensure(left != right, context, Relation::Ne, &left, &right)
}

/// Require `left < right`.
pub fn ensure_lt<T: PartialOrd + Display>(
    context: &str,
    left: T,
    right: T,
) -> Result<(), AssertionFailure> {
    ensure(left < right, context, Relation::Lt, &left, &right)
}

/// Require `left > right`.
pub fn ensure_gt<T: PartialOrd + Display>(
    context: &str,
    left: T,
    right: T,
) -> Result<(), AssertionFailure> {
    ensure(left > right, context, Relation::Gt, &left, &right)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;

    #[test]
    fn holding_relations_pass() {
        ensure_eq("balance", U256::from(5), U256::from(5)).unwrap();
        ensure_ne("balance", U256::from(5), U256::ZERO).unwrap();
        ensure_lt("balance", U256::from(1), U256::from(2)).unwrap();
        ensure_gt("balance", U256::from(2), U256::from(1)).unwrap();
    }

    #[test]
    fn failure_describes_the_comparison() {
        let failure = ensure_gt("strategy balance after harvest", U256::from(3), U256::from(3))
            .unwrap_err();
        assert_eq!(failure.relation, Relation::Gt);
        assert_eq!(
            failure.to_string(),
            "strategy balance after harvest: expected 3 > 3"
        );
        assert!(ensure_lt("x", 2, 1).is_err());
        assert!(ensure_eq("x", "a", "b").is_err());
    }
}

//! # Pairlog
//!
//! A minimal Prolog-style resolution engine in Rust.
//!
//! ## Features
//!
//! - Terms built from constants, pairs and variables
//! - Unification with occurs-check
//! - Persistent binding stores, so backtracking is just dropping a version
//! - Depth-first resolution over facts and rules, as a lazy iterator or with
//!   success continuations
//!
//! ## Example
//!
//! ```rust
//! use pairlog::{Engine, Store, Value};
//!
//! let mut store = Store::new();
//! let mut engine = Engine::new();
//!
//! // member(X, [_|T]) :- member(X, T).
//! let x = store.make_variable("X");
//! let skip = store.fresh_variable();
//! let t = store.make_variable("T");
//! let cell = store.pair(skip, t);
//! let head = store.compound("member", &[x, cell]);
//! let body = store.compound("member", &[x, t]);
//! engine.add_rule(&store, head, body);
//!
//! // member(X, [X|_]).
//! let rest = store.fresh_variable();
//! let cell = store.pair(x, rest);
//! let fact = store.compound("member", &[x, cell]);
//! engine.add_fact(&store, fact);
//!
//! let q = store.make_variable("Q");
//! let items: Vec<_> = (1..=3).map(|n| store.make_const(n)).collect();
//! let list = store.list(&items);
//! let goal = store.compound("member", &[q, list]);
//!
//! let found: Vec<Value> = engine
//!     .solve(&store, goal)
//!     .map(|solution| solution.value_of(q))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(found, vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
//! # Ok::<(), pairlog::Error>(())
//! ```

/// Success continuations and the binding primitive.
pub mod binder;
/// Resolution engine.
pub mod engine;
/// Error types.
pub mod error;
/// Goal conjunctions.
pub mod goal;
/// Facts and rules.
pub mod predicate;
/// Versioned binding store.
pub mod store;
/// Terms, values and references.
pub mod term;
/// Unification.
pub mod unify;

pub use binder::{try_binding, unify_and_run, Continuation, Flow};
pub use engine::{Answer, Engine, Solutions};
pub use error::{Error, Result};
pub use goal::Conjunction;
pub use predicate::{Activation, Fact, Predicate, Rule};
pub use store::Store;
pub use term::{Handle, Reference, Term, Value};
pub use unify::{unify, Substitution};

//! graphfn - Graphite-style metrics expression engine
//!
//! Evaluates textual target expressions like
//! `summarize(scale(foo.bar,2),'1min','avg')` against time-series data.
//! Three cooperating pieces:
//!
//! - **Parser**: text to an [`ast::Expr`] tree; pure, no I/O
//! - **Planner**: walks the tree and emits the `(metric, from, until)`
//!   fetch requests it needs, with time-window rewrites for shifted and
//!   forecasted subexpressions
//! - **Evaluator**: ~70 aggregation, filtering, transformation, and
//!   ranking operators over aligned series
//!
//! Storage is someone else's problem: a fetcher resolves the planner's
//! requests into a [`types::ValuesMap`], and the evaluator reads from it.
//!
//! # Example
//!
//! ```rust
//! use graphfn::{eval, metric_requests, parse};
//! use graphfn::types::{MetricRequest, Series, ValuesMap};
//!
//! let (expr, rest) = parse("scale(foo.bar,2)").unwrap();
//! assert!(rest.is_empty());
//!
//! // Plan: one raw fetch, no time rewrites.
//! let requests = metric_requests(&expr);
//! assert_eq!(requests, vec![MetricRequest::new("foo.bar", 0, 0)]);
//!
//! // Fetch (stubbed here), keyed by the evaluation window.
//! let mut values = ValuesMap::new();
//! values.insert(
//!     MetricRequest::new("foo.bar", 0, 120),
//!     vec![Series::new("foo.bar", 0, 120, 60, vec![1.0, 2.0])],
//! );
//!
//! let out = eval(&expr, 0, 120, &values);
//! assert_eq!(out[0].name, "scale(foo.bar,2)");
//! assert_eq!(out[0].values, vec![2.0, 4.0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod error;
pub mod eval;
mod holtwinters;
pub mod interval;
pub mod parser;
pub mod planner;
pub mod stats;
pub mod types;

// Re-export the main entry points
pub use ast::Expr;
pub use error::{ErrorKind, ParseError};
pub use eval::eval;
pub use parser::parse;
pub use planner::metric_requests;
pub use types::{MetricRequest, RenderAttrs, Series, ValuesMap};

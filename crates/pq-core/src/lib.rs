//! # pq-core
//!
//! Mock analytical query engine for the Pulse dashboard. A [`QueryRequest`]
//! (time range, typed select expressions, group-by dimensions, filters,
//! ordering, limit) is classified into a [`QueryKind`] purely from its
//! structure, and a plausible `{fields, rows}` table is synthesized for it.
//!
//! - [`classify`]: total, pure query-shape inference.
//! - [`dimension`]: group-by value resolution with filter overrides.
//! - [`synth`]: per-function synthetic values.
//! - [`bucket`]: time bucket expansion.
//! - [`builders`]: row-shape builders, one per [`QueryKind`].
//! - [`assemble`]: ordering, quality top-N and limit.
//! - [`Engine`]: ties the above together behind an injectable RNG.

pub mod assemble;
pub mod bucket;
pub mod builders;
pub mod classify;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod generation;
pub mod hash;
pub mod request;
pub mod synth;

pub use classify::{classify, QueryKind};
pub use engine::{Engine, EngineOptions};
pub use error::{QueryError, Result};
pub use request::{
    DataType, Direction, Filter, FilterOperator, FunctionParam, OrderBy, QueryRequest,
    QueryResponse, SelectField, SelectFunction, TimeRange,
};

//! # Feedcheck Validator
//!
//! Concurrent validation engine for metadata-driven data quality checks.
//! This crate evaluates a [`RuleCatalog`](feedcheck_core::RuleCatalog)
//! against live data, including:
//!
//! - Schema checks (declared data type, mandatory fields)
//! - Constraint checks (numeric ranges, enumerations)
//! - Quality checks (uniqueness, row counts, completeness)
//! - Load behaviour (Insert/Append request modes)
//! - Feed file landing and scheduler job status
//!
//! Data is read through a [`DataSource`]: [`SqlSource`] runs SQL over
//! DataFusion tables, [`InMemorySource`] serves fixed tables.
//!
//! ## Example
//!
//! ```rust
//! use feedcheck_core::{EngineConfig, EnumerationCatalog, RuleBuilder, RuleCatalog, Selection};
//! use feedcheck_validator::{InMemorySource, MemoryTable, ValidationEngine};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let rule = RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "CUSTOMER_ID")
//!     .data_type("INTEGER")
//!     .unique(true)
//!     .build();
//! let catalog = RuleCatalog::new(vec![rule], EnumerationCatalog::new()).unwrap();
//!
//! let source = InMemorySource::new().with_table(
//!     "server1",
//!     "CUSTOMER_STG",
//!     MemoryTable::new().with_column("CUSTOMER_ID", "Int64", [1_i64, 2, 2]),
//! );
//!
//! let engine = ValidationEngine::new(EngineConfig::default()).unwrap();
//! let summary = engine.run(&catalog, &Selection::all(), Arc::new(source)).await;
//!
//! if summary.passed() {
//!     println!("Validation passed!");
//! } else {
//!     println!("Validation failed: {} failure(s)", summary.overall.fail);
//! }
//! # });
//! ```

mod checker;
mod constraints;
mod dataset;
mod engine;
mod error;
mod feeds;
mod jobs;
mod memory;
mod quality;
mod request;
mod schema;
mod source;
mod sql_source;
mod watermark;

pub use checker::*;
pub use constraints::*;
pub use dataset::*;
pub use engine::*;
pub use error::*;
pub use feeds::*;
pub use jobs::*;
pub use memory::*;
pub use quality::*;
pub use request::*;
pub use schema::*;
pub use source::*;
pub use sql_source::*;
pub use watermark::*;

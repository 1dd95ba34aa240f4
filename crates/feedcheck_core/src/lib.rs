//! # Feedcheck Core
//!
//! Core data structures for the feedcheck validation engine.
//!
//! Validation is driven by a metadata workbook: every row declares the
//! constraints of one column (type, nullability, uniqueness, range,
//! enumeration, load behaviour). This crate holds the typed form of those
//! rows and the types that flow out of a run.
//!
//! ## Key Concepts
//!
//! - **ValidationRule**: one normalized metadata row
//! - **RuleCatalog**: all rules and enumerations for a run
//! - **Selection**: the subset of feeds, databases and kinds to run
//! - **CheckOutcome**: PASS / FAIL / ERROR / SKIPPED for one check
//! - **ResultAggregator**: thread-safe collector producing a `ValidationSummary`
//!
//! ## Example
//!
//! ```rust
//! use feedcheck_core::{
//!     CheckKind, CheckOutcome, EnumerationCatalog, ResultAggregator, RuleBuilder, RuleCatalog,
//!     RunStatus, Selection,
//! };
//!
//! let rule = RuleBuilder::new("CUSTOMER_FEED", "server1", "CUSTOMER_STG", "AGE")
//!     .data_type("INTEGER")
//!     .range(0.0, 120.0)
//!     .build();
//! let catalog = RuleCatalog::new(vec![rule], EnumerationCatalog::new()).unwrap();
//!
//! let selected = catalog.select(&Selection::all().with_feeds(["CUSTOMER_FEED"]));
//! assert_eq!(selected.len(), 1);
//!
//! let aggregator = ResultAggregator::new();
//! aggregator.record(CheckOutcome::fail(
//!     selected[0].reference(),
//!     CheckKind::Range,
//!     "1 value(s) outside [0, 120]: 130",
//! ));
//! assert_eq!(aggregator.snapshot().status, RunStatus::Fail);
//! ```

pub mod builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metadata;
pub mod outcome;
pub mod rule;
pub mod selection;
pub mod summary;

pub use builder::*;
pub use catalog::*;
pub use config::*;
pub use error::*;
pub use metadata::*;
pub use outcome::*;
pub use rule::*;
pub use selection::*;
pub use summary::*;

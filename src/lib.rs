//! # Combine: Tag-Driven Batch Aggregation
//!
//! Combine discovers per-field directives on a batch of records, groups the
//! field values across the whole batch by the aggregate function they name,
//! calls each registered function once with all of its values, and writes the
//! per-item results back into the originating records.
//!
//! ## Features
//!
//! - **Field directives**: `"<function>"` or `"<function>,<output>"` declared in a record [`Schema`]
//! - **Handler registry**: thread-safe registration and lookup of [`AggregateHandler`]s
//! - **Cross-item batching**: one handler call per function per batch, in discovery order
//! - **Concurrent dispatch**: optional fork-join across functions
//! - **Flexible write-back**: results keyed by position or original value, written to a
//!   field (with safe coercion) or passed to a named callback (`fn:<name>`)
//!
//! ## Example
//!
//! ```
//! use combine::{Combine, CombineConfig, Context, FieldValue, HandlerError, Record, ResultMap, Schema};
//!
//! #[derive(Debug, Default)]
//! struct Item {
//!     id: i64,
//!     name: String,
//!     score: i64,
//!     items: Vec<String>,
//!     avg_score: f64,
//! }
//!
//! impl Record for Item {
//!     fn schema() -> Schema<Self> {
//!         Schema::new("Item")
//!             .tagged_field("ID", "combineItem,Items", |i: &Item| &i.id, |i: &mut Item| &mut i.id)
//!             .tagged_field("Name", "uppercase,Name", |i: &Item| &i.name, |i: &mut Item| &mut i.name)
//!             .tagged_field("Score", "avg_score,fn:SetAvg", |i: &Item| &i.score, |i: &mut Item| &mut i.score)
//!             .field("Items", |i: &Item| &i.items, |i: &mut Item| &mut i.items)
//!             .field("AvgScore", |i: &Item| &i.avg_score, |i: &mut Item| &mut i.avg_score)
//!             .callback("SetAvg", |i: &mut Item, v: f64| i.avg_score = v)
//!     }
//! }
//!
//! let engine = Combine::new(CombineConfig::default().with_concurrent(true));
//! engine.register("uppercase", |values: &[FieldValue], _ctx: &Context| {
//!     Ok::<_, HandlerError>(values.iter().map(|v| v.to_string().to_uppercase()).enumerate().collect::<ResultMap>())
//! });
//! engine.register("combineItem", |values: &[FieldValue], _ctx: &Context| {
//!     Ok::<_, HandlerError>(values.iter().map(|v| vec![format!("item-{}", v)]).enumerate().collect::<ResultMap>())
//! });
//! engine.register("avg_score", |values: &[FieldValue], _ctx: &Context| {
//!     let total: f64 = values.iter().filter_map(FieldValue::as_f64).sum();
//!     let avg = total / values.len() as f64;
//!     Ok::<_, HandlerError>((0..values.len()).map(|i| (i, avg)).collect::<ResultMap>())
//! });
//!
//! let mut items = vec![
//!     Item { id: 1, name: "alice".into(), score: 90, ..Default::default() },
//!     Item { id: 2, name: "bob".into(), score: 80, ..Default::default() },
//! ];
//! engine.process_records(&mut items).unwrap();
//!
//! assert_eq!(items[0].name, "ALICE");
//! assert_eq!(items[1].items, vec!["item-2"]);
//! assert_eq!(items[0].avg_score, 85.0);
//! ```

// Core modules
pub mod value;
pub mod directive;
pub mod context;
pub mod error;
pub mod handler;
pub mod registry;
pub mod record;
pub mod config;

// Processing pipeline
mod collector;
mod dispatcher;
mod binder;
pub mod engine;

// Re-export key types
pub use value::{FieldValue, FromFieldValue, CoerceError};
pub use directive::{Directive, OutputTarget, CALLBACK_PREFIX};
pub use context::{Context, ContextBuilder};
pub use error::{CombineError, HandlerError, Result};
pub use handler::{AggregateHandler, ResultMap};
pub use registry::HandlerRegistry;
pub use record::{FieldSpec, FieldType, Record, RecordRegistry, Schema};
pub use config::CombineConfig;
pub use engine::Combine;

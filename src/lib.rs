//! # candy-service
//!
//! Flavour-aware task scheduler. Candies (work items tagged with an integer
//! flavour) are dispatched to a fixed pool of eaters (workers) so that two
//! candies of the same flavour are never eaten at the same time, while
//! different flavours run in parallel.
//!
//! ```no_run
//! use candy_service::{CandyService, Flavour, FnEater};
//!
//! # async fn demo() -> candy_service::Result<()> {
//! let eaters = (0..3).map(|_| {
//!     FnEater::new(|candy: Flavour| async move {
//!         println!("eating {candy}");
//!         Ok(())
//!     })
//! });
//! let service = CandyService::new(eaters)?;
//! for flavour in [0, 1, 1, 2, 2, 2] {
//!     service.submit(Flavour(flavour));
//! }
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod eater;
pub mod error;
pub mod event;
pub mod gate;
pub mod model;
pub mod reorder;
pub mod service;
pub mod sync;
pub mod telemetry;

pub use config::ServiceConfig;
pub use eater::{BlockingEater, CandyEater, FnEater};
pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use model::{Candy, CandyId, Flavour, FlavourState, Outcome};
pub use reorder::ReorderPolicy;
pub use service::{CandyService, ServiceStats};

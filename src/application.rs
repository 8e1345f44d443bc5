//! Application layer module
//!
//! Orchestrates the stock check: per-URL extraction, batch passes with
//! bounded retries, and the scheduler loop that persists each category.

pub mod availability_extractor;
pub mod batch_processor;
pub mod dto;
pub mod retry_coordinator;
pub mod scheduler;

pub use availability_extractor::{AvailabilityExtractor, ExtractionOutcome, SkipReason};
pub use batch_processor::{BatchOutcome, BatchProcessor};
pub use dto::{CategoryReport, CycleReport};
pub use retry_coordinator::{CategoryOutcome, RetryCoordinator};
pub use scheduler::{Scheduler, SchedulerState};

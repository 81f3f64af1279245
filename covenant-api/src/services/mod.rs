//! Business logic for the write paths and the impact read path.
//!
//! Routes stay thin; everything transactional lives here, written against
//! the `Store` abstraction so it runs identically on the in-memory and
//! PostgreSQL backends.

pub mod impact;
pub mod proposal;
pub mod publish;
pub mod sync;

pub use impact::{analyze_impact, ImpactReport, ImpactedAsset, ImpactedConsumer};
pub use proposal::{acknowledge, force_approve, publish_proposal, withdraw};
pub use publish::{publish_contract, PublishAction, PublishContractRequest, PublishOutcome};
pub use sync::{bulk_publish, BulkContractItem, BulkItemResult, BulkPublishResult};

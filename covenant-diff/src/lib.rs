//! Covenant Diff - Schema Compatibility Engine
//!
//! Structural comparison of two JSON-Schema-shaped contract documents,
//! classification of each atomic change under a compatibility mode, and
//! diffing of declarative guarantees. Everything here is pure and
//! synchronous: given immutable inputs the output is deterministic and
//! byte-stable across runs.

mod change;
mod classify;
mod diff;
mod guarantees;
mod node;
mod versioning;

pub use change::{Change, ChangeKind};
pub use classify::{classify, diff_schemas, is_breaking, DiffReport};
pub use diff::diff;
pub use guarantees::{
    check_guarantee_compatibility, diff_guarantees, GuaranteeChange, GuaranteeChangeKind,
    GuaranteeDiff, GuaranteeSeverity,
};
pub use node::{resolve_refs, Constraints, SchemaNode, SchemaType, MAX_DEPTH};
pub use versioning::{compute_version_suggestion, next_version, VersionSuggestion};

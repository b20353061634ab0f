//! # crewsync core
//!
//! Contractor identity matching and merge, plus the availability session
//! lifecycle, over the SQLite store bootstrapped by `crewsync-common`.

pub mod db;
pub mod matching;
pub mod merge;
pub mod normalize;
pub mod reconcile;
pub mod service;
pub mod sessions;

pub use matching::{resolve_match, CandidateIdentity, ContractorMatch, MatchResolver, MatchStrategy};
pub use merge::{
    ColumnReferenceMigrator, EntityCount, MergeCoordinator, MergeReport, ReferenceCounts,
    ReferenceMigrator,
};
pub use reconcile::{reconcile, ReconciledFields};
pub use service::CrewSync;
pub use sessions::{AssignmentReport, SessionLifecycleManager, SessionSelector};

//! State synchronization engine: the in-memory teams, fixtures and results mirrored against a
//! remote [`DocumentStore`](crate::dao::document_store::DocumentStore).

mod cache;
mod engine;
mod error;
pub mod groups;
mod retry;
mod subscription;
#[cfg(test)]
pub(crate) mod test_support;

use crate::dao::models::{DocumentModel, FixtureEntity, ResultEntity, TeamEntity};

pub use self::cache::{CollectionCache, SyncStatus};
pub use self::engine::{
    CollectionDefaults, Collections, LoadReport, LoadSource, Loaded, SharedEngine, SyncEngine,
    SyncSettings,
};
pub use self::error::{SyncError, SyncFailureKind};
pub use self::groups::GroupsSnapshot;
pub use self::retry::RetryPolicy;
pub use self::subscription::Subscription;

/// A model the engine keeps in memory. The collection it syncs with follows from the type.
pub trait Entity: DocumentModel + Clone + PartialEq + Send + Sync + 'static {
    /// Cache holding this entity's collection.
    fn cache(collections: &Collections) -> &CollectionCache<Self>;
}

impl Entity for TeamEntity {
    fn cache(collections: &Collections) -> &CollectionCache<Self> {
        &collections.teams
    }
}

impl Entity for FixtureEntity {
    fn cache(collections: &Collections) -> &CollectionCache<Self> {
        &collections.fixtures
    }
}

impl Entity for ResultEntity {
    fn cache(collections: &Collections) -> &CollectionCache<Self> {
        &collections.results
    }
}

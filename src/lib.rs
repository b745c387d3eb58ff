pub mod cache;
pub mod clients;
pub mod config;
pub mod constants;
pub mod domain;
pub mod enrich;
pub mod logging;
pub mod models;
pub mod progress;
pub mod store;
pub mod sync;

pub use cache::{MetadataCache, MetadataError};
pub use clients::{CatalogClient, CatalogError, CatalogSource};
pub use config::Config;
pub use enrich::{Dashboard, EnrichmentPipeline};
pub use store::{InMemoryTrackingStore, StoreError, TrackingStore};
pub use sync::{
    AuthContext, LibrarySync, ShowRef, ShowSync, SyncStatus, TrackingWriter, WriteError,
    WriteOutcome,
};

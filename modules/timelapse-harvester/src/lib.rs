pub mod collector;
pub mod fetcher;
pub mod jobs;
pub mod projection;
pub mod resampler;
pub mod retry;
pub mod snapshot;
pub mod storage;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use collector::{overlap_window, Collector, CutoffWindow};
pub use fetcher::{fetch_new_since, PAGE_SIZE};
pub use jobs::{Harvester, JobResponse};
pub use projection::{project, ItemType, MappingSource, MappingTable, Projector};
pub use resampler::Resampler;
pub use retry::{RetryPolicy, RetryingFeed};
pub use snapshot::{Snapshot, SnapshotStore};
pub use storage::{FsBlobStore, MemoryBlobStore};
pub use traits::{BlobEntry, BlobStore, FeedSource};

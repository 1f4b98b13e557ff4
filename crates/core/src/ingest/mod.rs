//! Media ingestion and HLS packaging.
//!
//! One upload becomes one job: a namespaced directory tree, a rendition per
//! ladder tier, a master manifest over the tiers that succeeded, a poster,
//! probed metadata and finally one catalog record. Progress is streamed as
//! an ordered sequence of [`ProgressEvent`]s ending in exactly one `Done`.

mod coordinator;
mod error;
mod hashtags;
mod manifest;
mod pool;
mod poster;
mod prober;
mod progress;
mod types;

pub use coordinator::{CoordinatorStatus, IngestCoordinator};
pub use error::{ErrorClass, IngestError};
pub use hashtags::extract_hashtags;
pub use manifest::{render_master, ManifestComposer, ManifestEntry};
pub use pool::{PoolStatus, RenditionPool, RenditionUpdate};
pub use poster::{Poster, PosterResolution, PosterResolver, PosterSource, POSTER_EXTENSIONS};
pub use prober::{MetadataProber, ProbeResult, ProbedMetadata};
pub use progress::{JobOutcome, ProgressEvent, ProgressObserver, ProgressReporter};
pub use types::*;

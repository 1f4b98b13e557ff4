pub mod auth;
pub mod catalog;
pub mod config;
pub mod encoder;
pub mod ingest;
pub mod ladder;
pub mod layout;
pub mod maintenance;
pub mod metrics;
pub mod testing;
pub mod transcript;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator, ANONYMOUS_OWNER,
};
pub use catalog::{
    CatalogError, CatalogRecord, NewVideo, Reaction, ReactionCounts, SqliteVideoCatalog,
    TranscriptSegment, VideoCatalog, VideoQuery,
};
pub use config::{
    load_config, load_config_from_str, validate_config, ApiKeyEntry, AuthConfig, AuthMethod, Config,
    ConfigError, SanitizedConfig,
};
pub use encoder::{EncoderConfig, EncoderError, FfmpegEncoder, MediaEncoder};
pub use ingest::{
    CoordinatorStatus, ErrorClass, IngestCoordinator, IngestError, IngestRequest, JobOutcome,
    JobReport, JobState, ProgressEvent, ProgressObserver, SuppliedThumbnail,
};
pub use ladder::{default_ladder, QualityTier};
pub use layout::{JobLayout, StorageLayout};
pub use maintenance::{OrphanSweeper, SweeperConfig, TrendingConfig, TrendingScorer};
pub use transcript::{CommandTranscriber, TranscriptConfig, Transcriber};

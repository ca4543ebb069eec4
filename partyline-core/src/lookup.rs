use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("track {0} was not found")]
    NotFound(String),

    #[error("failed to fetch track details: {0}")]
    FetchError(String),

    #[error("failed to parse track details: {0}")]
    ParseError(String),
}

/// Details of a track, resolved from the external metadata service
#[derive(Debug, Clone)]
pub struct TrackDetails {
    pub title: String,
    pub artist: String,
    pub duration_ms: i64,
}

/// Represents the external service that resolves track metadata and
/// durations. Best-effort: a failed resolution is retried naturally the next
/// time the track is selected.
#[async_trait]
pub trait MetadataLookup: Send + Sync + 'static {
    async fn resolve(&self, track_id: &str) -> Result<TrackDetails, LookupError>;
}

/// A lookup serving a fixed set of tracks from memory
#[derive(Default)]
pub struct StaticLookup {
    tracks: DashMap<String, TrackDetails>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, track_id: &str, details: TrackDetails) {
        self.tracks.insert(track_id.to_string(), details);
    }
}

#[async_trait]
impl MetadataLookup for StaticLookup {
    async fn resolve(&self, track_id: &str) -> Result<TrackDetails, LookupError> {
        self.tracks
            .get(track_id)
            .map(|details| details.value().clone())
            .ok_or_else(|| LookupError::NotFound(track_id.to_string()))
    }
}

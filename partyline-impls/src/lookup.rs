use async_trait::async_trait;
use partyline_core::{LookupError, MetadataLookup, TrackDetails};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// A metadata lookup backed by an HTTP track catalog
pub struct HttpLookup {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    name: String,
    artists: Vec<TrackArtist>,
    duration_ms: i64,
}

#[derive(Debug, Deserialize)]
struct TrackArtist {
    name: String,
}

impl HttpLookup {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MetadataLookup for HttpLookup {
    async fn resolve(&self, track_id: &str) -> Result<TrackDetails, LookupError> {
        let url = format!("{}/tracks/{}", self.base_url, track_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::FetchError(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(track_id.to_string()));
        }

        let response = response
            .error_for_status()
            .map_err(|e| LookupError::FetchError(e.to_string()))?;

        let track: TrackResponse = response
            .json()
            .await
            .map_err(|e| LookupError::ParseError(e.to_string()))?;

        Ok(track.into_details())
    }
}

impl TrackResponse {
    fn into_details(self) -> TrackDetails {
        let artist = self
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        TrackDetails {
            title: self.name,
            artist,
            duration_ms: self.duration_ms,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_track_response_details() {
        let track: TrackResponse = serde_json::from_str(
            r#"{
                "name": "The Quick Brown Fox Blues",
                "artists": [{ "name": "Zoopadoop" }, { "name": "Husky" }],
                "duration_ms": 203000
            }"#,
        )
        .unwrap();

        let details = track.into_details();

        assert_eq!(details.title, "The Quick Brown Fox Blues");
        assert_eq!(details.artist, "Zoopadoop, Husky");
        assert_eq!(details.duration_ms, 203000);
    }
}

//! Recommendation client for the LoopZ backend.

use crate::error::{ClientError, Result};
use crate::settings::GatewaySettings;
use crate::types::RecommendationsResponse;
use async_trait::async_trait;
use loopz_playback::{RecommendationGateway, Track};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

/// HTTP implementation of [`RecommendationGateway`].
///
/// # Example
///
/// ```ignore
/// use loopz_client::{GatewaySettings, LoopzClient};
///
/// let client = LoopzClient::new(GatewaySettings::new("https://loopz.example.com"))?;
/// let tracks = client.get_recommendations("42").await?;
/// println!("{} tracks could follow", tracks.len());
/// ```
#[derive(Debug, Clone)]
pub struct LoopzClient {
    http: Client,
    base: Url,
    base_url: String,
    recommendations_path: String,
    access_token: Option<String>,
}

impl LoopzClient {
    /// Create a new client with the given settings.
    pub fn new(settings: GatewaySettings) -> Result<Self> {
        settings.validate()?;

        let base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        let base = Url::parse(&format!("{}/", base_url))
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .user_agent(format!("LoopZ/{} (Web)", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self {
            http,
            base,
            base_url,
            recommendations_path: settings.recommendations_path,
            access_token: settings.access_token.filter(|t| !t.is_empty()),
        })
    }

    /// Get the server URL.
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the recommendations endpoint for `track_id`.
    pub fn recommendations_url(&self, track_id: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(track_id.trim().as_bytes()).collect();
        format!(
            "{}{}",
            self.base_url,
            self.recommendations_path.replace("{id}", &encoded)
        )
    }

    /// Tracks that could follow `track_id`.
    ///
    /// Records that cannot be played are dropped; relative audio URLs are
    /// resolved against the server URL.
    pub async fn get_recommendations(&self, track_id: &str) -> Result<Vec<Track>> {
        let url = self.recommendations_url(track_id);
        debug!(url = %url, track_id, "Fetching recommendations");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ClientError::ServerUnreachable(e.to_string())
            } else {
                ClientError::Request(e)
            }
        })?;

        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            let payload: RecommendationsResponse = serde_json::from_str(&body).map_err(|e| {
                ClientError::ParseError(format!("Failed to parse recommendations: {}", e))
            })?;

            let records = payload.into_tracks();
            let total = records.len();
            let tracks: Vec<Track> = records
                .into_iter()
                .filter_map(|api| Track::from(api).resolve(Some(&self.base)))
                .collect();

            if tracks.len() != total {
                warn!(
                    track_id,
                    dropped = total - tracks.len(),
                    "Dropped unplayable recommendation records"
                );
            }
            debug!(track_id, count = tracks.len(), "Fetched recommendations");

            Ok(tracks)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl RecommendationGateway for LoopzClient {
    async fn fetch_recommendations(&self, track_id: &str) -> loopz_playback::Result<Vec<Track>> {
        Ok(self.get_recommendations(track_id).await?)
    }
}

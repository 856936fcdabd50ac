//! Grounded Gemini client
//!
//! One `generateContent` call per user turn with Google Search and Google
//! Maps grounding enabled and the user's position as the retrieval bias.
//! No streaming, no retries, no timeout beyond the HTTP stack's own.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ChatError;
use crate::state::{GroundingChunk, Message, UserLocation};

/// Text plus citations returned for one turn
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroundedResponse {
    pub text: String,
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[async_trait]
pub trait GroundedChat: Send + Sync {
    /// Answer `prompt` given the prior `history` and the user's position
    async fn respond(
        &self,
        prompt: &str,
        location: UserLocation,
        history: &[Message],
    ) -> Result<GroundedResponse, ChatError>;
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    tools: Vec<Tool>,
    tool_config: ToolConfig,
}

/// One role-tagged turn
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<TextPart>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TextPart {
    pub text: String,
}

#[derive(Serialize)]
struct EmptyConfig {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Tool {
    GoogleSearch(EmptyConfig),
    GoogleMaps(EmptyConfig),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    retrieval_config: RetrievalConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfig {
    lat_lng: LatLng,
}

#[derive(Serialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<Value>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
    code: Option<u16>,
}

// ============================================================================
// Request building and response parsing
// ============================================================================

/// Turn sequence for a request: prior history without the welcome entry,
/// then the new prompt as the latest user turn.
pub fn build_contents(prompt: &str, history: &[Message]) -> Vec<Content> {
    history
        .iter()
        .filter(|msg| !msg.is_welcome())
        .map(|msg| Content {
            role: msg.role.as_str().to_string(),
            parts: vec![TextPart { text: msg.text.clone() }],
        })
        .chain(std::iter::once(Content {
            role: "user".to_string(),
            parts: vec![TextPart { text: prompt.to_string() }],
        }))
        .collect()
}

fn build_request(prompt: &str, location: UserLocation, history: &[Message]) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: build_contents(prompt, history),
        tools: vec![Tool::GoogleSearch(EmptyConfig {}), Tool::GoogleMaps(EmptyConfig {})],
        tool_config: ToolConfig {
            retrieval_config: RetrievalConfig {
                lat_lng: LatLng {
                    latitude: location.latitude,
                    longitude: location.longitude,
                },
            },
        },
    }
}

/// Extract the answer text and citable chunks from a response body
fn parse_response(body: &str) -> Result<GroundedResponse, ChatError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(ChatError::Status {
            status: error.code.unwrap_or(0),
            body: error.message,
        });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(GroundedResponse::default());
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let grounding_chunks = candidate
        .grounding_metadata
        .map(|meta| meta.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<GroundingChunk>(raw) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                debug!("skipping unrecognized grounding chunk: {}", e);
                None
            }
        })
        .filter(GroundingChunk::is_citable)
        .collect();

    Ok(GroundedResponse { text, grounding_chunks })
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    /// Requires an API key unless requests go through a proxy
    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        Self::from_config_with_key(config, config.resolve_api_key())
    }

    pub fn from_config_with_key(config: &Config, api_key: Option<String>) -> Result<Self, ChatError> {
        if api_key.is_none() && !config.uses_proxy() {
            return Err(ChatError::MissingCredentials);
        }
        Ok(Self::new(&config.api_base_url, api_key, &config.model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Models that accept Google Maps grounding
    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
            "gemini-2.5-flash-lite".to_string(),
            "gemini-2.0-flash".to_string(),
        ]
    }
}

#[async_trait]
impl GroundedChat for GeminiClient {
    async fn respond(
        &self,
        prompt: &str,
        location: UserLocation,
        history: &[Message],
    ) -> Result<GroundedResponse, ChatError> {
        let request = build_request(prompt, location, history);
        info!(model = %self.model, turns = request.contents.len(), "sending grounded request");

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "Gemini request rejected");
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = response.text().await?;
        let grounded = parse_response(&body)?;
        debug!(chunks = grounded.grounding_chunks.len(), "received grounded response");
        Ok(grounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WebSource;

    fn history() -> Vec<Message> {
        vec![
            Message::welcome(),
            Message::user("1", "best coffee nearby"),
            Message::model("2", "Try Blue Bottle.", vec![]),
        ]
    }

    #[test]
    fn test_contents_skip_welcome_and_end_with_prompt() {
        let contents = build_contents("is it open now?", &history());
        let roles: Vec<&str> = contents.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(contents[0].parts[0].text, "best coffee nearby");
        assert_eq!(contents[2].parts[0].text, "is it open now?");
    }

    #[test]
    fn test_request_enables_both_tools_with_location() {
        let request = build_request("hi", UserLocation { latitude: 37.77, longitude: -122.41 }, &[]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tools"][0], serde_json::json!({"googleSearch": {}}));
        assert_eq!(json["tools"][1], serde_json::json!({"googleMaps": {}}));
        assert_eq!(json["toolConfig"]["retrievalConfig"]["latLng"]["latitude"], 37.77);
        assert_eq!(json["toolConfig"]["retrievalConfig"]["latLng"]["longitude"], -122.41);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_parse_text_and_chunks() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Try "},
                    {"text": "Blue Bottle."}
                ]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://bluebottlecoffee.com", "title": "Blue Bottle"}},
                    {"maps": {"uri": "https://maps.google.com/?cid=7", "title": "Blue Bottle Mint Plaza", "placeId": "places/abc"}},
                    {"retrievedContext": {"uri": "gs://bucket/doc"}},
                    {"web": {}}
                ]}
            }]
        }"#;

        let response = parse_response(body).unwrap();
        assert_eq!(response.text, "Try Blue Bottle.");
        assert_eq!(response.grounding_chunks.len(), 2);
        assert_eq!(
            response.grounding_chunks[0],
            GroundingChunk::Web(WebSource {
                uri: Some("https://bluebottlecoffee.com".to_string()),
                title: Some("Blue Bottle".to_string()),
            })
        );
        assert!(response.grounding_chunks[1].is_maps());
    }

    #[test]
    fn test_parse_without_candidates_is_empty() {
        let response = parse_response(r#"{"candidates": []}"#).unwrap();
        assert_eq!(response, GroundedResponse::default());

        let response = parse_response(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert_eq!(response.text, "");
        assert!(response.grounding_chunks.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_response(r#"{"error": {"code": 403, "message": "API key not valid"}}"#).unwrap_err();
        assert!(matches!(err, ChatError::Status { status: 403, .. }));

        let err = parse_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ChatError::MalformedResponse(_)));
    }

    #[test]
    fn test_client_needs_key_or_proxy() {
        let mut config = Config::new();
        config.api_key = None;
        let no_env = |_: &str| None;
        assert!(matches!(
            GeminiClient::from_config_with_key(&config, config.resolve_api_key_with(no_env)),
            Err(ChatError::MissingCredentials)
        ));

        config.api_key = Some("from-config".to_string());
        let client = GeminiClient::from_config_with_key(&config, config.resolve_api_key_with(no_env)).unwrap();
        assert_eq!(client.api_key.as_deref(), Some("from-config"));

        config.api_key = None;
        config.api_base_url = "http://localhost:8787/".to_string();
        let client = GeminiClient::from_config_with_key(&config, config.resolve_api_key_with(no_env)).unwrap();
        assert!(client.api_key.is_none());
        assert_eq!(
            client.endpoint(),
            "http://localhost:8787/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}

//! UI-agnostic conversation types
//!
//! These are shared by the session, the store and whatever front-end draws
//! them. The JSON shape matches what the Gemini API returns for grounding
//! metadata, so chunks can be stored exactly as they were received.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Id of the synthetic welcome message. It is never sent to the backend.
pub const WELCOME_ID: &str = "init";

pub const WELCOME_TEXT: &str = "Location acquired! I am GeoChat AI. Ask me about places, restaurants, or points of interest around you.";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A single entry in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default, deserialize_with = "lenient_text")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

impl Message {
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            text: text.into(),
            grounding_chunks: None,
        }
    }

    /// A model reply. Chunks that cite nothing are dropped here so no stored
    /// message ever carries one.
    pub fn model(id: impl Into<String>, text: impl Into<String>, chunks: Vec<GroundingChunk>) -> Self {
        let chunks: Vec<GroundingChunk> = chunks.into_iter().filter(GroundingChunk::is_citable).collect();
        Self {
            id: id.into(),
            role: Role::Model,
            text: text.into(),
            grounding_chunks: Some(chunks),
        }
    }

    pub fn welcome() -> Self {
        Self {
            id: WELCOME_ID.to_string(),
            role: Role::Model,
            text: WELCOME_TEXT.to_string(),
            grounding_chunks: None,
        }
    }

    pub fn is_welcome(&self) -> bool {
        self.id == WELCOME_ID
    }

    /// Chunks attached to this message, empty for user messages
    pub fn chunks(&self) -> &[GroundingChunk] {
        self.grounding_chunks.as_deref().unwrap_or(&[])
    }
}

/// Accepts any JSON value for message text; older or hand-edited histories
/// sometimes hold `null` or numbers there.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A citation attached by the backend to a model answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundingChunk {
    Web(WebSource),
    Maps(MapsSource),
}

impl GroundingChunk {
    pub fn uri(&self) -> Option<&str> {
        let uri = match self {
            GroundingChunk::Web(web) => web.uri.as_deref(),
            GroundingChunk::Maps(maps) => maps.uri.as_deref(),
        };
        uri.filter(|s| !s.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        let title = match self {
            GroundingChunk::Web(web) => web.title.as_deref(),
            GroundingChunk::Maps(maps) => maps.title.as_deref(),
        };
        title.filter(|s| !s.is_empty())
    }

    pub fn is_maps(&self) -> bool {
        matches!(self, GroundingChunk::Maps(_))
    }

    /// True when there is something to link to or show
    pub fn is_citable(&self) -> bool {
        self.uri().is_some() || self.title().is_some()
    }

    /// Review snippets for a maps result
    pub fn review_snippets(&self) -> &[ReviewSnippet] {
        match self {
            GroundingChunk::Maps(MapsSource {
                place_answer_sources: Some(sources),
                ..
            }) => &sources.review_snippets,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WebSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapsSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_answer_sources: Option<PlaceAnswerSources>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceAnswerSources {
    #[serde(default)]
    pub review_snippets: Vec<ReviewSnippet>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewSnippet {
    #[serde(default, alias = "googleMapsUri", skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, alias = "title", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Device position, set at most once per session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl std::fmt::Display for UserLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

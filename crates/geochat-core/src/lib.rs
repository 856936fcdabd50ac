pub mod config;
pub mod dictation;
pub mod error;
pub mod gemini;
pub mod input;
pub mod location;
pub mod markdown;
pub mod session;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use config::{Config, GeolocationMode};
pub use dictation::{CommandDictation, DictationEvent, DictationSession, DictationUpdate, SpeechCapture};
pub use error::{ChatError, DictationError, LocationError, StoreError};
pub use gemini::{GeminiClient, GroundedChat, GroundedResponse};
pub use input::{Composer, Rejection};
pub use location::{FixedLocation, IpLocation, LocationProvider, NoLocation};
pub use markdown::{Block, Inline};
pub use session::{ChatSession, Phase, TurnRequest};
pub use state::{GroundingChunk, MapsSource, Message, ReviewSnippet, Role, UserLocation, WebSource};
pub use store::{Conversation, KeyValueStore, MemoryStore, SqliteStore};

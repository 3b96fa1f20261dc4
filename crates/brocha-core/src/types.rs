use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Conversation messages
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The customer writing to the store.
    User,
    /// The assistant's reply.
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a user's conversation.
///
/// Messages are never edited after creation; the memory store only appends
/// and drops them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Intent
// =============================================================================

/// Closed set of routes a message can take.
///
/// The classifier prompt historically emits `RAG` and `SQL`; both spellings
/// are accepted on input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    /// Greetings, farewells, small talk.
    Chat,
    /// Questions answered from the knowledge base (techniques, tools, theory).
    #[serde(alias = "RAG")]
    Retrieval,
    /// Questions answered from the product catalog (prices, brands, stock).
    #[serde(alias = "SQL")]
    Structured,
    /// Anything the classifier could not decide.
    #[default]
    Unknown,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::Chat => "CHAT",
            IntentType::Retrieval => "RETRIEVAL",
            IntentType::Structured => "STRUCTURED",
            IntentType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auxiliary fields extracted alongside an intent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentMetadata {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    /// Any other field the model chose to return.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl IntentMetadata {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.entities.is_empty() && self.extra.is_empty()
    }
}

/// Result of classifying one inbound message. Lives for a single dialogue run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentType,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: IntentMetadata,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Intent {
    /// Build an intent, clamping the confidence into `[0, 1]`.
    pub fn new(kind: IntentType, confidence: f64) -> Self {
        Self {
            kind,
            confidence: clamp_unit(confidence),
            metadata: IntentMetadata::default(),
        }
    }

    /// The fallback intent for unparseable classifier output.
    pub fn unknown() -> Self {
        Self {
            kind: IntentType::Unknown,
            confidence: 0.0,
            metadata: IntentMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: IntentMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// =============================================================================
// Answer sources
// =============================================================================

/// A knowledge-base passage returned for a question, with its relevance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    /// Relevance in `[0, 1]`.
    pub relevance_score: f64,
}

/// Read-only projection of a product row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub brand: String,
    pub name: String,
    pub regular_price: String,
    pub promo_price: Option<String>,
}

impl StructuredRecord {
    /// Render as a single catalog line: `- Alba Latex Blanco: $1000 (Promo: $800)`.
    pub fn to_line(&self) -> String {
        let mut line = format!("- {} {}: ${}", self.brand, self.name, self.regular_price);
        if let Some(promo) = self.promo_price.as_deref().filter(|p| !p.trim().is_empty()) {
            line.push_str(&format!(" (Promo: ${})", promo));
        }
        line
    }
}

/// Clamp a score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let m = Message::user("Hola");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.content, "Hola");
        assert_eq!(Message::assistant("Buenas").role, Role::Assistant);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }

    #[test]
    fn test_intent_type_accepts_legacy_tags() {
        let rag: IntentType = serde_json::from_str("\"RAG\"").unwrap();
        let sql: IntentType = serde_json::from_str("\"SQL\"").unwrap();
        let chat: IntentType = serde_json::from_str("\"CHAT\"").unwrap();
        assert_eq!(rag, IntentType::Retrieval);
        assert_eq!(sql, IntentType::Structured);
        assert_eq!(chat, IntentType::Chat);
    }

    #[test]
    fn test_intent_type_rejects_unknown_tag() {
        let parsed: Result<IntentType, _> = serde_json::from_str("\"WEATHER\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_intent_deserializes_full_payload() {
        let raw = r#"{
            "type": "SQL",
            "confidence": 0.92,
            "metadata": {"keywords": ["precio"], "entities": ["Alba"], "category": "latex"}
        }"#;
        let intent: Intent = serde_json::from_str(raw).unwrap();
        assert_eq!(intent.kind, IntentType::Structured);
        assert!((intent.confidence - 0.92).abs() < f64::EPSILON);
        assert_eq!(intent.metadata.keywords, vec!["precio"]);
        assert_eq!(intent.metadata.entities, vec!["Alba"]);
        assert_eq!(intent.metadata.extra["category"], "latex");
    }

    #[test]
    fn test_intent_metadata_optional() {
        let intent: Intent = serde_json::from_str(r#"{"type":"CHAT","confidence":1}"#).unwrap();
        assert!(intent.metadata.is_empty());
    }

    #[test]
    fn test_intent_metadata_null() {
        let intent: Intent =
            serde_json::from_str(r#"{"type":"CHAT","confidence":0.9,"metadata":null}"#).unwrap();
        assert_eq!(intent.kind, IntentType::Chat);
        assert!(intent.metadata.is_empty());
    }

    #[test]
    fn test_intent_new_clamps_confidence() {
        assert_eq!(Intent::new(IntentType::Chat, 1.7).confidence, 1.0);
        assert_eq!(Intent::new(IntentType::Chat, -0.2).confidence, 0.0);
        assert_eq!(Intent::new(IntentType::Chat, f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_unknown_intent() {
        let intent = Intent::unknown();
        assert_eq!(intent.kind, IntentType::Unknown);
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.metadata.is_empty());
    }

    #[test]
    fn test_record_line_with_promo() {
        let record = StructuredRecord {
            brand: "Alba".to_string(),
            name: "Latex Blanco".to_string(),
            regular_price: "1000".to_string(),
            promo_price: Some("800".to_string()),
        };
        assert_eq!(record.to_line(), "- Alba Latex Blanco: $1000 (Promo: $800)");
    }

    #[test]
    fn test_record_line_without_promo() {
        let record = StructuredRecord {
            brand: "Sherwin".to_string(),
            name: "Esmalte".to_string(),
            regular_price: "2500".to_string(),
            promo_price: Some("  ".to_string()),
        };
        assert_eq!(record.to_line(), "- Sherwin Esmalte: $2500");
    }
}

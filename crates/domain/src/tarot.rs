//! Tarot catalogue and reading-analysis payloads.
//!
//! Shapes follow the backend's JSON. Fields the client never reads are
//! tolerated through serde's default of ignoring unknown keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of life area a reading context covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// Love and relationships
    Relationship,
    /// Work and career
    Career,
    /// Money
    Finance,
    /// Friends and community
    Social,
}

/// A reading context such as "Love" or "Career".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TarotContext {
    /// Backend id
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// URL slug used by the question and spread endpoints
    pub slug: String,
    /// Sort order
    #[serde(default)]
    pub order: i32,
    /// Life area
    #[serde(rename = "type")]
    pub kind: ContextKind,
}

/// One position of a question's spread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPosition {
    /// Backend id
    #[serde(rename = "_id")]
    pub id: String,
    /// Zero-based index in the spread
    pub index: u32,
    /// Position name ("Past", "Obstacle", ...)
    pub name: String,
    /// Aspect this position speaks to
    #[serde(default)]
    pub aspect: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Interpretation hint
    #[serde(default)]
    pub interpretation: String,
}

/// Pre-computed interpretation material attached to a question.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAnalyzedPatterns {
    /// Card combinations of interest
    #[serde(default)]
    pub card_combinations: Vec<String>,
    /// Templates used by the analysis generator
    #[serde(default)]
    pub interpretation_templates: Vec<String>,
}

/// A guided question a user can ask a spread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Backend id
    #[serde(rename = "_id")]
    pub id: String,
    /// Short title
    pub title: String,
    /// Full question text
    #[serde(default)]
    pub content: String,
    /// Context id
    pub context: String,
    /// Spread type id
    pub spread_type: String,
    /// Positions, in spread order
    #[serde(default)]
    pub positions: Vec<QuestionPosition>,
    /// Search keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Interpretation material
    #[serde(default)]
    pub pre_analyzed_patterns: PreAnalyzedPatterns,
    /// Whether the question is offered
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Creation time
    pub created_at: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}

/// A page of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedQuestions {
    /// Questions on this page
    pub items: Vec<Question>,
    /// Whether another page exists
    pub has_more: bool,
}

/// A named position of a spread layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadPosition {
    /// Position name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

/// A spread layout ("Three Cards", "Celtic Cross", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadType {
    /// Backend id
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Positions in layout order
    #[serde(default)]
    pub positions: Vec<SpreadPosition>,
    /// Context ids this spread supports
    #[serde(default)]
    pub supported_contexts: Vec<String>,
}

/// A card of the deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Backend id
    #[serde(rename = "_id")]
    pub id: String,
    /// Card name
    pub name: String,
    /// Image URL
    #[serde(default)]
    pub image_url: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Deck id
    #[serde(default)]
    pub deck_id: Option<String>,
    /// Major/minor arcana id
    #[serde(default)]
    pub arcana_type_id: Option<String>,
    /// Suit id for minor arcana
    #[serde(default)]
    pub suit_id: Option<String>,
}

/// A card placed in a spread position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCard {
    /// Card id
    pub card_id: String,
    /// Zero-based position index
    pub position: u32,
    /// Aspect of the position
    pub aspect: String,
    /// Whether the card is drawn upside down
    pub is_reversed: bool,
}

/// Body of `POST /tarot-reading/analysis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReadingAnalysis {
    /// Spread type id
    pub spread_type_id: String,
    /// Context id
    pub context: String,
    /// Question id, if the reading answers a guided question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    /// Cards in position order
    pub cards: Vec<AnalysisCard>,
}

/// Interpretation of one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAnalysis {
    /// Position index
    pub position: u32,
    /// Card id
    pub card_id: String,
    /// Interpretation text
    pub interpretation: String,
}

/// Generated analysis text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisText {
    /// Opening overview
    pub overview: String,
    /// Per-position interpretations
    #[serde(default)]
    pub position_analyses: Vec<PositionAnalysis>,
    /// Closing conclusion
    #[serde(default)]
    pub conclusion: String,
}

/// A generated reading analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingAnalysis {
    /// Backend id
    #[serde(rename = "_id")]
    pub id: String,
    /// Spread type id
    pub spread_type: String,
    /// Context id
    pub context: String,
    /// Question id
    #[serde(default)]
    pub question: Option<String>,
    /// Cards as placed
    #[serde(default)]
    pub cards: Vec<AnalysisCard>,
    /// Generated text
    pub analysis: AnalysisText,
    /// Creation time
    pub created_at: Option<DateTime<Utc>>,
}

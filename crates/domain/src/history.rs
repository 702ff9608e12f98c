//! Reading history payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tarot::Card;

/// Which service produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingKind {
    /// Tarot spread
    Tarot,
    /// Numerology chart
    Numerology,
    /// Zodiac reading
    Zodiac,
}

/// A card in a stored reading, with the card document populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCard {
    /// The populated card
    #[serde(rename = "cardId")]
    pub card: Card,
    /// Position index
    pub position: u32,
    /// Position aspect
    #[serde(default)]
    pub aspect: String,
    /// Reversed draw
    #[serde(default)]
    pub is_reversed: bool,
}

/// Interpretation of one position, with advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPositionAnalysis {
    /// Position index
    pub position: u32,
    /// Card id
    pub card_id: String,
    /// Interpretation text
    pub interpretation: String,
    /// Advice text
    #[serde(default)]
    pub advice: String,
}

/// Analysis stored with a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryAnalysis {
    /// Overview
    pub overview: String,
    /// Per-position interpretations
    #[serde(default)]
    pub position_analyses: Vec<HistoryPositionAnalysis>,
    /// Conclusion
    #[serde(default)]
    pub conclusion: String,
}

/// A past reading of the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingHistory {
    /// Backend id
    #[serde(rename = "_id")]
    pub id: String,
    /// Owner
    pub user_id: String,
    /// Producing service
    #[serde(rename = "type")]
    pub kind: ReadingKind,
    /// Analysis id
    #[serde(default)]
    pub reading_analysis_id: Option<String>,
    /// Spread type id
    #[serde(default)]
    pub spread_type_id: Option<String>,
    /// Context id
    pub context: String,
    /// Question id
    #[serde(default)]
    pub question_id: Option<String>,
    /// Cards in position order
    #[serde(default)]
    pub cards: Vec<HistoryCard>,
    /// Stored analysis
    pub analysis: HistoryAnalysis,
    /// Marked as favorite
    #[serde(default)]
    pub is_favorite: bool,
    /// User tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form notes
    #[serde(default)]
    pub personal_notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

/// Per-service reading counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStats {
    /// Number of readings
    pub reading_count: u64,
    /// Number of favorites (tarot only)
    #[serde(default)]
    pub favorite_count: u64,
}

/// Reading statistics of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserStats {
    /// Tarot counters
    pub tarot: ReadingStats,
    /// Numerology counters
    pub numerology: ReadingStats,
    /// Zodiac counters
    pub zodiac: ReadingStats,
    /// Total readings
    pub total: u64,
}

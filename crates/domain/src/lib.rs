//! Mystic Domain - Core client types
//!
//! This crate defines the domain model for the Mystic API client.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod history;
pub mod request;
pub mod response;
pub mod session;
pub mod settings;
pub mod tarot;

pub use auth::{LoginRequest, LoginResponse, RefreshRequest, RegisterRequest};
pub use error::{DomainError, DomainResult};
pub use history::{
    HistoryAnalysis, HistoryCard, HistoryPositionAnalysis, ReadingHistory, ReadingKind, ReadingStats,
    UserStats,
};
pub use request::{ApiRequest, AuthAttempt, HttpMethod, path_segment};
pub use response::ApiResponse;
pub use session::{Session, TokenPair, User, token_preview};
pub use settings::ClientSettings;
pub use tarot::{
    AnalysisCard, Card, ContextKind, CreateReadingAnalysis, PaginatedQuestions, Question,
    QuestionPosition, ReadingAnalysis, SpreadPosition, SpreadType, TarotContext,
};

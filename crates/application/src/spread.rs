//! Building the card list of a tarot reading.
//!
//! A reading places one card in each position of a question's spread. Cards
//! are either picked by the user position by position ([`SpreadSelection`])
//! or drawn at random from the deck ([`draw_spread`]).

use std::collections::BTreeMap;

use mystic_domain::{AnalysisCard, Card, CreateReadingAnalysis, DomainError, DomainResult, Question};
use rand::Rng;
use rand::seq::SliceRandom;

/// Aspect used when a position does not name one.
pub const DEFAULT_ASPECT: &str = "general";

/// Cards picked by the user for a question, keyed by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpreadSelection {
    cards: BTreeMap<u32, String>,
}

impl SpreadSelection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a card, replacing whatever was in that position.
    pub fn place(&mut self, position: u32, card_id: impl Into<String>) {
        self.cards.insert(position, card_id.into());
    }

    /// Number of filled positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Returns true if no position is filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Builds the analysis request once every position of `question` is filled.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidSpread` if a position is empty or a card
    /// sits in a position the question does not have.
    pub fn into_analysis(self, question: &Question, context_id: &str) -> DomainResult<CreateReadingAnalysis> {
        let positions = position_count(question)?;
        if let Some(extra) = self.cards.keys().find(|p| **p >= positions) {
            return Err(DomainError::InvalidSpread(format!(
                "position {extra} is outside a {positions}-card spread"
            )));
        }
        if self.cards.len() != question.positions.len() {
            return Err(DomainError::InvalidSpread(format!(
                "{} of {positions} positions filled",
                self.cards.len()
            )));
        }

        let cards = self
            .cards
            .into_iter()
            .map(|(position, card_id)| AnalysisCard {
                card_id,
                position,
                aspect: aspect_of(question, position),
                is_reversed: false,
            })
            .collect();

        Ok(analysis_request(question, context_id, cards))
    }
}

/// Draws one distinct card per position of `question`.
///
/// The deck is shuffled (Fisher-Yates) and each drawn card is reversed with
/// probability one half.
///
/// # Errors
///
/// Returns `DomainError::InvalidSpread` if the deck is smaller than the spread.
pub fn draw_spread<R: Rng>(
    deck: &[Card],
    question: &Question,
    context_id: &str,
    rng: &mut R,
) -> DomainResult<CreateReadingAnalysis> {
    let positions = position_count(question)?;
    if deck.len() < question.positions.len() {
        return Err(DomainError::InvalidSpread(format!(
            "deck has {} cards, spread needs {positions}",
            deck.len()
        )));
    }

    let mut shuffled: Vec<&Card> = deck.iter().collect();
    shuffled.shuffle(rng);

    let cards = (0..positions)
        .zip(shuffled)
        .map(|(position, card)| AnalysisCard {
            card_id: card.id.clone(),
            position,
            aspect: aspect_of(question, position),
            is_reversed: rng.random_bool(0.5),
        })
        .collect();

    Ok(analysis_request(question, context_id, cards))
}

fn position_count(question: &Question) -> DomainResult<u32> {
    if question.positions.is_empty() {
        return Err(DomainError::InvalidSpread(format!(
            "question {} has no positions",
            question.id
        )));
    }
    u32::try_from(question.positions.len())
        .map_err(|_| DomainError::InvalidSpread("too many positions".to_string()))
}

fn aspect_of(question: &Question, position: u32) -> String {
    question
        .positions
        .iter()
        .find(|p| p.index == position)
        .map(|p| p.aspect.trim())
        .filter(|aspect| !aspect.is_empty())
        .unwrap_or(DEFAULT_ASPECT)
        .to_string()
}

fn analysis_request(question: &Question, context_id: &str, cards: Vec<AnalysisCard>) -> CreateReadingAnalysis {
    CreateReadingAnalysis {
        spread_type_id: question.spread_type.clone(),
        context: context_id.to_string(),
        question_id: Some(question.id.clone()),
        cards,
    }
}

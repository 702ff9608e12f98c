//! Tarot catalogue and reading analysis endpoints.

use std::sync::Arc;

use mystic_domain::{
    ApiRequest, Card, CreateReadingAnalysis, PaginatedQuestions, Question, ReadingAnalysis,
    SpreadType, TarotContext, path_segment,
};

use crate::error::ApplicationResult;
use crate::pipeline::RequestPipeline;
use crate::ports::HttpTransport;

/// Client for the tarot endpoints.
pub struct TarotApi<T: HttpTransport> {
    pipeline: Arc<RequestPipeline<T>>,
}

impl<T: HttpTransport> TarotApi<T> {
    /// Creates a client sharing the given pipeline.
    pub const fn new(pipeline: Arc<RequestPipeline<T>>) -> Self {
        Self { pipeline }
    }

    /// All reading contexts.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn contexts(&self) -> ApplicationResult<Vec<TarotContext>> {
        self.pipeline
            .execute_json(ApiRequest::get("/tarot/contexts"))
            .await
    }

    /// The context with the given slug.
    ///
    /// # Errors
    ///
    /// Any pipeline error; an unknown slug is an `Api` 404.
    pub async fn context_by_slug(&self, slug: &str) -> ApplicationResult<TarotContext> {
        self.pipeline
            .execute_json(ApiRequest::get(format!("/tarot/contexts/slug/{}", path_segment(slug))))
            .await
    }

    /// Guided questions of a context.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn questions(&self, context_slug: &str) -> ApplicationResult<Vec<Question>> {
        self.pipeline
            .execute_json(ApiRequest::get(format!(
                "/tarot-reading/questions/context/{}",
                path_segment(context_slug)
            )))
            .await
    }

    /// One page of a context's questions. Pages start at 1.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn questions_page(
        &self,
        context_slug: &str,
        page: u32,
        limit: u32,
    ) -> ApplicationResult<PaginatedQuestions> {
        let request = ApiRequest::get(format!(
            "/tarot-reading/questions/context/{}/paginated",
            path_segment(context_slug)
        ))
        .with_query("page", page.max(1))
        .with_query("limit", limit);
        self.pipeline.execute_json(request).await
    }

    /// One question by id.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn question(&self, id: &str) -> ApplicationResult<Question> {
        self.pipeline
            .execute_json(ApiRequest::get(format!("/tarot-reading/questions/{}", path_segment(id))))
            .await
    }

    /// Spread layouts available for a context.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn spread_types(&self, context_slug: &str) -> ApplicationResult<Vec<SpreadType>> {
        self.pipeline
            .execute_json(ApiRequest::get(format!(
                "/tarot-reading/spread-types/by-context/{}",
                path_segment(context_slug)
            )))
            .await
    }

    /// The whole deck, unpaginated.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn cards(&self) -> ApplicationResult<Vec<Card>> {
        self.pipeline
            .execute_json(ApiRequest::get("/tarot/cards/all"))
            .await
    }

    /// Requests an analysis of a finished spread.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn create_analysis(
        &self,
        reading: &CreateReadingAnalysis,
    ) -> ApplicationResult<ReadingAnalysis> {
        let request = ApiRequest::post("/tarot-reading/analysis").with_body(reading)?;
        self.pipeline.execute_json(request).await
    }

    /// A previously generated analysis.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn analysis(&self, id: &str) -> ApplicationResult<ReadingAnalysis> {
        self.pipeline
            .execute_json(ApiRequest::get(format!("/tarot-reading/analysis/{}", path_segment(id))))
            .await
    }
}

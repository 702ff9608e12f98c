//! Reading history endpoints, all scoped to one user.

use std::sync::Arc;

use mystic_domain::{ApiRequest, ReadingHistory, UserStats, path_segment};
use serde_json::json;

use crate::error::ApplicationResult;
use crate::pipeline::RequestPipeline;
use crate::ports::HttpTransport;

/// Number of readings returned by [`HistoryApi::recent`].
pub const RECENT_HISTORY_LIMIT: usize = 5;

/// Client for `/tarot-reading/history/user/{userId}`.
pub struct HistoryApi<T: HttpTransport> {
    pipeline: Arc<RequestPipeline<T>>,
}

impl<T: HttpTransport> HistoryApi<T> {
    /// Creates a client sharing the given pipeline.
    pub const fn new(pipeline: Arc<RequestPipeline<T>>) -> Self {
        Self { pipeline }
    }

    /// The newest readings, at most [`RECENT_HISTORY_LIMIT`].
    ///
    /// The backend returns the full history newest first; it is truncated here.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn recent(&self, user_id: &str) -> ApplicationResult<Vec<ReadingHistory>> {
        let mut readings: Vec<ReadingHistory> = self
            .pipeline
            .execute_json(ApiRequest::get(base(user_id)))
            .await?;
        readings.truncate(RECENT_HISTORY_LIMIT);
        Ok(readings)
    }

    /// Readings made in one context.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn by_context(&self, user_id: &str, context_id: &str) -> ApplicationResult<Vec<ReadingHistory>> {
        self.pipeline
            .execute_json(ApiRequest::get(format!("{}/context/{}", base(user_id), path_segment(context_id))))
            .await
    }

    /// Readings marked as favorite.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn favorites(&self, user_id: &str) -> ApplicationResult<Vec<ReadingHistory>> {
        self.pipeline
            .execute_json(ApiRequest::get(format!("{}/favorites", base(user_id))))
            .await
    }

    /// One reading.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn reading(&self, user_id: &str, reading_id: &str) -> ApplicationResult<ReadingHistory> {
        self.pipeline
            .execute_json(ApiRequest::get(reading(user_id, reading_id)))
            .await
    }

    /// Flips the favorite flag and returns the updated reading.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn toggle_favorite(&self, user_id: &str, reading_id: &str) -> ApplicationResult<ReadingHistory> {
        self.pipeline
            .execute_json(ApiRequest::put(format!("{}/favorite", reading(user_id, reading_id))))
            .await
    }

    /// Adds a tag.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn add_tag(&self, user_id: &str, reading_id: &str, tag: &str) -> ApplicationResult<ReadingHistory> {
        let request = ApiRequest::post(format!("{}/tags", reading(user_id, reading_id)))
            .with_json(json!({ "tag": tag }));
        self.pipeline.execute_json(request).await
    }

    /// Removes a tag.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn remove_tag(&self, user_id: &str, reading_id: &str, tag: &str) -> ApplicationResult<ReadingHistory> {
        self.pipeline
            .execute_json(ApiRequest::delete(format!(
                "{}/tags/{}",
                reading(user_id, reading_id),
                path_segment(tag)
            )))
            .await
    }

    /// Replaces the personal notes.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn update_notes(&self, user_id: &str, reading_id: &str, notes: &str) -> ApplicationResult<ReadingHistory> {
        let request = ApiRequest::put(format!("{}/notes", reading(user_id, reading_id)))
            .with_json(json!({ "notes": notes }));
        self.pipeline.execute_json(request).await
    }

    /// Reading counters per service.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn stats(&self, user_id: &str) -> ApplicationResult<UserStats> {
        self.pipeline
            .execute_json(ApiRequest::get(format!("{}/stats", base(user_id))))
            .await
    }
}

fn base(user_id: &str) -> String {
    format!("/tarot-reading/history/user/{}", path_segment(user_id))
}

fn reading(user_id: &str, reading_id: &str) -> String {
    format!("{}/reading/{}", base(user_id), path_segment(reading_id))
}

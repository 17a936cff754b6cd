use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::entity::Entity;
use crate::query::ListQuery;
use crate::CoreResult;

/// Minimal persistence capability the CRUD factory and the booking flow
/// rely on. Implementations enforce `Entity::unique_keys` and report
/// violations as `CoreError::Conflict`.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn create(&self, record: E) -> CoreResult<E>;

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<E>>;

    async fn find(&self, query: &ListQuery) -> CoreResult<Vec<E>>;

    /// Partial update; returns `None` when no record has this id.
    async fn update_by_id(&self, id: Uuid, patch: Value) -> CoreResult<Option<E>>;

    /// Returns `false` when no record has this id.
    async fn delete_by_id(&self, id: Uuid) -> CoreResult<bool>;

    async fn find_one(&self, query: ListQuery) -> CoreResult<Option<E>> {
        let query = query.with_limit(1);
        Ok(self.find(&query).await?.into_iter().next())
    }

    /// Every match, fetched page by page with `query.limit` as the page size.
    /// Callers that aggregate use this rather than a single `find`.
    async fn find_all(&self, mut query: ListQuery) -> CoreResult<Vec<E>> {
        query.page = 1;
        query.limit = query.limit.max(1);
        let mut all = Vec::new();
        loop {
            let batch = self.find(&query).await?;
            let last = batch.len() < query.limit as usize;
            all.extend(batch);
            if last {
                return Ok(all);
            }
            query.page += 1;
        }
    }
}

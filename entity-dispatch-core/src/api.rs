//! Gateway to the backend collection of one entity type

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::Entity;
use crate::error::ApiError;
use crate::page::{ListQuery, Page, SearchQuery};

/// Backend operations the [`EffectRunner`](crate::EffectRunner) calls.
///
/// Transport concerns (auth headers, retries, timeouts) belong to the
/// implementation. Entity-specific read filters travel in
/// [`ListQuery::filters`].
#[async_trait]
pub trait EntityApi<T: Entity>: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<Page<T>, ApiError>;

    async fn search(&self, query: &SearchQuery) -> Result<Page<T>, ApiError>;

    async fn get(&self, id: &str) -> Result<T, ApiError>;

    async fn create(&self, input: &T::Input) -> Result<T, ApiError>;

    async fn update(&self, id: &str, input: &T::Input) -> Result<T, ApiError>;

    async fn remove(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl<T, A> EntityApi<T> for Arc<A>
where
    T: Entity,
    A: EntityApi<T> + ?Sized,
{
    async fn list(&self, query: &ListQuery) -> Result<Page<T>, ApiError> {
        (**self).list(query).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Page<T>, ApiError> {
        (**self).search(query).await
    }

    async fn get(&self, id: &str) -> Result<T, ApiError> {
        (**self).get(id).await
    }

    async fn create(&self, input: &T::Input) -> Result<T, ApiError> {
        (**self).create(input).await
    }

    async fn update(&self, id: &str, input: &T::Input) -> Result<T, ApiError> {
        (**self).update(id, input).await
    }

    async fn remove(&self, id: &str) -> Result<(), ApiError> {
        (**self).remove(id).await
    }
}

use async_trait::async_trait;
use domain::error::BoxError;

use crate::tag::TagStore;

/// Payload of a continuous or periodic worker.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, tags: &TagStore) -> Result<(), BoxError>;
}

/// Adapter running a plain closure as a [`Job`].
pub struct FnJob<F> {
    f: F,
}

pub fn from_fn<F>(f: F) -> FnJob<F>
where
    F: Fn(&TagStore) -> Result<(), BoxError> + Send + Sync + 'static,
{
    FnJob { f }
}

#[async_trait]
impl<F> Job for FnJob<F>
where
    F: Fn(&TagStore) -> Result<(), BoxError> + Send + Sync + 'static,
{
    async fn run(&self, tags: &TagStore) -> Result<(), BoxError> {
        (self.f)(tags)
    }
}

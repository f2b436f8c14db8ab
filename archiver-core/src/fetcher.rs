use crate::{CoreError, Post};
use async_trait::async_trait;

/// Source of timeline posts.
///
/// `fetch` returns at most `limit` of the most recent posts by `username`, in
/// whatever order the source yields them. Failures are returned to the caller
/// untouched; implementations do not retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, username: &str, limit: u32) -> Result<Vec<Post>, CoreError>;
}

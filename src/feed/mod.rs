pub mod fetcher;
pub mod identity;
pub mod pacing;
pub mod proxy;
pub mod table;
pub mod teams;
pub mod types;

use async_trait::async_trait;
use types::{Document, FetchError};

/// Anything that can turn a URL into a parsed page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<Document, FetchError>;
}

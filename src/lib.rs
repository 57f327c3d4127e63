// TODO: let `check_status` probe every endpoint concurrently and select the first one that
// answers, instead of walking the pool one retry at a time

pub mod catalog;
pub mod config;
pub mod endpoint;
pub mod executor;
pub mod images;
pub mod logging;
pub mod requests;
pub mod state;
pub mod storage;
pub mod transport;

use config::ClientConfig;
use endpoint::EndpointPool;
use executor::{Executor, RetryPolicy};
use requests::Result;
use transport::{HttpTransport, Transport};

use std::sync::Arc;

/// Client for the MangaVaani backend.
///
/// Every call goes through one [Executor], so all clones share the same [EndpointPool]: once
/// some endpoint answers, later calls from anywhere in the app start from it.
#[derive(Debug)]
pub struct VaaniClient<T = HttpTransport> {
    pub(crate) executor: Executor<T>,
}

impl<T> Clone for VaaniClient<T> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl VaaniClient<HttpTransport> {
    /// Client configured from the `MANGAVAANI_*` environment variables
    pub fn new() -> Result<Self> {
        Self::from_config(&ClientConfig::from_env()?)
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let pool = EndpointPool::new(config.endpoints())?;
        let transport = HttpTransport::new(&config.user_agent)?;

        Ok(Self::with_transport(transport, Arc::new(pool), config.retry))
    }
}

impl<T: Transport> VaaniClient<T> {
    pub fn with_transport(transport: T, pool: Arc<EndpointPool>, policy: RetryPolicy) -> Self {
        Self {
            executor: Executor::new(transport, pool, policy),
        }
    }

    pub fn executor(&self) -> &Executor<T> {
        &self.executor
    }

    pub fn pool(&self) -> &EndpointPool {
        self.executor.pool()
    }
}

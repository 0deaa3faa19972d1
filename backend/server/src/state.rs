use std::sync::Arc;

use redis::RedisError;
use tracing::{info, warn};

use super::{
    auth::tokens::TokenIssuer,
    cache::{Cache, MemoryCache, RedisCache},
    config::{Config, StoreBackend},
    database::init_redis,
    sms::{LogSender, SmsSender},
    socket::SocketHub,
    store::{MemoryRepository, RedisRepository, Repository},
};

pub struct AppState {
    pub config: Config,
    pub cache: Arc<dyn Cache>,
    pub repo: Arc<dyn Repository>,
    pub sms: Arc<dyn SmsSender>,
    pub tokens: TokenIssuer,
    pub hub: SocketHub,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>, RedisError> {
        let (cache, repo): (Arc<dyn Cache>, Arc<dyn Repository>) = match config.store_backend {
            StoreBackend::Redis => {
                info!("Connecting to Redis at {}", config.redis_url);
                let connection = init_redis(&config.redis_url).await?;

                (
                    Arc::new(RedisCache::new(connection.clone())),
                    Arc::new(RedisRepository::new(connection)),
                )
            }
            StoreBackend::Memory => {
                warn!("Using in-memory storage, data is lost on restart");

                (Arc::new(MemoryCache::new()), Arc::new(MemoryRepository::new()))
            }
        };

        Ok(Arc::new(Self::with_backends(
            config,
            cache,
            repo,
            Arc::new(LogSender),
        )))
    }

    pub fn with_backends(
        config: Config,
        cache: Arc<dyn Cache>,
        repo: Arc<dyn Repository>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config);

        Self {
            config,
            cache,
            repo,
            sms,
            tokens,
            hub: SocketHub::new(),
        }
    }
}

use std::sync::Arc;

use crate::{
    auth::jwt::JwtKeys,
    comments::repo::{CommentRepo, PgCommentRepo},
    config::AppConfig,
    db,
    projects::repo::{PgProjectRepo, ProjectRepo},
    rate_limit::{RateLimiter, RedisRateLimiter},
    storage::{S3Storage, StorageClient},
    users::repo::{PgUserRepo, UserRepo},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
    pub users: Arc<dyn UserRepo>,
    pub projects: Arc<dyn ProjectRepo>,
    pub comments: Arc<dyn CommentRepo>,
    pub storage: Arc<dyn StorageClient>,
    pub limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let pool = db::connect(&config.database_url, config.database_max_connections).await?;
        db::migrate(&pool).await?;

        let storage = Arc::new(S3Storage::connect(&config.storage).await?) as Arc<dyn StorageClient>;
        let limiter =
            Arc::new(RedisRateLimiter::connect(&config.rate_limit.redis_url).await?) as Arc<dyn RateLimiter>;

        Ok(Self {
            jwt: Arc::new(JwtKeys::from(&config.jwt)),
            users: Arc::new(PgUserRepo::new(pool.clone())),
            projects: Arc::new(PgProjectRepo::new(pool.clone())),
            comments: Arc::new(PgCommentRepo::new(pool)),
            storage,
            limiter,
            config,
        })
    }
}

use config::Config;
use membership::{MembershipService, PgStore};
use sqlx::PgPool;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod membership;
pub mod middleware;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub membership: Arc<MembershipService<PgStore>>,
}

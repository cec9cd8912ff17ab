use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{Router, routing::post};
use backend::{
    AppState,
    config::Config,
    membership::{MembershipService, PgStore, RetryPolicy},
    middleware::{auth_middleware, log_errors},
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'alumni_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let membership = Arc::new(MembershipService::new(
        Arc::new(PgStore::new(pool.clone())),
        RetryPolicy::from(&config),
        config.graduation_years(),
    ));

    if config.seed_class_groups {
        match membership.seed_class_groups().await {
            Ok(created) => tracing::info!("Seeded {} class groups", created),
            Err(e) => tracing::error!("Failed to seed class groups: {}", e),
        }
    }

    // 启动时对账一次，之后按配置周期执行
    if let Err(e) = membership.reconcile().await {
        tracing::error!("Class group reconciliation failed: {}", e);
    }
    if let Some(interval) = config.reconcile_interval() {
        let membership = membership.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = membership.reconcile().await {
                    tracing::error!("Class group reconciliation failed: {}", e);
                }
            }
        });
    }

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        membership,
    };

    let public_routes = Router::new()
        .route("/users/register", post(routes::user::register))
        .route("/users/login", post(routes::user::login));

    let protected_routes = Router::new()
        .route("/class-groups/join", post(routes::class_group::join_group))
        .route("/class-groups/leave", post(routes::class_group::leave_group))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new()
        .nest(
            &config.api_base_uri,
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .layer(axum::middleware::from_fn(log_errors));

    // 开发模式下允许跨域
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}

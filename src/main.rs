use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpResponse, HttpServer};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use wanderlog::auth::{SecretHasher, TokenService};
use wanderlog::config::AppConfig;
use wanderlog::hotels::RapidApiHotels;
use wanderlog::identity::Identity;
use wanderlog::oauth::GoogleOAuth;
use wanderlog::openapi::ApiDoc;
use wanderlog::rate_limit::{SlidingWindowLimiter, RateLimitConfig, RateLimiterFacade};
use wanderlog::repo::Repo;
use wanderlog::retry::RetryPolicy;
use wanderlog::storage::build_asset_store;
use wanderlog::{config, AppState, SecurityHeaders};

async fn metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(handle.render())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // .env is a development convenience only
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env()?;
    info!("Bootstrapping Wanderlog server");
    info!("Frontend URL: {}", cfg.frontend_url);
    info!("Google login configured: {}", cfg.google.is_some());
    if cfg.hotels.api_key.is_none() {
        warn!("RAPIDAPI_KEY not set; /api/hotels will answer 503");
    }

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo: Arc<dyn Repo> = {
        info!("Using in-memory repository backend");
        Arc::new(wanderlog::repo::inmem::InMemRepo::new())
    };

    #[cfg(feature = "postgres-store")]
    let pg = {
        use sqlx::postgres::PgPoolOptions;
        let url = cfg
            .database_url
            .clone()
            .ok_or(wanderlog::config::ConfigError::Missing("DATABASE_URL"))?;
        let pool = PgPoolOptions::new().max_connections(5).connect(&url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Using Postgres repository backend (migrations applied)");
        wanderlog::repo::pg::PgRepo::new(pool)
    };
    #[cfg(feature = "postgres-store")]
    let repo: Arc<dyn Repo> = Arc::new(pg.clone());

    let retry = RetryPolicy::default();
    let assets = build_asset_store(&cfg.s3, retry).await?;
    let identity = Identity::new(
        repo.clone(),
        SecretHasher::default(),
        TokenService::new(cfg.jwt_secret.as_bytes()),
    );

    let mut state = AppState::new(repo, identity, assets).with_rate_limiter(RateLimiterFacade::new(
        SlidingWindowLimiter::new(true),
        RateLimitConfig {
            auth_limit: cfg.auth_rl_limit,
            auth_window: cfg.auth_rl_window,
            trust_proxy: cfg.trust_proxy,
        },
    ));
    if let Some(hotels) = RapidApiHotels::from_config(&cfg.hotels, retry) {
        state = state.with_hotels(Arc::new(hotels));
    }
    if let Some(google) = cfg.google.clone() {
        state = state.with_google(GoogleOAuth::new(google));
    }

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let state = web::Data::new(state);
    let prometheus = web::Data::new(prometheus);
    let frontend = cfg.frontend_url.clone();
    let security = SecurityHeaders::from_config(&cfg);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .app_data(prometheus.clone())
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(security.clone())
            .wrap(cors)
            .service(SwaggerUi::new("/api-docs/{_:.*}").url("/api-docs/openapi.json", openapi.clone()))
            .route("/metrics", web::get().to(metrics))
            .configure(config)
    })
    .bind(("0.0.0.0", cfg.port))?;

    info!("Listening on http://0.0.0.0:{}", cfg.port);
    server.run().await?;

    #[cfg(feature = "postgres-store")]
    pg.close().await;
    info!("Shutdown complete");
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use actix_web::{get, web};
use anyhow::anyhow;
use moka::future::Cache;
use shuttle_actix_web::ShuttleActixWeb;
use shuttle_runtime::SecretStore;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_cron_scheduler::JobScheduler;
use tracing::{info, warn};

mod auth;
mod config;
mod docs;
mod error;
mod jobs;
mod mailer;
mod middleware;
mod models;
mod routes;
mod storage;
mod types;

pub use config::AppConfig;

use auth::{hash_password, normalize_email, JWTKeys};
use error::payload_error;
use middleware::auth::{Authentication, RoleLookup};
use models::package::PackageCache;
use models::product::ProductCache;
use models::User;

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

pub struct AppState {
    pub pool: PgPool,
    pub stripe_client: stripe::Client,
    pub s3_client: aws_sdk_s3::Client,
    pub http_client: reqwest::Client,
    pub product_cache: ProductCache,
    pub package_cache: PackageCache,
    pub jwt_keys: Arc<JWTKeys>,
    /// Held for the life of the service so the housekeeping jobs keep running.
    #[allow(dead_code)]
    pub scheduler: JobScheduler,
}

#[get("/")]
async fn health() -> &'static str {
    "OK"
}

async fn seed_admin(pool: &PgPool, app_config: &AppConfig) -> Result<(), anyhow::Error> {
    let Some((email, password)) = &app_config.admin_seed else {
        warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin seed");
        return Ok(());
    };
    let email = normalize_email(email).map_err(|e| anyhow!("Invalid ADMIN_EMAIL: {}", e))?;
    let password_hash = hash_password(password.clone())
        .await
        .map_err(|e| anyhow!("{}", e))?;
    User::ensure_admin(pool, &email, password_hash)
        .await
        .map_err(|e| anyhow!("Failed to seed admin: {}", e))
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secret_store: SecretStore,
) -> ShuttleActixWeb<impl FnOnce(&mut web::ServiceConfig) + Send + Clone + 'static> {
    let app_config = Arc::new(AppConfig::new(&secret_store)?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&app_config.database_url)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrated");

    seed_admin(&pool, &app_config).await?;

    let scheduler = jobs::start(pool.clone())
        .await
        .map_err(|e| anyhow!("Failed to start scheduler: {}", e))?;

    let app_state = Arc::new(AppState {
        pool,
        stripe_client: stripe::Client::new(app_config.stripe_secret_key.clone()),
        s3_client: storage::s3_client(&app_config).await,
        http_client: reqwest::Client::new(),
        product_cache: Cache::builder()
            .max_capacity(1_000)
            .time_to_live(CACHE_TTL)
            .build(),
        package_cache: Cache::builder().time_to_live(CACHE_TTL).build(),
        jwt_keys: Arc::new(JWTKeys::new(app_config.jwt_secret.as_bytes())),
        scheduler,
    });

    let config = move |cfg: &mut web::ServiceConfig| {
        let cors = Cors::default()
            .allowed_origin(&app_config.frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![AUTHORIZATION, CONTENT_TYPE, ACCEPT])
            .supports_credentials()
            .max_age(3600);

        cfg.app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(app_config.clone()))
            .app_data(web::Data::new(RoleLookup::Database(app_state.pool.clone())))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| payload_error(err)))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| payload_error(err)))
            .app_data(web::PathConfig::default().error_handler(|err, _req| payload_error(err)))
            .service(
                web::scope("")
                    .wrap(Authentication {
                        keys: app_state.jwt_keys.clone(),
                    })
                    .wrap(cors)
                    .service(health)
                    .configure(docs::configure)
                    .service(web::scope("/auth").configure(routes::auth::configure))
                    .service(web::scope("/products").configure(routes::products::configure))
                    .service(web::scope("/packages").configure(routes::packages::configure))
                    .service(web::scope("/staff").configure(routes::staff::configure))
                    .service(web::scope("/bookings").configure(routes::bookings::configure))
                    .service(web::scope("/cart").configure(routes::cart::configure))
                    .service(web::scope("/orders").configure(routes::orders::configure))
                    .service(web::scope("/pay").configure(routes::pay::configure))
                    .service(web::scope("/webhook").configure(routes::webhook::configure))
                    .service(
                        web::scope("/notifications")
                            .configure(routes::notifications::configure),
                    )
                    .service(web::scope("/reports").configure(routes::reports::configure))
                    .service(web::scope("/admin").configure(routes::admin::configure))
                    .service(web::scope("/uploads").configure(routes::uploads::configure)),
            );
    };

    Ok(config.into())
}

use actix_web::{web, App, HttpServer};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recommendation_engine::config::Config;
use recommendation_engine::handlers::{
    batch_predict, clear_cache, drift_check, drift_reset, evaluate, health, predict, train,
    AppState,
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    tracing::info!(
        "Starting {} v{} on port {}",
        config.service.service_name,
        env!("CARGO_PKG_VERSION"),
        config.service.http_port
    );

    let port = config.service.http_port;
    let state = web::Data::new(AppState::new(config));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(predict)
            .service(batch_predict)
            .service(train)
            .service(evaluate)
            .service(drift_reset)
            .service(drift_check)
            .service(health)
            .service(clear_cache)
    })
    .bind(format!("0.0.0.0:{port}"))?
    .run()
    .await
}

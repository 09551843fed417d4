// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use log::info;
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::AppConfig;
use crate::handlers::{analyze_image, health_check, upload_limits};
use crate::services::{FloodAnalyzer, ImageProcessor, LLMService, VisionModel};

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<FloodAnalyzer>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/analyze/image", web::post().to(analyze_image))
            .route("/limits", web::get().to(upload_limits)),
    )
    .route("/", web::get().to(health_check))
    .route("/health", web::get().to(health_check));
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Floodsight service...");

    let config = AppConfig::from_env();

    // Initialize services
    let model = LLMService::from_config(&config).map(|service| {
        info!("Using vision model {}", service.model_name());
        Arc::new(service) as Arc<dyn VisionModel>
    });
    let image_processor = Arc::new(ImageProcessor::new());
    let analyzer = Arc::new(FloodAnalyzer::new(model, image_processor, config.ai_timeout));

    let app_state = AppState { analyzer };

    let (host, port) = config.bind_address();
    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}

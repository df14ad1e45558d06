use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;

mod clients;
mod config;
mod error;
mod handlers;
mod models;
mod routes;
mod services;
mod utils;

use crate::clients::LuciClient;
use crate::config::AppSettings;
use crate::routes::{configure_routes, configure_ws_routes};
use crate::services::{MpvService, OpenWrtService, PlayerEvents, TodoService};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load application settings
    let app_settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    // Construct the services once and inject them; handlers never reach for
    // ambient singletons.
    let luci_client = LuciClient::new(app_settings.openwrt.clone(), utils::http_client::new_api_client());
    let openwrt_service = web::Data::new(OpenWrtService::new(luci_client));
    log::info!(
        "OpenWRT service initialized for {}",
        app_settings.openwrt.base_url
    );

    let todo_service = web::Data::new(TodoService::new());

    let player_events = web::Data::new(PlayerEvents::new());
    let mpv_service = web::Data::new(MpvService::new(
        app_settings.player.clone(),
        player_events.get_ref().clone(),
    ));
    log::info!(
        "Player service initialized (binary {}, socket {})",
        app_settings.player.binary,
        app_settings.player.socket_path
    );

    // Get server host and port from settings
    let host = &app_settings.server.host;
    let port = app_settings.server.port;

    log::info!("Starting server at http://{}:{}", host, port);

    let server_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(server_addr)?;

    HttpServer::new(move || {
        let app_settings = app_settings.clone();

        // Configure CORS using actix-cors
        let mut cors = Cors::default().supports_credentials();

        // Add allowed origins based on configuration
        if app_settings.server.cors_origins.contains(&"*".to_string()) {
            cors = cors.allow_any_origin();
        } else {
            for origin in &app_settings.server.cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }

        // Common CORS settings for all origins
        cors = cors.allow_any_method().allow_any_header();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(app_settings))
            .app_data(openwrt_service.clone())
            .app_data(todo_service.clone())
            .app_data(player_events.clone())
            .app_data(mpv_service.clone())
            // Health check endpoint
            .service(web::resource("/health").route(web::get().to(handlers::health::health_check)))
            // Dashboard API routes
            .service(web::scope("/api").configure(configure_routes))
            // Subscription streams
            .service(web::scope("/ws").configure(configure_ws_routes))
    })
    .listen(listener)?
    .run()
    .await
}

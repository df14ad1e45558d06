use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub openwrt: OpenWrtConfig,
    pub player: PlayerConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenWrtConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub binary: String,
    pub socket_path: String,
    pub idle_shutdown_secs: u64,
}

impl AppSettings {
    pub fn from_env() -> Result<Self, AppError> {
        // App config
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "homehub".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Server config
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "2022".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Configuration("SERVER_PORT must be a valid port number".to_string()))?;

        // CORS origins
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        // OpenWRT device endpoint. The base URL and username have sane defaults
        // for a stock install; the password is a secret and must be provided.
        let openwrt_base_url = env::var("OPENWRT_BASE_URL")
            .unwrap_or_else(|_| "http://192.168.1.1/cgi-bin/luci/rpc".to_string());

        let openwrt_username = env::var("OPENWRT_USERNAME").unwrap_or_else(|_| "root".to_string());

        let openwrt_password = env::var("OPENWRT_PASSWORD")
            .map_err(|_| AppError::Configuration("OPENWRT_PASSWORD must be set".to_string()))?;

        // Media player config
        let player_binary = env::var("MPV_BINARY").unwrap_or_else(|_| "mpv".to_string());

        let player_socket_path = env::var("MPV_SOCKET_PATH")
            .unwrap_or_else(|_| "/tmp/homehub-mpv.sock".to_string());

        let player_idle_shutdown_secs = env::var("MPV_IDLE_SHUTDOWN_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse::<u64>()
            .map_err(|_| AppError::Configuration("MPV_IDLE_SHUTDOWN_SECS must be a valid number".to_string()))?;

        Ok(Self {
            app: AppConfig {
                name: app_name,
                environment,
            },
            server: ServerConfig {
                host: server_host,
                port: server_port,
                cors_origins,
            },
            openwrt: OpenWrtConfig {
                base_url: openwrt_base_url,
                username: openwrt_username,
                password: openwrt_password,
            },
            player: PlayerConfig {
                binary: player_binary,
                socket_path: player_socket_path,
                idle_shutdown_secs: player_idle_shutdown_secs,
            },
        })
    }
}

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult};
use crate::handlers::system_handlers::SuccessResponse;
use crate::services::mpv::{LoadMode, MpvService, SeekMode};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    pub uri: String,
    #[serde(default = "default_load_mode")]
    pub mode: LoadMode,
    pub options: Option<Vec<String>>,
}

fn default_load_mode() -> LoadMode {
    LoadMode::Replace
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekRequest {
    pub position: f64,
    #[serde(default = "default_seek_mode")]
    pub mode: SeekMode,
}

fn default_seek_mode() -> SeekMode {
    SeekMode::Absolute
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub level: u32,
}

#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub flag: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PropertiesRequest {
    pub names: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationResponse {
    pub duration: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    pub name: String,
    pub value: JsonValue,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningResponse {
    pub running: bool,
}

pub async fn load(service: web::Data<MpvService>, body: web::Json<LoadRequest>) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    if body.uri.trim().is_empty() {
        return Err(AppError::Validation("uri must not be empty".to_string()));
    }
    service.load(&body.uri, body.mode, body.options).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn play(service: web::Data<MpvService>) -> AppResult<HttpResponse> {
    service.play().await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn pause(service: web::Data<MpvService>) -> AppResult<HttpResponse> {
    service.pause().await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn toggle_pause(service: web::Data<MpvService>) -> AppResult<HttpResponse> {
    service.toggle_pause().await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn stop(service: web::Data<MpvService>) -> AppResult<HttpResponse> {
    service.stop().await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn next(service: web::Data<MpvService>) -> AppResult<HttpResponse> {
    service.next().await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn prev(service: web::Data<MpvService>) -> AppResult<HttpResponse> {
    service.prev().await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn seek(service: web::Data<MpvService>, body: web::Json<SeekRequest>) -> AppResult<HttpResponse> {
    if !body.position.is_finite() {
        return Err(AppError::Validation("position must be a finite number".to_string()));
    }
    service.seek(body.position, body.mode).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn volume(service: web::Data<MpvService>, body: web::Json<VolumeRequest>) -> AppResult<HttpResponse> {
    if body.level > 100 {
        return Err(AppError::Validation("level must be between 0 and 100".to_string()));
    }
    service.volume(body.level).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn mute(service: web::Data<MpvService>, body: web::Json<MuteRequest>) -> AppResult<HttpResponse> {
    service.mute(body.flag).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn get_duration(service: web::Data<MpvService>) -> AppResult<HttpResponse> {
    let duration = service.get_duration().await?;
    Ok(HttpResponse::Ok().json(DurationResponse { duration }))
}

pub async fn get_property(
    service: web::Data<MpvService>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let name = path.into_inner();
    let value = service.get_property(&name).await?;
    Ok(HttpResponse::Ok().json(PropertyResponse { name, value }))
}

pub async fn get_all_properties(
    service: web::Data<MpvService>,
    body: web::Json<PropertiesRequest>,
) -> AppResult<HttpResponse> {
    if body.names.is_empty() {
        return Err(AppError::Validation("names must not be empty".to_string()));
    }
    let properties = service.get_all_properties(&body.names).await?;
    Ok(HttpResponse::Ok().json(properties))
}

pub async fn is_running(service: web::Data<MpvService>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(RunningResponse {
        running: service.is_running().await,
    }))
}

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::openwrt::{InitAction, OpenWrtService};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRunningResponse {
    pub process_name: String,
    pub running: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageProcessRequest {
    pub process_name: String,
    pub action: InitAction,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub success: bool,
}

/// Process names end up in a remote shell; allow only conservative names.
fn validate_process_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::Validation("processName must not be empty".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(AppError::Validation(
            "processName may only contain alphanumerics, '-', '_' and '.'".to_string(),
        ));
    }
    Ok(())
}

pub async fn get_system_status(service: web::Data<OpenWrtService>) -> AppResult<HttpResponse> {
    let status = service.get_system_status().await?;
    Ok(HttpResponse::Ok().json(status))
}

pub async fn reboot_router(service: web::Data<OpenWrtService>) -> AppResult<HttpResponse> {
    service.reboot_router().await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn is_process_running(
    service: web::Data<OpenWrtService>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let process_name = path.into_inner();
    validate_process_name(&process_name)?;
    let running = service.is_process_running(&process_name).await?;
    Ok(HttpResponse::Ok().json(ProcessRunningResponse {
        process_name,
        running,
    }))
}

pub async fn manage_initd_process(
    service: web::Data<OpenWrtService>,
    body: web::Json<ManageProcessRequest>,
) -> AppResult<HttpResponse> {
    validate_process_name(&body.process_name)?;
    service
        .manage_initd_process(&body.process_name, body.action)
        .await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::system_handlers::SuccessResponse;
use crate::services::todo::{TodoService, UpdateTodo};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub title: String,
    pub description: Option<String>,
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Todo with id {} not found", id))
}

pub async fn create_todo(
    service: web::Data<TodoService>,
    body: web::Json<CreateTodoRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    if body.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    let todo = service.create(body.title, body.description);
    Ok(HttpResponse::Created().json(todo))
}

pub async fn get_all_todos(service: web::Data<TodoService>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.get_all()))
}

pub async fn get_completed_todos(service: web::Data<TodoService>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.get_completed()))
}

pub async fn get_pending_todos(service: web::Data<TodoService>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.get_pending()))
}

pub async fn get_todo_by_id(
    service: web::Data<TodoService>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let todo = service.get_by_id(&id).ok_or_else(|| not_found(&id))?;
    Ok(HttpResponse::Ok().json(todo))
}

pub async fn update_todo(
    service: web::Data<TodoService>,
    path: web::Path<String>,
    body: web::Json<UpdateTodo>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let updates = body.into_inner();
    if let Some(title) = &updates.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("title must not be empty".to_string()));
        }
    }
    let todo = service.update(&id, updates).ok_or_else(|| not_found(&id))?;
    Ok(HttpResponse::Ok().json(todo))
}

pub async fn delete_todo(
    service: web::Data<TodoService>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    if !service.delete(&id) {
        return Err(not_found(&id));
    }
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn mark_todo_completed(
    service: web::Data<TodoService>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let todo = service.mark_completed(&id).ok_or_else(|| not_found(&id))?;
    Ok(HttpResponse::Ok().json(todo))
}

pub async fn mark_todo_incomplete(
    service: web::Data<TodoService>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let todo = service.mark_incomplete(&id).ok_or_else(|| not_found(&id))?;
    Ok(HttpResponse::Ok().json(todo))
}

pub async fn clear_all_todos(service: web::Data<TodoService>) -> AppResult<HttpResponse> {
    service.clear();
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

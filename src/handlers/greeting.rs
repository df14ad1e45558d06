use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct GreetingQuery {
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GreetingResponse {
    greeting: String,
}

pub async fn greeting(query: web::Query<GreetingQuery>) -> impl Responder {
    let name = query.name.as_deref().unwrap_or("there");
    HttpResponse::Ok().json(GreetingResponse {
        greeting: format!("Hello {}", name),
    })
}

//! Prometheus exposition endpoint

use actix_web::{HttpResponse, get, web};

use crate::model::common::AppState;

#[get("/metrics")]
pub async fn prometheus_metrics(data: web::Data<AppState>) -> HttpResponse {
    match &data.metrics {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NotFound().finish(),
    }
}

//! Cache endpoints
//!
//! `/cache` applies a mutation locally and hands it to the replication
//! dispatcher. `/cache/sync` is what peers call; it applies locally only, so
//! replicated mutations never propagate further.

use actix_web::{HttpResponse, Resource, http::StatusCode, web};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use pantry_common::{CACHE_PATH, CacheValue, PantryError, SYNC_PATH};
use pantry_core::Mutation;

use crate::{
    error::{AppError, GET_FAILED, INVALID_BODY, INVALID_METHOD, MISSING_KEY, SET_FAILED, plain_text},
    model::common::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CacheQuery {
    pub key: Option<String>,
}

impl CacheQuery {
    fn require_key(&self) -> Result<&str, PantryError> {
        match self.key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => {
                warn!("Missing key in request");
                Err(PantryError::validation(MISSING_KEY))
            }
        }
    }
}

/// Malformed query strings are reported like a missing key
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|_, _| AppError::from(PantryError::validation(MISSING_KEY)).into())
}

fn parse_body(body: &[u8]) -> Result<CacheValue, PantryError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Rejected request body");
        PantryError::validation(INVALID_BODY)
    })
}

fn store_value(data: &AppState, key: &str, value: &CacheValue) -> Result<(), PantryError> {
    data.cache.set(key, value).map_err(|e| {
        error!(key, error = %e, "Failed to set cache");
        PantryError::Internal(SET_FAILED.to_string())
    })
}

pub async fn get_cache(
    data: web::Data<AppState>,
    params: web::Query<CacheQuery>,
) -> Result<HttpResponse, AppError> {
    let key = params.require_key()?;

    let value = data.cache.get(key).map_err(|e| match e {
        PantryError::NotFound(_) => {
            debug!(key, "Key not found in cache");
            e
        }
        other => {
            error!(key, error = %other, "Failed to get cache");
            PantryError::Internal(GET_FAILED.to_string())
        }
    })?;

    Ok(HttpResponse::Ok().json(value))
}

pub async fn post_cache(
    data: web::Data<AppState>,
    params: web::Query<CacheQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let key = params.require_key()?.to_string();
    let value = parse_body(&body)?;

    store_value(&data, &key, &value)?;
    data.dispatcher.dispatch(Mutation::Write {
        key: key.clone(),
        value,
    });

    info!(key = %key, "Set request completed");
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_cache(
    data: web::Data<AppState>,
    params: web::Query<CacheQuery>,
) -> Result<HttpResponse, AppError> {
    let key = params.require_key()?.to_string();

    data.cache.delete(&key);
    data.dispatcher.dispatch(Mutation::Delete { key: key.clone() });

    info!(key = %key, "Delete request completed");
    Ok(HttpResponse::NoContent().finish())
}

pub async fn sync_post_cache(
    data: web::Data<AppState>,
    params: web::Query<CacheQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let key = params.require_key()?;
    let value = parse_body(&body)?;

    store_value(&data, key, &value)?;

    debug!(key, "Sync set applied");
    Ok(HttpResponse::NoContent().finish())
}

pub async fn sync_delete_cache(
    data: web::Data<AppState>,
    params: web::Query<CacheQuery>,
) -> Result<HttpResponse, AppError> {
    let key = params.require_key()?;

    data.cache.delete(key);

    debug!(key, "Sync delete applied");
    Ok(HttpResponse::NoContent().finish())
}

async fn method_not_allowed(req: actix_web::HttpRequest) -> HttpResponse {
    warn!(method = %req.method(), path = req.path(), "Invalid request method");
    plain_text(StatusCode::METHOD_NOT_ALLOWED, INVALID_METHOD)
}

pub fn routes() -> Resource {
    web::resource(CACHE_PATH)
        .route(web::get().to(get_cache))
        .route(web::post().to(post_cache))
        .route(web::delete().to(delete_cache))
        .default_service(web::to(method_not_allowed))
}

pub fn sync_routes() -> Resource {
    web::resource(SYNC_PATH)
        .route(web::post().to(sync_post_cache))
        .route(web::delete().to(sync_delete_cache))
        .default_service(web::to(method_not_allowed))
}

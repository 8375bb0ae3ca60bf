//! Cluster status endpoints

use actix_web::{HttpResponse, Scope, get, web};
use serde::Serialize;

use pantry_core::Worker;

use crate::model::common::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPeers {
    pub identity: String,
    pub cache_size: usize,
    pub peers: Vec<Worker>,
}

#[get("/self")]
pub async fn self_worker(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.registry.get_self_worker())
}

#[get("/peers")]
pub async fn peers(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ClusterPeers {
        identity: data.registry.identity().to_string(),
        cache_size: data.cache.len(),
        peers: data.registry.pool_snapshot(),
    })
}

pub fn routes() -> Scope {
    web::scope("/cluster").service(self_worker).service(peers)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use super::*;
    use crate::api::{main_routes, test_support::test_app_state};

    #[actix_web::test]
    async fn test_self_worker() {
        let state = test_app_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(state.clone()))
                .configure(main_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/cluster/self").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["hostname"], "host-a");
        assert_eq!(body["port"], 8080);
        assert_eq!(body["syncPort"], 9001);
        assert!(body["id"].as_i64().unwrap() > 0);
    }

    #[actix_web::test]
    async fn test_peers_empty_pool() {
        let state = test_app_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(state.clone()))
                .configure(main_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/cluster/peers").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["identity"], "host-a:9001");
        assert_eq!(body["cacheSize"], 0);
        assert_eq!(body["peers"], serde_json::json!([]));
    }
}

//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use quakeswarm::api::SwarmService;
use quakeswarm::catalog::CatalogStore;
use quakeswarm::config::SwarmConfig;
use quakeswarm::core::{SeismicEvent, MILLIS_PER_HOUR};
use quakeswarm::http::create_server;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tower::ServiceExt;

fn service() -> SwarmService {
    let service = SwarmService::new();
    let catalog = CatalogStore::from_events(vec![
        SeismicEvent::new("f1", 0, 40.0, 15.0, 8.0, 2.1),
        SeismicEvent::new("f2", MILLIS_PER_HOUR, 40.01, 15.0, 8.0, 2.4),
        SeismicEvent::new("m1", 30 * MILLIS_PER_HOUR, 40.0, 15.01, 10.0, 5.0),
    ]);
    service.rebuild(&catalog, &SwarmConfig::default()).unwrap();
    service
}

fn router(service: SwarmService, catalog_path: Option<PathBuf>) -> Router {
    create_server(service, catalog_path, SwarmConfig::default())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_rebuild(app: Router, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method("POST").uri("/api/rebuild");
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(router(service(), None), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn test_swarms_for_mainshock() {
    let (status, body) = get(router(service(), None), "/api/mainshocks/m1/swarms").await;
    assert_eq!(status, StatusCode::OK);
    let swarms = body.as_array().unwrap();
    assert_eq!(swarms.len(), 1);
    assert_eq!(swarms[0]["mainshock_id"], "m1");
    assert_eq!(swarms[0]["event_count"], 2);

    let (status, body) = get(router(service(), None), "/api/mainshocks/nope/swarms").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cluster_for_event() {
    let (status, body) = get(router(service(), None), "/api/events/f2/cluster").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"], serde_json::json!(["f1", "f2"]));

    let (status, body) = get(router(service(), None), "/api/events/unknown/cluster").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("unknown"));
}

#[tokio::test]
async fn test_swarm_detail_and_summary() {
    let app = router(service(), None);
    let (status, body) = get(app.clone(), "/api/swarms/0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"].as_array().unwrap().len(), 2);

    let (status, _) = get(app.clone(), "/api/swarms/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(app, "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["swarms_matched"], 1);
    assert_eq!(body["events_processed"], 3);
}

#[tokio::test]
async fn test_swarms_near() {
    let app = router(service(), None);
    let (status, body) = get(app.clone(), "/api/swarms/near?lat=40.0&lon=15.0&radius_km=20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) =
        get(app.clone(), "/api/swarms/near?lat=40.0&lon=15.0&radius_km=20&start=1970-01-03T00:00:00Z").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = get(app, "/api/swarms/near?lat=40.0&lon=15.0&radius_km=20&start=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unclassified_clusters() {
    let (status, body) = get(router(service(), None), "/api/clusters/unclassified").await;
    assert_eq!(status, StatusCode::OK);
    // Only the mainshock's own singleton is left over.
    let clusters = body.as_array().unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0]["members"], serde_json::json!(["m1"]));
}

#[tokio::test]
async fn test_rebuild_without_catalog_is_bad_request() {
    let (status, _) = post_rebuild(router(service(), None), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rebuild_while_busy_is_conflict() {
    let service = service();
    let _ticket = service.begin_rebuild().unwrap();
    let (status, body) =
        post_rebuild(router(service.clone(), Some(PathBuf::from("unused.csv"))), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_rebuild_from_csv_swaps_view() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "id,time,latitude,longitude,depth,mag").unwrap();
    writeln!(file, "a1,2024-03-01T00:00:00Z,10.0,20.0,5,2.0").unwrap();
    writeln!(file, "a2,2024-03-01T02:00:00Z,10.01,20.0,5,2.2").unwrap();
    writeln!(file, "big,2024-03-02T00:00:00Z,10.0,20.01,12,5.8").unwrap();

    let service = service();
    let app = router(service.clone(), Some(file.path().to_path_buf()));
    let (status, summary) = post_rebuild(app.clone(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["swarms_matched"], 1);

    let (_, swarms) = get(app.clone(), "/api/mainshocks/big/swarms").await;
    assert_eq!(swarms.as_array().unwrap().len(), 1);
    let (_, old) = get(app, "/api/mainshocks/m1/swarms").await;
    assert!(old.as_array().unwrap().is_empty());
    assert!(!service.is_rebuilding());
}

#[tokio::test]
async fn test_rebuild_missing_file_keeps_view() {
    let service = service();
    let app = router(service.clone(), Some(PathBuf::from("/nonexistent/catalog.csv")));
    let (status, _) = post_rebuild(app.clone(), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, swarms) = get(app, "/api/mainshocks/m1/swarms").await;
    assert_eq!(swarms.as_array().unwrap().len(), 1);
    assert!(!service.is_rebuilding());
}

#[tokio::test]
async fn test_rebuild_ignores_catalog_path_in_body() {
    let mut outside = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(outside, "id,time,latitude,longitude,depth,mag").unwrap();
    writeln!(outside, "x1,2024-03-02T00:00:00Z,10.0,20.01,12,5.8").unwrap();
    let body = serde_json::json!({ "catalog_path": outside.path() });

    // No configured catalog: a client-supplied path does not stand in for one.
    let service = service();
    let app = router(service.clone(), None);
    let (status, _) = post_rebuild(app.clone(), Some(body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, swarms) = get(app, "/api/mainshocks/m1/swarms").await;
    assert_eq!(swarms.as_array().unwrap().len(), 1);

    // With a configured catalog, that file is the one loaded.
    let mut configured = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(configured, "id,time,latitude,longitude,depth,mag").unwrap();
    writeln!(configured, "c1,2024-03-01T00:00:00Z,10.0,20.0,5,2.0").unwrap();
    writeln!(configured, "c2,2024-03-02T00:00:00Z,10.0,20.01,12,5.8").unwrap();
    let app = router(service.clone(), Some(configured.path().to_path_buf()));
    let (status, summary) = post_rebuild(app.clone(), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["events_processed"], 2);
    let (status, _) = get(app, "/api/events/x1/cluster").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

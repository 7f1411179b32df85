//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Tile rendering, unloading and debug footprints over HTTP
//! - Error cases (invalid address, failed initialization, closed source)
//! - HTTP response codes and headers

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use wmts_overlay::capabilities::StaticCapabilities;

use super::test_utils::{
    decode_png, default_source, geographic_capabilities, geographic_source, is_valid_png,
    test_router, ColumnImagery, FlakyCapabilities, GatedImagery, RED, TILE_SIZE,
};

async fn get(router: &axum::Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let (source, _) = default_source();
    let router = test_router(source);

    let response = get(&router, "/tiles/0/0/0.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/png"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(response.headers().get("x-source-tiles").unwrap(), "2");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(is_valid_png(&body), "Response should be a valid PNG");

    let image = decode_png(&body);
    assert_eq!(image.dimensions(), (TILE_SIZE, TILE_SIZE));
    assert_eq!(*image.get_pixel(64, 128), RED);
}

#[tokio::test]
async fn test_tile_retrieval_without_png_extension() {
    let (source, _) = default_source();
    let router = test_router(source);

    let response = get(&router, "/tiles/1/1/0").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/png"
    );
}

#[tokio::test]
async fn test_cache_hit_header() {
    let (source, _) = default_source();
    let router = test_router(source);

    let response1 = get(&router, "/tiles/1/0/0.png").await;
    assert_eq!(response1.status(), StatusCode::OK);
    assert_eq!(
        response1.headers().get("x-tile-cache-hit").unwrap(),
        "false"
    );

    let response2 = get(&router, "/tiles/1/0/0.png").await;
    assert_eq!(response2.status(), StatusCode::OK);
    assert_eq!(response2.headers().get("x-tile-cache-hit").unwrap(), "true");
}

// =============================================================================
// Unloading
// =============================================================================

#[tokio::test]
async fn test_unload_drops_cached_plan() {
    let (source, _) = default_source();
    let router = test_router(Arc::clone(&source));

    get(&router, "/tiles/1/0/0.png").await;
    assert_eq!(source.stats().await.cache_entries, 1);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/tiles/1/0/0.png")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(source.stats().await.cache_entries, 0);

    let response = get(&router, "/tiles/1/0/0.png").await;
    assert_eq!(
        response.headers().get("x-tile-cache-hit").unwrap(),
        "false"
    );
}

#[tokio::test]
async fn test_unload_during_request_returns_no_content() {
    let imagery = Arc::new(GatedImagery::new());
    let source = Arc::new(geographic_source(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        imagery.clone(),
    ));
    let router = test_router(source);

    let pending = tokio::spawn({
        let router = router.clone();
        async move { get(&router, "/tiles/1/0/1.png").await }
    });

    imagery.started.notified().await;
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/tiles/1/0/1")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    imagery.release();

    let response = pending.await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unload_invalid_tile_is_rejected() {
    let (source, _) = default_source();
    let router = test_router(Arc::clone(&source));

    for uri in ["/tiles/1/2/0.png", "/tiles/31/0/0.png"] {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = json_body(response).await;
        assert_eq!(error["error"], "invalid_tile");
    }

    let stats = json_body(get(&router, "/stats").await).await;
    assert_eq!(stats["loads_in_flight"], 0);
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_tile_outside_grid() {
    let (source, _) = default_source();
    let router = test_router(source);

    // Zoom 1 has columns 0 and 1 only
    let response = get(&router, "/tiles/1/2/0.png").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await;
    assert_eq!(error["error"], "invalid_tile");
    assert_eq!(error["status"], 400);
}

#[tokio::test]
async fn test_invalid_row() {
    let (source, _) = default_source();
    let router = test_router(source);

    let response = get(&router, "/tiles/1/0/north.png").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await;
    assert_eq!(error["error"], "invalid_path");
}

#[tokio::test]
async fn test_initialization_failure_is_unavailable() {
    let provider = Arc::new(FlakyCapabilities::new(geographic_capabilities(), 1));
    let source = Arc::new(geographic_source(
        provider.clone(),
        Arc::new(ColumnImagery::new()),
    ));
    let router = test_router(source);

    let response = get(&router, "/tiles/0/0/0.png").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error = json_body(response).await;
    assert_eq!(error["error"], "unavailable");

    // The next request retries initialization
    let response = get(&router, "/tiles/0/0/0.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_closed_source_is_unavailable() {
    let (source, _) = default_source();
    let router = test_router(Arc::clone(&source));
    source.close();

    let response = get(&router, "/tiles/0/0/0.png").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error = json_body(response).await;
    assert_eq!(error["error"], "closed");
}

// =============================================================================
// Debug and Metadata
// =============================================================================

#[tokio::test]
async fn test_debug_footprints() {
    let (source, _) = default_source();
    let router = test_router(source);

    let response = get(&router, "/debug/1/0/0").await;
    assert_eq!(response.status(), StatusCode::OK);

    let geojson = json_body(response).await;
    assert_eq!(geojson["type"], "FeatureCollection");

    let features = geojson["features"].as_array().unwrap();
    assert!(!features.is_empty());
    for feature in features {
        assert_eq!(feature["geometry"]["type"], "Polygon");
        assert_eq!(feature["properties"]["z"], "1");

        let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();
        assert!(ring.len() >= 5);
        assert_eq!(ring.first(), ring.last());
    }

    // Column 0 row 0 spans 180W..90W, 0..90N
    let first = features
        .iter()
        .find(|f| f["properties"]["x"] == 0 && f["properties"]["y"] == 0)
        .unwrap();
    assert_eq!(first["properties"]["url"], "/1/0/0.png");
    // Rings start at the south-west corner
    let corner = &first["geometry"]["coordinates"][0][0];
    assert!((corner[0].as_f64().unwrap() + 180.0).abs() < 1e-6);
    assert!(corner[1].as_f64().unwrap().abs() < 1e-6);
}

#[tokio::test]
async fn test_debug_centers() {
    let (source, _) = default_source();
    let router = test_router(source);

    let plain = json_body(get(&router, "/debug/1/0/0").await).await;
    let polygons = plain["features"].as_array().unwrap().len();

    let response = get(&router, "/debug/1/0/0?centers=true").await;
    assert_eq!(response.status(), StatusCode::OK);
    let geojson = json_body(response).await;
    let features = geojson["features"].as_array().unwrap();
    assert_eq!(features.len(), 2 * polygons);

    let centers: Vec<_> = features
        .iter()
        .filter(|f| f["properties"]["kind"] == "center")
        .collect();
    assert_eq!(centers.len(), polygons);
    for center in &centers {
        assert_eq!(center["geometry"]["type"], "Point");
    }

    // Column 0 row 0 spans 180W..90W, 0..90N
    let first = centers
        .iter()
        .find(|f| f["properties"]["x"] == 0 && f["properties"]["y"] == 0)
        .unwrap();
    let point = &first["geometry"]["coordinates"];
    assert!((point[0].as_f64().unwrap() + 135.0).abs() < 1e-6);
    assert!((point[1].as_f64().unwrap() - 45.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_source_summary() {
    let (source, _) = default_source();
    let router = test_router(source);

    let response = get(&router, "/source").await;
    assert_eq!(response.status(), StatusCode::OK);

    let summary = json_body(response).await;
    assert_eq!(summary["layer"], "plate-carree");
    assert_eq!(summary["projection"], "geographic");
    assert_eq!(summary["tile_url_template"], "/{TileMatrix}/{TileRow}/{TileCol}.png");
    assert_eq!(
        summary["wgs84_bounds"],
        serde_json::json!([-180.0, -90.0, 180.0, 90.0])
    );

    let levels = summary["levels"].as_array().unwrap();
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0]["identifier"], "0");
    assert_eq!(levels[1]["matrix_width"], 4);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (source, _) = default_source();
    let router = test_router(source);

    get(&router, "/tiles/1/0/0.png").await;
    get(&router, "/tiles/1/0/0.png").await;

    let stats = json_body(get(&router, "/stats").await).await;
    assert_eq!(stats["searches"], 1);
    assert_eq!(stats["renders"], 2);
    assert_eq!(stats["stale_loads"], 0);
    assert_eq!(stats["cache_entries"], 1);
}

#[tokio::test]
async fn test_health_check() {
    let (source, _) = default_source();
    let router = test_router(source);

    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let health = json_body(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["version"].is_string());
}

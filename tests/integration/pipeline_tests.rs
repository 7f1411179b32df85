//! End-to-end tests of the tile source pipeline.
//!
//! Tests verify:
//! - Geographic source tiles land in the right place on web Mercator tiles
//! - Source levels are matched to display zooms
//! - Layer bounds and valid data limit what is drawn
//! - Failures in imagery or projection degrade the right way
//! - Unloading a tile while it renders discards the result

use std::sync::Arc;

use tokio::task::JoinSet;

use wmts_overlay::capabilities::{JsonFileCapabilities, StaticCapabilities};
use wmts_overlay::error::{ProjectionError, SourceError};
use wmts_overlay::geometry::Rectangle;
use wmts_overlay::projection::Projector;
use wmts_overlay::tile::{SourceOptions, TileSource, ViewportTileKey, WebMercatorGrid};

use super::test_utils::{
    column_color, decode_png, default_source, geographic_capabilities,
    geographic_capabilities_with_valid_data, geographic_capabilities_within, geographic_source,
    geographic_source_with_options, is_valid_png, test_options, ColumnImagery, EvenColumnFailingImagery,
    FailingImagery, FlakyCapabilities, GatedImagery, BLUE, GREEN, RED, TILE_SIZE, TRANSPARENT,
};

// =============================================================================
// Placement
// =============================================================================

#[tokio::test]
async fn test_world_tile_shows_both_hemispheres() {
    let (source, _) = default_source();

    let tile = source
        .load_tile(ViewportTileKey::new(0, 0, 0))
        .await
        .unwrap()
        .into_rendered()
        .unwrap();
    assert!(is_valid_png(&tile.data));

    let image = decode_png(&tile.data);
    assert_eq!(image.dimensions(), (TILE_SIZE, TILE_SIZE));

    // Matrix "0" has two 180 degree columns
    assert_eq!(*image.get_pixel(64, 128), RED);
    assert_eq!(*image.get_pixel(192, 128), BLUE);
}

#[tokio::test]
async fn test_quadrant_tile_splits_at_ninety_west() {
    let (source, imagery) = default_source();

    // Display tile z1 (0, 0) spans 180W..0 and 0..85N
    let tile = source
        .load_tile(ViewportTileKey::new(0, 0, 1))
        .await
        .unwrap()
        .into_rendered()
        .unwrap();
    let image = decode_png(&tile.data);

    // 135W falls in column 0, 45W in column 1
    assert_eq!(*image.get_pixel(64, 128), column_color(0));
    assert_eq!(*image.get_pixel(192, 128), column_color(1));
    assert_eq!(*image.get_pixel(64, 8), column_color(0));
    assert_eq!(*image.get_pixel(192, 248), column_color(1));

    assert_eq!(imagery.fetch_count(), tile.source_tiles);
    let urls = imagery.urls();
    assert!(urls.contains(&"/1/0/0.png".to_string()));
    assert!(urls.contains(&"/1/0/1.png".to_string()));
}

#[tokio::test]
async fn test_padded_search_includes_neighbours() {
    let (source, _) = default_source();
    let plan = source.plan(ViewportTileKey::new(0, 0, 1)).await.unwrap();

    assert_eq!(plan.matrix.as_deref(), Some("1"));
    let mut addresses: Vec<(u32, u32)> = plan
        .tiles
        .iter()
        .map(|t| (t.source.col, t.source.row))
        .collect();
    addresses.sort();

    // Clip 180W..0, 0..85N padded by 90 degrees reaches both rows and
    // column 2; column 3 at most touches the padded edge
    for expected in [(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1)] {
        assert!(addresses.contains(&expected), "missing {:?}", expected);
    }
    assert!(addresses.len() <= 8);
    assert!(plan.tiles.iter().all(|t| &*t.source.matrix == "1"));
    assert!(plan.triangle_count() > 0);
}

// =============================================================================
// Zoom Matching
// =============================================================================

#[tokio::test]
async fn test_zoom_resolves_to_matching_level() {
    let (source, _) = default_source();

    let plan = source.plan(ViewportTileKey::new(0, 0, 0)).await.unwrap();
    assert_eq!(plan.matrix.as_deref(), Some("0"));

    let plan = source.plan(ViewportTileKey::new(1, 1, 1)).await.unwrap();
    assert_eq!(plan.matrix.as_deref(), Some("1"));

    // Deeper than the pyramid falls back to the finest level
    let plan = source.plan(ViewportTileKey::new(20, 12, 5)).await.unwrap();
    assert_eq!(plan.matrix.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_zoom_beyond_table_is_resolved_directly() {
    let (source, _) = default_source();

    // max_zoom is 6 in the test options; zoom 9 is resolved on demand
    let plan = source.plan(ViewportTileKey::new(100, 150, 9)).await.unwrap();
    assert_eq!(plan.matrix.as_deref(), Some("1"));
    assert!(!plan.is_empty());
}

// =============================================================================
// Bounds and Valid Data
// =============================================================================

#[tokio::test]
async fn test_tile_outside_layer_is_transparent() {
    let imagery = Arc::new(ColumnImagery::new());
    let bounds = Rectangle::new(-180.0, -90.0, -10.0, 90.0).unwrap();
    let source = geographic_source(
        Arc::new(StaticCapabilities::new(geographic_capabilities_within(bounds))),
        imagery.clone(),
    );

    // z1 (1, 0) covers 0..180E
    let key = ViewportTileKey::new(1, 0, 1);
    let plan = source.plan(key).await.unwrap();
    assert!(plan.is_empty());
    assert!(plan.matrix.is_none());

    let tile = source.load_tile(key).await.unwrap().into_rendered().unwrap();
    assert_eq!(tile.source_tiles, 0);
    assert_eq!(imagery.fetch_count(), 0);

    let image = decode_png(&tile.data);
    assert!(image.pixels().all(|p| *p == TRANSPARENT));
}

#[tokio::test]
async fn test_valid_data_limits_drawn_tiles() {
    let valid = Rectangle::new(-180.0, -90.0, -90.0, 90.0).unwrap();
    let source = geographic_source(
        Arc::new(StaticCapabilities::new(
            geographic_capabilities_with_valid_data(valid),
        )),
        Arc::new(ColumnImagery::new()),
    );

    let key = ViewportTileKey::new(0, 0, 1);
    let plan = source.plan(key).await.unwrap();
    assert!(plan.tiles.iter().all(|t| t.source.col == 0));

    let tile = source.load_tile(key).await.unwrap().into_rendered().unwrap();
    let image = decode_png(&tile.data);
    assert_eq!(*image.get_pixel(64, 128), RED);
    assert_eq!(*image.get_pixel(192, 128), TRANSPARENT);
}

// =============================================================================
// Failure Handling
// =============================================================================

#[tokio::test]
async fn test_failed_imagery_renders_transparent() {
    let source = geographic_source(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        Arc::new(FailingImagery),
    );

    let tile = source
        .load_tile(ViewportTileKey::new(0, 0, 1))
        .await
        .unwrap()
        .into_rendered()
        .unwrap();
    assert!(tile.source_tiles > 0);

    let image = decode_png(&tile.data);
    assert!(image.pixels().all(|p| *p == TRANSPARENT));
}

#[tokio::test]
async fn test_failed_source_tile_leaves_siblings_drawn() {
    let imagery = Arc::new(EvenColumnFailingImagery::new());
    let source = geographic_source(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        imagery.clone(),
    );

    // Matrix "0": column 0 is the western hemisphere, column 1 the eastern
    let tile = source
        .load_tile(ViewportTileKey::new(0, 0, 0))
        .await
        .unwrap()
        .into_rendered()
        .unwrap();
    assert_eq!(tile.source_tiles, 2);
    assert_eq!(imagery.fetch_count(), 2);

    let image = decode_png(&tile.data);
    for y in (16..240).step_by(8) {
        for x in (0..120).step_by(8) {
            assert_eq!(*image.get_pixel(x, y), TRANSPARENT, "west pixel ({x}, {y})");
        }
        for x in (136..256).step_by(8) {
            assert_eq!(*image.get_pixel(x, y), BLUE, "east pixel ({x}, {y})");
        }
    }

    // Failures are not remembered; the next render fetches both again
    source.load_tile(ViewportTileKey::new(0, 0, 0)).await.unwrap();
    assert_eq!(imagery.fetch_count(), 4);
}

#[tokio::test]
async fn test_initialization_failure_is_retried() {
    let provider = Arc::new(FlakyCapabilities::new(geographic_capabilities(), 1));
    let source = geographic_source(provider.clone(), Arc::new(ColumnImagery::new()));
    let key = ViewportTileKey::new(0, 0, 0);

    assert!(matches!(
        source.load_tile(key).await,
        Err(SourceError::Initialization(_))
    ));
    assert!(source.load_tile(key).await.unwrap().into_rendered().is_some());

    // Capabilities are loaded once after the first success
    source.load_tile(ViewportTileKey::new(1, 1, 1)).await.unwrap();
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_capabilities_from_json_file() {
    let root = std::env::temp_dir().join(format!(
        "wmts-overlay-caps-{}",
        std::process::id()
    ));
    tokio::fs::create_dir_all(&root).await.unwrap();
    let path = root.join("capabilities.json");

    let source = geographic_source(
        Arc::new(JsonFileCapabilities::new(path.clone())),
        Arc::new(ColumnImagery::new()),
    );

    // Missing file fails initialization without poisoning the source
    assert!(matches!(
        source.ready().await,
        Err(SourceError::Initialization(_))
    ));

    let json = serde_json::to_string_pretty(&geographic_capabilities()).unwrap();
    tokio::fs::write(&path, json).await.unwrap();

    source.ready().await.unwrap();
    let summary = source.summary().await.unwrap();
    assert_eq!(summary.layer, "plate-carree");
    assert_eq!(summary.matrix_set, "EPSG:4326");
    assert_eq!(summary.projection, "geographic");
    assert_eq!(summary.levels.len(), 2);
    assert!((summary.levels[0].tile_length - 180.0).abs() < 1e-6);
    assert!((summary.levels[1].tile_length - 90.0).abs() < 1e-6);

    tokio::fs::remove_dir_all(&root).await.unwrap();
}

#[tokio::test]
async fn test_failed_bounds_projection_is_an_error() {
    let broken = Projector::new(
        "broken",
        |_| Err(ProjectionError::Backend("no grid".to_string())),
        |p| Ok(p),
    );
    let source = TileSource::new(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        Arc::new(ColumnImagery::new()),
        broken,
        Arc::new(WebMercatorGrid::new(TILE_SIZE)),
        test_options(),
    );

    assert!(matches!(
        source.load_tile(ViewportTileKey::new(0, 0, 1)).await,
        Err(SourceError::Projection(_))
    ));
}

#[tokio::test]
async fn test_failed_mesh_projection_skips_tiles() {
    let one_way = Projector::new(
        "one-way",
        |p| Ok(p),
        |_| Err(ProjectionError::Backend("no inverse".to_string())),
    );
    let imagery = Arc::new(ColumnImagery::new());
    let source = TileSource::new(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        imagery.clone(),
        one_way,
        Arc::new(WebMercatorGrid::new(TILE_SIZE)),
        test_options(),
    );

    let tile = source
        .load_tile(ViewportTileKey::new(0, 0, 1))
        .await
        .unwrap()
        .into_rendered()
        .unwrap();
    assert_eq!(tile.source_tiles, 0);
    assert_eq!(imagery.fetch_count(), 0);
}

#[tokio::test]
async fn test_invalid_tile_address() {
    let (source, _) = default_source();
    assert!(matches!(
        source.load_tile(ViewportTileKey::new(4, 0, 2)).await,
        Err(SourceError::InvalidTile { x: 4, y: 0, z: 2 })
    ));
    assert!(matches!(
        source.plan(ViewportTileKey::new(0, 0, 31)).await,
        Err(SourceError::InvalidTile { .. })
    ));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_unload_during_load_is_stale() {
    let imagery = Arc::new(GatedImagery::new());
    let source = Arc::new(geographic_source(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        imagery.clone(),
    ));
    let key = ViewportTileKey::new(0, 0, 1);

    let task = tokio::spawn({
        let source = Arc::clone(&source);
        async move { source.load_tile(key).await }
    });

    imagery.started.notified().await;
    assert_eq!(source.stats().await.loads_in_flight, 1);
    source.unload_tile(key).await.unwrap();
    imagery.release();

    let outcome = task.await.unwrap().unwrap();
    assert!(outcome.is_stale());

    let stats = source.stats().await;
    assert_eq!(stats.stale_loads, 1);
    assert_eq!(stats.renders, 0);
    assert_eq!(stats.cache_entries, 0);
    assert_eq!(stats.loads_in_flight, 0);

    // A fresh load after the unload renders normally
    let tile = source.load_tile(key).await.unwrap().into_rendered().unwrap();
    assert!(!tile.cache_hit);
    assert_eq!(*decode_png(&tile.data).get_pixel(64, 128), GREEN);
}

#[tokio::test]
async fn test_unload_other_tile_does_not_cancel() {
    let imagery = Arc::new(GatedImagery::new());
    let source = Arc::new(geographic_source(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        imagery.clone(),
    ));
    let key = ViewportTileKey::new(0, 0, 1);

    let task = tokio::spawn({
        let source = Arc::clone(&source);
        async move { source.load_tile(key).await }
    });

    imagery.started.notified().await;
    source
        .unload_tile(ViewportTileKey::new(1, 0, 1))
        .await
        .unwrap();
    imagery.release();

    let outcome = task.await.unwrap().unwrap();
    assert!(!outcome.is_stale());
    assert_eq!(source.stats().await.cache_entries, 1);
}

#[tokio::test]
async fn test_closed_source_rejects_loads() {
    let (source, _) = default_source();
    source.load_tile(ViewportTileKey::new(0, 0, 0)).await.unwrap();

    source.close();
    assert!(matches!(
        source.load_tile(ViewportTileKey::new(0, 0, 0)).await,
        Err(SourceError::Closed)
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_loads_share_one_surface() {
    let imagery = Arc::new(ColumnImagery::new());
    let source = Arc::new(geographic_source_with_options(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        imagery,
        SourceOptions {
            pool_size: 1,
            ..test_options()
        },
    ));

    let mut loads = JoinSet::new();
    for x in 0..4 {
        for y in 0..4 {
            let source = Arc::clone(&source);
            loads.spawn(async move { source.load_tile(ViewportTileKey::new(x, y, 2)).await });
        }
    }

    let mut rendered = 0;
    while let Some(joined) = loads.join_next().await {
        let tile = joined.unwrap().unwrap().into_rendered().unwrap();
        assert!(is_valid_png(&tile.data));
        rendered += 1;
    }
    assert_eq!(rendered, 16);

    let stats = source.stats().await;
    assert_eq!(stats.renders, 16);
    assert_eq!(stats.surfaces_created, 1);
    assert_eq!(stats.surfaces_available, 1);
}

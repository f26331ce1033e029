use heatmap_core::{codec, HeatmapOptions, LatLong, PyramidBuilder, SpatialPyramid, TileCoordinate};
use heatmap_render::{Color, HeatmapRenderer, HeatmapSet, RenderOptions};
use std::sync::Arc;

fn pyramid(points: &[(f64, f64)], copies: usize) -> Arc<SpatialPyramid> {
    let mut builder = PyramidBuilder::new(HeatmapOptions::new(2, 0, 4).unwrap()).unwrap();
    for _ in 0..copies {
        builder.feed_all(points.iter().map(|&(lat, lon)| LatLong::new(lat, lon)));
    }
    Arc::new(builder.build().unwrap())
}

fn renderer(set: &Arc<HeatmapSet>) -> HeatmapRenderer {
    let options = RenderOptions {
        level_resolution: 2,
        tile_size: 32,
        ..RenderOptions::default()
    };
    HeatmapRenderer::new(Arc::clone(set), options).unwrap()
}

fn tile(x: u32, y: u32, zoom: u8) -> TileCoordinate {
    TileCoordinate::new(x, y, zoom).unwrap()
}

#[test]
fn antimeridian_neighbors_share_the_seam() {
    let _ = env_logger::builder().is_test(true).try_init();
    let set = Arc::new(HeatmapSet::new());
    set.add(pyramid(&[(40.0, 179.9)], 1));
    let renderer = renderer(&set);

    let east = renderer.render_tile(tile(3, 1, 2)).unwrap();
    let west = renderer.render_tile(tile(0, 1, 2)).unwrap();

    assert!(east.image.get_pixel(31, 20)[3] > 0);
    // The point sits east of the antimeridian, yet bleeds into x = 0
    assert!(west.image.get_pixel(0, 20)[3] > 0);
    assert_eq!(west.image.get_pixel(31, 20)[3], 0);
}

#[test]
fn northern_edge_tile_crops_its_own_band() {
    let set = Arc::new(HeatmapSet::new());
    set.add(pyramid(&[(60.0, 90.0)], 3));
    let renderer = renderer(&set);

    let north = renderer.render_tile(tile(1, 0, 1)).unwrap();
    assert!(north.image.pixels().any(|p| p[3] > 0));

    let south = renderer.render_tile(tile(1, 1, 1)).unwrap();
    assert!(south
        .image
        .pixels()
        .all(|p| *p == Color::TRANSPARENT.to_rgba()));
}

#[test]
fn world_tile_renders_at_zoom_zero() {
    let set = Arc::new(HeatmapSet::new());
    set.add(pyramid(&[(10.0, 10.0), (-45.0, -100.0)], 1));
    let rendered = renderer(&set).render_tile(tile(0, 0, 0)).unwrap();

    assert_eq!(rendered.image.dimensions(), (32, 32));
    assert!(rendered.image.pixels().any(|p| p[3] > 0));
}

#[test]
fn overlaid_heatmaps_accumulate() {
    let points = [(20.0, 20.0)];
    let single = Arc::new(HeatmapSet::new());
    single.add(pyramid(&points, 3));

    let double = Arc::new(HeatmapSet::new());
    double.add(pyramid(&points, 3));
    double.add(pyramid(&points, 3));

    let target = TileCoordinate::from_lat_long(LatLong::new(20.0, 20.0), 2);
    let one = renderer(&single).render_tile(target).unwrap();
    let two = renderer(&double).render_tile(target).unwrap();

    let hottest = |image: &image::RgbaImage| image.pixels().map(|p| p[0]).max().unwrap_or(0);
    assert!(hottest(&two.image) > hottest(&one.image));
}

#[test]
fn decoded_pyramid_renders_identically() {
    let original = pyramid(&[(48.85, 2.35), (51.5, -0.12), (40.4, -3.7)], 2);
    let decoded = codec::decode_binary(&codec::encode_binary(&original).unwrap()).unwrap();

    let a = Arc::new(HeatmapSet::new());
    a.add(original);
    let b = Arc::new(HeatmapSet::new());
    b.add(Arc::new(decoded));

    let target = tile(1, 1, 2);
    let left = renderer(&a).render_tile(target).unwrap();
    let right = renderer(&b).render_tile(target).unwrap();
    assert_eq!(left.image, right.image);
}

#[test]
fn batch_render_keeps_request_order() {
    let set = Arc::new(HeatmapSet::new());
    set.add(pyramid(&[(0.0, 0.0)], 1));
    let renderer = renderer(&set);

    let tiles = vec![tile(0, 0, 1), tile(1, 1, 1), tile(0, 0, 29), tile(2, 2, 2)];
    let results = renderer.render_tiles(&tiles);

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().tile, tiles[0]);
    assert_eq!(results[1].as_ref().unwrap().tile, tiles[1]);
    assert!(results[2].is_err());
    assert_eq!(results[3].as_ref().unwrap().tile, tiles[3]);
}

#[test]
fn rendered_tiles_saved_as_png() {
    let set = Arc::new(HeatmapSet::new());
    set.add(pyramid(&[(35.0, 139.7)], 5));
    let target = TileCoordinate::from_lat_long(LatLong::new(35.0, 139.7), 3);
    let rendered = renderer(&set).render_tile(target).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tile.png");
    rendered.save_png(&path).unwrap();

    let loaded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(loaded, rendered.image);
}

#[test]
fn renders_stay_whole_while_heatmaps_change() {
    let set = Arc::new(HeatmapSet::new());
    set.add(pyramid(&[(10.0, 10.0)], 2));
    let renderer = renderer(&set);
    let extra = pyramid(&[(12.0, 14.0), (-30.0, 60.0)], 4);
    let tiles: Vec<_> = (0..4).flat_map(|x| (0..4).map(move |y| tile(x, y, 2))).collect();

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            for round in 0..50 {
                let id = set.add(Arc::clone(&extra));
                if round % 5 == 0 {
                    set.clear();
                } else {
                    set.remove(id);
                }
            }
        });

        for _ in 0..10 {
            for result in renderer.render_tiles(&tiles) {
                let rendered = result.unwrap();
                assert_eq!(rendered.image.dimensions(), (32, 32));
            }
        }
        writer.join().unwrap();
    });

    // Every add was followed by a remove or clear
    assert!(set.is_empty());
    let before = set.data_timestamp();
    set.add(Arc::clone(&extra));
    assert!(set.data_timestamp() > before);
}

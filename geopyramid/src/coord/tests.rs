use super::*;
use std::collections::HashSet;

fn addr(z: u8, x: u32, y: u32) -> TileAddress {
    TileAddress::new(z, x, y).unwrap()
}

#[test]
fn test_zoom_zero_covers_world_square() {
    let b = tile_bounds(&addr(0, 0, 0));
    assert_eq!(b.crs, BoundsCrs::WebMercator);
    assert!((b.minx + ORIGIN_SHIFT).abs() < 1e-6);
    assert!((b.maxx - ORIGIN_SHIFT).abs() < 1e-6);
    assert!((b.miny + ORIGIN_SHIFT).abs() < 1e-6);
    assert!((b.maxy - ORIGIN_SHIFT).abs() < 1e-6);
}

#[test]
fn test_row_zero_is_northernmost() {
    let north = tile_bounds(&addr(1, 0, 0));
    let south = tile_bounds(&addr(1, 0, 1));
    assert!(north.miny >= south.maxy - 1e-6);
    assert!((north.maxy - ORIGIN_SHIFT).abs() < 1e-6);
}

#[test]
fn test_tile_address_rejects_out_of_range() {
    assert!(matches!(
        TileAddress::new(2, 4, 0),
        Err(CoordError::ColumnOutOfRange { z: 2, x: 4 })
    ));
    assert!(matches!(
        TileAddress::new(2, 0, 4),
        Err(CoordError::RowOutOfRange { z: 2, y: 4 })
    ));
    assert!(matches!(TileAddress::new(32, 0, 0), Err(CoordError::InvalidZoom(32))));
    assert_eq!(addr(3, 7, 7).to_string(), "3/7/7");
}

#[test]
fn test_geographic_tile_bounds() {
    let b = tile_bounds_geographic(&addr(1, 1, 0));
    assert_eq!(b.crs, BoundsCrs::Geographic);
    assert!(b.minx.abs() < 1e-9);
    assert!((b.maxx - 180.0).abs() < 1e-9);
    assert!(b.miny.abs() < 1e-9);
    assert!((b.maxy - MAX_LAT).abs() < 1e-6);
}

#[test]
fn test_mercator_roundtrip() {
    let (x, y) = lon_lat_to_mercator(-74.0060, 40.7128);
    let (lon, lat) = mercator_to_lon_lat(x, y);
    assert!((lon + 74.0060).abs() < 1e-9);
    assert!((lat - 40.7128).abs() < 1e-9);
}

#[test]
fn test_mercator_clamps_poles() {
    let (_, y) = lon_lat_to_mercator(0.0, 90.0);
    assert!(y.is_finite());
    assert!((y - ORIGIN_SHIFT).abs() < 1.0);
}

#[test]
fn test_covering_single_point() {
    // New York City
    let p = GeoBounds::geographic(-74.0060, 40.7128, -74.0060, 40.7128);
    let range = tiles_covering(&p, 16);
    let tiles: Vec<_> = range.into_iter().collect();
    assert_eq!(tiles, vec![addr(16, 19295, 24640)]);
}

#[test]
fn test_covering_point_on_origin() {
    let p = GeoBounds::geographic(0.0, 0.0, 0.0, 0.0);
    let tiles: Vec<_> = tiles_covering(&p, 1).into_iter().collect();
    assert_eq!(tiles, vec![addr(1, 1, 1)]);
}

#[test]
fn test_covering_edge_on_tile_boundary_excludes_neighbour() {
    // Exactly the north-east quadrant at zoom 1
    let b = GeoBounds::geographic(0.0, 0.0, 180.0, MAX_LAT);
    let tiles: Vec<_> = tiles_covering(&b, 1).into_iter().collect();
    assert_eq!(tiles, vec![addr(1, 1, 0)]);
}

#[test]
fn test_covering_invalid_or_offmap_is_empty() {
    let inverted = GeoBounds::geographic(10.0, 0.0, -10.0, 5.0);
    assert!(tiles_covering(&inverted, 4).is_empty());

    let nan = GeoBounds::geographic(f64::NAN, 0.0, 1.0, 1.0);
    assert!(tiles_covering(&nan, 4).is_empty());

    let east_of_map = GeoBounds::geographic(190.0, 0.0, 200.0, 10.0);
    assert_eq!(tiles_covering(&east_of_map, 4).into_iter().count(), 0);

    let polar = GeoBounds::geographic(-10.0, 86.0, 10.0, 89.0);
    assert!(tiles_covering(&polar, 4).is_empty());
}

#[test]
fn test_covering_accepts_web_mercator_bounds() {
    let t = tile_bounds(&addr(5, 10, 12));
    let merc = GeoBounds::web_mercator(t.minx + 1.0, t.miny + 1.0, t.maxx - 1.0, t.maxy - 1.0);
    let tiles: Vec<_> = tiles_covering(&merc, 5).into_iter().collect();
    assert_eq!(tiles, vec![addr(5, 10, 12)]);
}

#[test]
fn test_tile_range_is_restartable() {
    let range = tiles_covering(&GeoBounds::world(), 2);
    let first: Vec<_> = range.iter().collect();
    let second: Vec<_> = range.iter().collect();
    assert_eq!(first, second);
    assert_eq!(range.len(), 16);
    assert_eq!(range.iter().size_hint(), (16, Some(16)));
    assert!(range.contains(&addr(2, 3, 3)));
    assert!(!range.contains(&addr(3, 3, 3)));
}

#[test]
fn test_bounds_validity_and_intersection() {
    let a = GeoBounds::web_mercator(0.0, 0.0, 10.0, 10.0);
    let b = GeoBounds::web_mercator(10.0, 10.0, 20.0, 20.0);
    let c = GeoBounds::web_mercator(11.0, 11.0, 20.0, 20.0);
    let point = GeoBounds::web_mercator(5.0, 5.0, 5.0, 5.0);
    let invalid = GeoBounds::web_mercator(5.0, 0.0, 4.0, 1.0);

    assert!(a.intersects(&b), "touching edges intersect");
    assert!(!a.intersects(&c));
    assert!(point.is_valid());
    assert!(a.intersects(&point));
    assert!(!invalid.is_valid());
    assert!(!a.intersects(&invalid));
    assert_eq!(a.union(&invalid), a);
}

#[test]
fn test_bounds_from_points() {
    let b = GeoBounds::from_points([(1.0, 5.0), (-2.0, 3.0), (4.0, -1.0)], BoundsCrs::Geographic)
        .unwrap();
    assert_eq!(b, GeoBounds::geographic(-2.0, -1.0, 4.0, 5.0));
    assert!(GeoBounds::from_points(Vec::new(), BoundsCrs::Geographic).is_none());
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Tile footprints are squares of the expected size
        #[test]
        fn prop_tile_size_matches_zoom(z in 0u8..=22, fx in 0.0f64..1.0, fy in 0.0f64..1.0) {
            let n = tiles_per_side(z);
            let x = ((n as f64 * fx) as u64).min(n - 1) as u32;
            let y = ((n as f64 * fy) as u64).min(n - 1) as u32;
            let b = tile_bounds(&TileAddress::new(z, x, y).unwrap());
            let expected = 40075016.6856 / 2f64.powi(z as i32);
            prop_assert!((b.width() - expected).abs() < 1e-3);
            prop_assert!((b.height() - expected).abs() < 1e-3);
        }

        /// A single point is covered by exactly one tile, which contains it
        #[test]
        fn prop_point_covered_by_one_tile(
            lon in -179.9f64..179.9,
            lat in -85.0f64..85.0,
            z in 0u8..=18
        ) {
            let p = GeoBounds::geographic(lon, lat, lon, lat);
            let range = tiles_covering(&p, z);
            prop_assert_eq!(range.len(), 1);
            let tile = range.iter().next().unwrap();
            let b = tile_bounds_geographic(&tile);
            prop_assert!(b.minx - 1e-9 <= lon && lon <= b.maxx + 1e-9);
            prop_assert!(b.miny - 1e-9 <= lat && lat <= b.maxy + 1e-9);
        }
    }

    #[test]
    fn test_world_yields_every_tile_once() {
        for z in 0u8..=6 {
            let tiles: Vec<_> = tiles_covering(&GeoBounds::world(), z).into_iter().collect();
            let unique: HashSet<_> = tiles.iter().copied().collect();
            assert_eq!(tiles.len() as u64, 4u64.pow(z as u32));
            assert_eq!(unique.len(), tiles.len());
        }
    }
}

//! Vector tile rasterization.

use geo::{Coord, Geometry, Intersects, LineString, Polygon, Rect};
use tiny_skia::{Color, FillRule, Paint, Path, PathBuilder, Pixmap, Shader, Stroke, Transform};
use tracing::trace;

use super::{SkipReason, TileImage, TileRender, TileRenderer, TileStyle};
use crate::coord::{tile_bounds, GeoBounds, TileAddress, TILE_SIZE};
use crate::dataset::VectorDataset;
use crate::index::SpatialIndex;

/// Draws the features intersecting each tile.
pub struct VectorRenderer<'a> {
    dataset: &'a VectorDataset,
    index: &'a SpatialIndex,
    style: TileStyle,
}

impl<'a> VectorRenderer<'a> {
    pub fn new(dataset: &'a VectorDataset, index: &'a SpatialIndex, style: TileStyle) -> Self {
        Self {
            dataset,
            index,
            style,
        }
    }
}

impl TileRenderer for VectorRenderer<'_> {
    fn render(&self, addr: &TileAddress) -> TileRender {
        let bounds = tile_bounds(addr);
        let tile_rect = Rect::new((bounds.minx, bounds.miny), (bounds.maxx, bounds.maxy));

        // Dataset order is the painter's order.
        let mut hits: Vec<usize> = self
            .index
            .candidates(&bounds)
            .filter(|&i| self.dataset.features()[i].geometry.intersects(&tile_rect))
            .collect();
        if hits.is_empty() {
            return TileRender::Skipped(SkipReason::NoFeatures);
        }
        hits.sort_unstable();

        let Some(mut pixmap) = Pixmap::new(TILE_SIZE, TILE_SIZE) else {
            return TileRender::Failed("could not allocate canvas".to_string());
        };
        let mut canvas = Canvas::new(&mut pixmap, &bounds, &self.style);
        for &i in &hits {
            canvas.draw(&self.dataset.features()[i].geometry);
        }
        let drawn = canvas.drawn;
        trace!(tile = %addr, features = hits.len(), drawn, "Rasterized vector tile");

        if drawn == 0 {
            return TileRender::Skipped(SkipReason::Degenerate);
        }
        match TileImage::from_pixmap(&pixmap) {
            Some(image) => TileRender::Rendered(image),
            None => TileRender::Failed("canvas has unexpected size".to_string()),
        }
    }
}

fn solid(rgba: [u8; 4]) -> Paint<'static> {
    Paint {
        shader: Shader::SolidColor(Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3])),
        anti_alias: true,
        ..Default::default()
    }
}

/// Pixmap plus the linear map from tile meters to pixels.
struct Canvas<'p> {
    pixmap: &'p mut Pixmap,
    minx: f64,
    maxy: f64,
    scale_x: f64,
    scale_y: f64,
    fill: Paint<'static>,
    outline: Paint<'static>,
    stroke: Stroke,
    point_radius: f32,
    drawn: usize,
}

impl<'p> Canvas<'p> {
    fn new(pixmap: &'p mut Pixmap, bounds: &GeoBounds, style: &TileStyle) -> Self {
        let size = f64::from(TILE_SIZE);
        Self {
            pixmap,
            minx: bounds.minx,
            maxy: bounds.maxy,
            scale_x: size / bounds.width(),
            scale_y: size / bounds.height(),
            fill: solid(style.fill),
            outline: solid(style.outline),
            stroke: Stroke {
                width: style.outline_width,
                ..Default::default()
            },
            point_radius: style.point_radius,
            drawn: 0,
        }
    }

    #[inline]
    fn to_px(&self, c: Coord<f64>) -> (f32, f32) {
        (
            ((c.x - self.minx) * self.scale_x) as f32,
            ((self.maxy - c.y) * self.scale_y) as f32,
        )
    }

    fn draw(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(p) => self.point(p.0),
            Geometry::MultiPoint(mp) => mp.iter().for_each(|p| self.point(p.0)),
            Geometry::Line(l) => self.line(&LineString::from(vec![l.start, l.end])),
            Geometry::LineString(ls) => self.line(ls),
            Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| self.line(ls)),
            Geometry::Polygon(p) => self.polygon(p),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| self.polygon(p)),
            Geometry::Rect(r) => self.polygon(&r.to_polygon()),
            Geometry::Triangle(t) => self.polygon(&t.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.draw(g)),
        }
    }

    fn point(&mut self, c: Coord<f64>) {
        let (x, y) = self.to_px(c);
        if let Some(path) = PathBuilder::from_circle(x, y, self.point_radius) {
            self.fill_and_outline(&path);
        }
    }

    fn line(&mut self, ls: &LineString<f64>) {
        let mut pb = PathBuilder::new();
        self.trace_ring(&mut pb, ls, false);
        if let Some(path) = pb.finish() {
            self.pixmap
                .stroke_path(&path, &self.fill, &self.stroke, Transform::identity(), None);
            self.drawn += 1;
        }
    }

    fn polygon(&mut self, polygon: &Polygon<f64>) {
        let mut pb = PathBuilder::new();
        self.trace_ring(&mut pb, polygon.exterior(), true);
        for interior in polygon.interiors() {
            self.trace_ring(&mut pb, interior, true);
        }
        if let Some(path) = pb.finish() {
            self.fill_and_outline(&path);
        }
    }

    fn trace_ring(&self, pb: &mut PathBuilder, ring: &LineString<f64>, close: bool) {
        let mut coords = ring.coords();
        let Some(first) = coords.next() else {
            return;
        };
        let (x, y) = self.to_px(*first);
        pb.move_to(x, y);
        for c in coords {
            let (x, y) = self.to_px(*c);
            pb.line_to(x, y);
        }
        if close {
            pb.close();
        }
    }

    fn fill_and_outline(&mut self, path: &Path) {
        self.pixmap
            .fill_path(path, &self.fill, FillRule::EvenOdd, Transform::identity(), None);
        if self.stroke.width > 0.0 {
            self.pixmap
                .stroke_path(path, &self.outline, &self.stroke, Transform::identity(), None);
        }
        self.drawn += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::tiles_covering;
    use crate::projection::Crs;
    use geo::{line_string, point, polygon};

    fn dataset(geometries: Vec<Geometry<f64>>) -> (VectorDataset, SpatialIndex) {
        let ds = VectorDataset::from_geometries(geometries, &Crs::wgs84()).unwrap();
        let index = SpatialIndex::build(&ds);
        (ds, index)
    }

    fn pixel(image: &TileImage, x: usize, y: usize) -> [u8; 4] {
        let i = (y * TILE_SIZE as usize + x) * 4;
        let b = image.as_bytes();
        [b[i], b[i + 1], b[i + 2], b[i + 3]]
    }

    fn rendered(render: TileRender) -> TileImage {
        match render {
            TileRender::Rendered(image) => image,
            other => panic!("expected a rendered tile, got {other:?}"),
        }
    }

    #[test]
    fn test_point_draws_red_dot() {
        let (ds, index) = dataset(vec![Geometry::Point(point!(x: 10.0, y: 10.0))]);
        let renderer = VectorRenderer::new(&ds, &index, TileStyle::default());
        let tile = tiles_covering(&ds.geographic_extent().unwrap(), 0).iter().next().unwrap();

        let image = rendered(renderer.render(&tile));
        assert_eq!(image.channels(), 4);
        assert!(image.as_bytes().iter().skip(3).step_by(4).any(|&a| a > 0));
        // Far corner stays transparent
        assert_eq!(pixel(&image, 0, 0)[3], 0);
    }

    #[test]
    fn test_empty_tile_is_skipped() {
        let (ds, index) = dataset(vec![Geometry::Point(point!(x: 10.0, y: 10.0))]);
        let renderer = VectorRenderer::new(&ds, &index, TileStyle::default());
        let far = TileAddress::new(2, 0, 3).unwrap();
        assert!(matches!(
            renderer.render(&far),
            TileRender::Skipped(SkipReason::NoFeatures)
        ));
    }

    #[test]
    fn test_polygon_fill_and_hole() {
        // Square with a hole, covering most of tile 1/1/0
        let square = polygon!(
            exterior: [
                (x: 10.0, y: 10.0),
                (x: 170.0, y: 10.0),
                (x: 170.0, y: 80.0),
                (x: 10.0, y: 80.0),
                (x: 10.0, y: 10.0)
            ],
            interiors: [
                [
                    (x: 80.0, y: 40.0),
                    (x: 100.0, y: 40.0),
                    (x: 100.0, y: 60.0),
                    (x: 80.0, y: 60.0),
                    (x: 80.0, y: 40.0)
                ]
            ]
        );
        let (ds, index) = dataset(vec![Geometry::Polygon(square)]);
        let renderer = VectorRenderer::new(&ds, &index, TileStyle::default());
        let image = rendered(renderer.render(&TileAddress::new(1, 1, 0).unwrap()));

        // Inside the ring, away from edges: solid red
        assert_eq!(pixel(&image, 40, 200), [255, 0, 0, 255]);
        // Top-left corner of the tile is outside the square
        assert_eq!(pixel(&image, 1, 1)[3], 0);
    }

    #[test]
    fn test_line_uses_fill_colour() {
        let line = line_string![(x: -170.0, y: 0.5), (x: 170.0, y: 0.5)];
        let (ds, index) = dataset(vec![Geometry::LineString(line)]);
        let style = TileStyle::default().with_fill([0, 0, 255, 255]);
        let renderer = VectorRenderer::new(&ds, &index, style);
        let image = rendered(renderer.render(&TileAddress::new(0, 0, 0).unwrap()));

        let blue = image
            .as_bytes()
            .chunks_exact(4)
            .filter(|p| p[2] > 0 && p[0] == 0 && p[3] > 0)
            .count();
        assert!(blue > 200, "expected a horizontal blue line, got {blue} pixels");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let (ds, index) = dataset(vec![
            Geometry::Point(point!(x: -20.0, y: 15.0)),
            Geometry::LineString(line_string![(x: -40.0, y: -30.0), (x: 60.0, y: 45.0)]),
        ]);
        let renderer = VectorRenderer::new(&ds, &index, TileStyle::default());
        let addr = TileAddress::new(1, 0, 0).unwrap();
        let first = rendered(renderer.render(&addr));
        let second = rendered(renderer.render(&addr));
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_single_coordinate_line_draws_nothing() {
        // Such a line intersects its tile but has no segment to stroke, which
        // is what turns into Skipped(Degenerate) rather than a blank PNG.
        let bounds = tile_bounds(&TileAddress::new(0, 0, 0).unwrap());
        let mut pixmap = Pixmap::new(TILE_SIZE, TILE_SIZE).unwrap();
        let mut canvas = Canvas::new(&mut pixmap, &bounds, &TileStyle::default());

        canvas.draw(&Geometry::LineString(LineString::from(vec![(0.0, 0.0)])));
        assert_eq!(canvas.drawn, 0);

        canvas.draw(&Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1e6, y: 1e6)]));
        assert_eq!(canvas.drawn, 1);
    }
}

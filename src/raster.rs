//! Rendering of landmark geometry into synthetic raster patches.

use crate::geometry::{GeoBounds, GeoPoint, Geometry, planar_centroid};
use image::{GrayImage, Luma};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_polygon_mut},
    point::Point,
};

/// Intensity of rendered geometry on the black background.
const FOREGROUND: Luma<u8> = Luma([255u8]);

/// The size of a raster in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterExtent {
    width: u32,
    height: u32,
}

impl RasterExtent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// A position in raster space.
///
/// Columns grow with longitude and rows grow with latitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterPoint {
    pub x: f64,
    pub y: f64,
}

/// Affine map between a [`GeoBounds`] and a [`RasterExtent`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    bounds: GeoBounds,
    extent: RasterExtent,
}

impl Projection {
    pub fn new(bounds: GeoBounds, extent: RasterExtent) -> Self {
        Self { bounds, extent }
    }

    pub fn bounds(&self) -> &GeoBounds {
        &self.bounds
    }

    pub fn extent(&self) -> &RasterExtent {
        &self.extent
    }

    /// Maps `point` into raster space.
    ///
    /// An axis without any span maps to the middle of the raster.
    pub fn forward(&self, point: &GeoPoint) -> RasterPoint {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        RasterPoint {
            x: to_raster(
                point.longitude_deg(),
                min.longitude_deg(),
                max.longitude_deg(),
                self.extent.width,
            ),
            y: to_raster(
                point.latitude_deg(),
                min.latitude_deg(),
                max.latitude_deg(),
                self.extent.height,
            ),
        }
    }

    /// Maps a raster position back to geodetic coordinates.
    pub fn inverse(&self, point: &RasterPoint) -> GeoPoint {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        GeoPoint::from_degrees(
            from_raster(
                point.y,
                min.latitude_deg(),
                max.latitude_deg(),
                self.extent.height,
            ),
            from_raster(
                point.x,
                min.longitude_deg(),
                max.longitude_deg(),
                self.extent.width,
            ),
        )
    }
}

fn to_raster(value: f64, min: f64, max: f64, size: u32) -> f64 {
    let span = max - min;
    match span > 0.0 {
        true => (value - min) / span * size as f64,
        false => size as f64 / 2.0,
    }
}

fn from_raster(pixel: f64, min: f64, max: f64, size: u32) -> f64 {
    let span = max - min;
    match span > 0.0 && size > 0 {
        true => min + pixel / size as f64 * span,
        false => min,
    }
}

/// Draws geometry onto blank rasters of a fixed extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Renderer {
    projection: Projection,
    point_radius: i32,
}

impl Renderer {
    pub fn new(projection: Projection, point_radius: u32) -> Self {
        Self {
            projection,
            point_radius: point_radius as i32,
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Renders `geometry` in white onto a black raster.
    ///
    /// A point becomes a filled disc. A polygon becomes its filled outer ring, or a disc at its
    /// projected centroid when fewer than three distinct vertices survive rounding to pixels.
    pub fn render(&self, geometry: &Geometry) -> GrayImage {
        let extent = self.projection.extent();
        let mut canvas = GrayImage::new(extent.width(), extent.height());

        match geometry {
            Geometry::Point(point) => self.draw_disc(&mut canvas, self.projection.forward(point)),
            Geometry::Polygon(ring) => {
                let outline = self.outline(ring);
                if outline.len() >= 3 {
                    draw_polygon_mut(&mut canvas, &outline, FOREGROUND);
                } else if let Some(center) = self.raster_centroid(ring) {
                    self.draw_disc(&mut canvas, center);
                }
            }
        }

        canvas
    }

    /// Returns the geodetic position of `geometry` as seen on the raster.
    ///
    /// A polygon is located at the centroid of its projected ring mapped back through the
    /// projection.
    pub fn locate(&self, geometry: &Geometry) -> Option<GeoPoint> {
        match geometry {
            Geometry::Point(point) => Some(*point),
            Geometry::Polygon(ring) => self
                .raster_centroid(ring)
                .map(|center| self.projection.inverse(&center)),
        }
    }

    fn raster_centroid(&self, ring: &[GeoPoint]) -> Option<RasterPoint> {
        let projected: Vec<(f64, f64)> = ring
            .iter()
            .map(|vertex| {
                let px = self.projection.forward(vertex);
                (px.x, px.y)
            })
            .collect();
        let (x, y) = planar_centroid(&projected)?;
        Some(RasterPoint { x, y })
    }

    fn draw_disc(&self, canvas: &mut GrayImage, center: RasterPoint) {
        draw_filled_circle_mut(
            canvas,
            (center.x.round() as i32, center.y.round() as i32),
            self.point_radius,
            FOREGROUND,
        );
    }

    /// Projects `ring` to pixels dropping repeated vertices and the closing vertex.
    fn outline(&self, ring: &[GeoPoint]) -> Vec<Point<i32>> {
        let mut outline: Vec<Point<i32>> = Vec::with_capacity(ring.len());
        for vertex in ring {
            let px = self.projection.forward(vertex);
            let px = Point::new(px.x.round() as i32, px.y.round() as i32);
            if outline.last() != Some(&px) {
                outline.push(px);
            }
        }

        while outline.len() > 1 && outline.last() == outline.first() {
            outline.pop();
        }

        outline
    }
}

use uom::si::{angle::degree, f64::Angle};

/// A geodetic coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    latitude: Angle,
    longitude: Angle,
}

impl GeoPoint {
    pub fn new(latitude: Angle, longitude: Angle) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self::new(
            Angle::new::<degree>(latitude),
            Angle::new::<degree>(longitude),
        )
    }

    pub fn latitude(&self) -> Angle {
        self.latitude
    }

    pub fn longitude(&self) -> Angle {
        self.longitude
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude.get::<degree>()
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude.get::<degree>()
    }
}

/// The shape of a map feature.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(GeoPoint),

    /// The outer ring of a polygon.
    ///
    /// The ring may or may not repeat its first vertex at the end.
    Polygon(Vec<GeoPoint>),
}

impl Geometry {
    /// Returns every coordinate of the geometry.
    pub fn vertices(&self) -> &[GeoPoint] {
        match self {
            Geometry::Point(point) => std::slice::from_ref(point),
            Geometry::Polygon(ring) => ring.as_slice(),
        }
    }

    /// Returns the point used as the geometry's position.
    ///
    /// A point is its own position, a polygon reduces to its area weighted centroid.
    /// Returns `None` for a polygon without vertices.
    pub fn position(&self) -> Option<GeoPoint> {
        match self {
            Geometry::Point(point) => Some(*point),
            Geometry::Polygon(ring) => centroid(ring),
        }
    }
}

/// Area weighted centroid of a ring treating degrees as planar coordinates.
///
/// Falls back to the mean vertex when the ring encloses no area.
pub fn centroid(ring: &[GeoPoint]) -> Option<GeoPoint> {
    let xy: Vec<(f64, f64)> = ring
        .iter()
        .map(|p| (p.longitude_deg(), p.latitude_deg()))
        .collect();
    let (lon, lat) = planar_centroid(&xy)?;
    Some(GeoPoint::from_degrees(lat, lon))
}

/// Area weighted centroid of a planar ring, or its mean vertex when it encloses no area.
///
/// A closing vertex equal to the first one is ignored.
pub(crate) fn planar_centroid(ring: &[(f64, f64)]) -> Option<(f64, f64)> {
    let &(x0, y0) = ring.first()?;
    let closed = ring.len() > 1 && ring.last() == ring.first();
    let vertices = match closed {
        true => &ring[..ring.len() - 1],
        false => ring,
    };

    // Shift to the first vertex to keep the cross products well conditioned.
    let xy: Vec<(f64, f64)> = vertices.iter().map(|&(x, y)| (x - x0, y - y0)).collect();

    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, &(xa, ya)) in xy.iter().enumerate() {
        let (xb, yb) = xy[(i + 1) % xy.len()];
        let cross = xa * yb - xb * ya;
        area2 += cross;
        cx += (xa + xb) * cross;
        cy += (ya + yb) * cross;
    }

    if area2.abs() <= f64::EPSILON * 1e3 {
        let n = xy.len() as f64;
        let (sx, sy) = xy
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        return Some((x0 + sx / n, y0 + sy / n));
    }

    Some((x0 + cx / (3.0 * area2), y0 + cy / (3.0 * area2)))
}

/// An axis aligned region in geodetic coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    min: GeoPoint,
    max: GeoPoint,
}

impl GeoBounds {
    pub fn new(min: GeoPoint, max: GeoPoint) -> Self {
        Self { min, max }
    }

    /// Returns the smallest bounds containing every vertex of `geometries`.
    ///
    /// Returns `None` if `geometries` has no vertices.
    pub fn covering<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> Option<Self> {
        geometries
            .into_iter()
            .flat_map(|geometry| geometry.vertices().iter())
            .fold(None, |bounds: Option<GeoBounds>, point| {
                Some(match bounds {
                    Some(bounds) => bounds.extend(point),
                    None => GeoBounds::new(*point, *point),
                })
            })
    }

    fn extend(self, point: &GeoPoint) -> Self {
        Self {
            min: GeoPoint::new(
                self.min.latitude.min(point.latitude),
                self.min.longitude.min(point.longitude),
            ),
            max: GeoPoint::new(
                self.max.latitude.max(point.latitude),
                self.max.longitude.max(point.longitude),
            ),
        }
    }

    pub fn min(&self) -> GeoPoint {
        self.min
    }

    pub fn max(&self) -> GeoPoint {
        self.max
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min.latitude..=self.max.latitude).contains(&point.latitude)
            && (self.min.longitude..=self.max.longitude).contains(&point.longitude)
    }

    /// Returns `true` if any vertex of `geometry` lies inside the bounds.
    pub fn touches(&self, geometry: &Geometry) -> bool {
        geometry.vertices().iter().any(|point| self.contains(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::from_degrees(lat, lon)
    }

    fn square(closed: bool) -> Vec<GeoPoint> {
        let mut ring = vec![p(47.0, 8.0), p(47.0, 8.2), p(47.2, 8.2), p(47.2, 8.0)];
        if closed {
            ring.push(p(47.0, 8.0));
        }
        ring
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn square_centroid(#[case] closed: bool) {
        let c = centroid(&square(closed)).unwrap();
        assert_relative_eq!(c.latitude_deg(), 47.1, epsilon = 1e-9);
        assert_relative_eq!(c.longitude_deg(), 8.1, epsilon = 1e-9);
    }

    #[test]
    fn centroid_is_area_weighted() {
        // An L shape whose mean vertex differs from its centroid.
        let ring = vec![
            p(0.0, 0.0),
            p(0.0, 2.0),
            p(1.0, 2.0),
            p(1.0, 1.0),
            p(2.0, 1.0),
            p(2.0, 0.0),
        ];
        let c = centroid(&ring).unwrap();
        assert_relative_eq!(c.latitude_deg(), 5.0 / 6.0, epsilon = 1e-9);
        assert_relative_eq!(c.longitude_deg(), 5.0 / 6.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_ring_uses_mean_vertex() {
        let ring = vec![p(1.0, 1.0), p(2.0, 2.0), p(3.0, 3.0)];
        let c = centroid(&ring).unwrap();
        assert_relative_eq!(c.latitude_deg(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(c.longitude_deg(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_ring_has_no_position() {
        assert_eq!(Geometry::Polygon(vec![]).position(), None);
    }

    #[test]
    fn bounds_cover_polygon_vertices() {
        let geometries = vec![Geometry::Point(p(47.1, 8.1)), Geometry::Polygon(square(true))];
        let bounds = GeoBounds::covering(&geometries).unwrap();
        assert_relative_eq!(bounds.min().latitude_deg(), 47.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.min().longitude_deg(), 8.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.max().latitude_deg(), 47.2, epsilon = 1e-9);
        assert_relative_eq!(bounds.max().longitude_deg(), 8.2, epsilon = 1e-9);
        assert!(bounds.contains(&p(47.1, 8.1)));
        assert!(!bounds.contains(&p(46.9, 8.1)));
    }

    #[test]
    fn no_geometries_have_no_bounds() {
        assert_eq!(GeoBounds::covering(&Vec::new()), None);
    }
}

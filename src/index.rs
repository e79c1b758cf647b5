//! The searchable pool of landmark descriptors for a mission area.

use crate::{
    descriptor::Descriptor,
    extract::FeatureExtractor,
    geometry::{GeoBounds, GeoPoint, Geometry},
    provider::{GeometryProvider, MissionArea},
    raster::{Projection, RasterExtent, Renderer},
};
use log::{debug, info, warn};
use rayon::prelude::*;

/// Radius of the disc a point landmark is rendered as.
pub const DEFAULT_POINT_RADIUS: u32 = 3;

/// Turns landmark geometry into appearance descriptors.
///
/// Implementations must be pure: the same geometry always yields the same descriptors.
pub trait Appearance {
    fn describe(&self, geometry: &Geometry) -> Vec<Descriptor>;

    /// Returns the position a landmark built from `geometry` is stored at.
    fn locate(&self, geometry: &Geometry) -> Option<GeoPoint> {
        geometry.position()
    }
}

/// Describes geometry by rendering it and extracting features from the raster.
pub struct RasterAppearance<E> {
    renderer: Renderer,
    extractor: E,
}

impl<E> RasterAppearance<E> {
    pub fn new(renderer: Renderer, extractor: E) -> Self {
        Self {
            renderer,
            extractor,
        }
    }
}

impl<E: FeatureExtractor> Appearance for RasterAppearance<E> {
    fn describe(&self, geometry: &Geometry) -> Vec<Descriptor> {
        self.extractor
            .extract(&self.renderer.render(geometry))
            .into_iter()
            .map(|feature| feature.descriptor)
            .collect()
    }

    fn locate(&self, geometry: &Geometry) -> Option<GeoPoint> {
        self.renderer.locate(geometry)
    }
}

/// Rendering parameters used while building an index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexParams {
    pub extent: RasterExtent,
    pub point_radius: u32,
}

impl IndexParams {
    pub fn new(extent: RasterExtent) -> Self {
        Self {
            extent,
            point_radius: DEFAULT_POINT_RADIUS,
        }
    }
}

/// A geo-located map feature and the descriptors of its appearance.
#[derive(Clone, Debug, PartialEq)]
pub struct Landmark {
    position: GeoPoint,
    descriptors: Vec<Descriptor>,
}

impl Landmark {
    /// Creates a `Landmark` at `position`.
    ///
    /// Returns `None` if `descriptors` is empty since such a landmark can never be matched.
    pub fn new(position: GeoPoint, descriptors: Vec<Descriptor>) -> Option<Self> {
        match descriptors.is_empty() {
            true => None,
            false => Some(Self {
                position,
                descriptors,
            }),
        }
    }

    /// The landmark's point, or the centroid of its polygon.
    pub fn position(&self) -> GeoPoint {
        self.position
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }
}

/// Every landmark of a mission area and a flattened pool of their descriptors.
///
/// The index is immutable once built and can be shared freely between threads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkIndex {
    landmarks: Vec<Landmark>,
    pool: Vec<Descriptor>,

    /// Position of the owning landmark for each pool entry.
    owners: Vec<usize>,
}

impl LandmarkIndex {
    /// Creates an index without landmarks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds an index rendering each geometry onto a raster of `extent`.
    pub fn build<E>(geometries: &[Geometry], extent: RasterExtent, extractor: &E) -> Self
    where
        E: FeatureExtractor + Sync,
    {
        Self::build_with(geometries, &IndexParams::new(extent), extractor)
    }

    /// Builds an index rendering each geometry with `params`.
    ///
    /// All geometries share one projection from their common bounds onto the raster.
    pub fn build_with<E>(geometries: &[Geometry], params: &IndexParams, extractor: &E) -> Self
    where
        E: FeatureExtractor + Sync,
    {
        let Some(bounds) = GeoBounds::covering(geometries) else {
            info!("no landmark geometry, building an empty index");
            return Self::empty();
        };

        let renderer = Renderer::new(Projection::new(bounds, params.extent), params.point_radius);
        Self::from_appearance(geometries, &RasterAppearance::new(renderer, extractor))
    }

    /// Builds an index describing each geometry with `appearance`.
    ///
    /// Geometries are described in parallel. Geometries without a position or without any
    /// descriptor are left out.
    pub fn from_appearance<A>(geometries: &[Geometry], appearance: &A) -> Self
    where
        A: Appearance + Sync,
    {
        let landmarks: Vec<Landmark> = geometries
            .par_iter()
            .filter_map(|geometry| Landmark::new(appearance.locate(geometry)?, appearance.describe(geometry)))
            .collect();

        debug!(
            "{} of {} geometries produced descriptors",
            landmarks.len(),
            geometries.len()
        );

        Self::from_landmarks(landmarks)
    }

    /// Fetches the geometry of `area` from `provider` and builds an index from it.
    ///
    /// A failing provider is not fatal: the failure is logged and the index is empty.
    pub fn from_provider<P, E>(
        provider: &P,
        area: &MissionArea,
        tags: &[String],
        params: &IndexParams,
        extractor: &E,
    ) -> Self
    where
        P: GeometryProvider + ?Sized,
        E: FeatureExtractor + Sync,
    {
        let geometries = provider
            .fetch_landmarks(&area.bounds(), tags)
            .unwrap_or_else(|err| {
                warn!("landmark fetch failed, continuing without landmarks: {err}");
                Vec::new()
            });

        Self::build_with(&geometries, params, extractor)
    }

    /// Creates an index from already described landmarks.
    pub fn from_landmarks(landmarks: Vec<Landmark>) -> Self {
        let (pool, owners): (Vec<Descriptor>, Vec<usize>) = landmarks
            .iter()
            .enumerate()
            .flat_map(|(owner, landmark)| landmark.descriptors.iter().map(move |d| (*d, owner)))
            .unzip();

        info!(
            "indexed {} landmarks with {} descriptors",
            landmarks.len(),
            pool.len()
        );

        Self {
            landmarks,
            pool,
            owners,
        }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Every descriptor of every landmark in landmark order.
    pub fn pool(&self) -> &[Descriptor] {
        &self.pool
    }

    /// Returns the landmark that contributed pool entry `index`.
    pub fn owner(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(*self.owners.get(index)?)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::DESCRIPTOR_BYTES,
        extract::{Feature, Keypoint},
        provider::FetchError,
    };
    use image::GrayImage;
    use uom::si::{f64::Length, length::meter};

    /// Produces one descriptor per lit pixel row, up to `cap`.
    struct RowExtractor {
        cap: usize,
    }

    impl FeatureExtractor for RowExtractor {
        fn extract(&self, image: &GrayImage) -> Vec<Feature> {
            image
                .rows()
                .enumerate()
                .filter(|(_, row)| row.clone().any(|px| px.0[0] > 0))
                .take(self.cap)
                .map(|(y, _)| {
                    Feature::new(
                        Keypoint::new(0.0, y as f32),
                        Descriptor::new([y as u8; DESCRIPTOR_BYTES]),
                    )
                })
                .collect()
        }
    }

    /// Describes only points, giving polygons nothing.
    struct PointsOnly;

    impl Appearance for PointsOnly {
        fn describe(&self, geometry: &Geometry) -> Vec<Descriptor> {
            match geometry {
                Geometry::Point(_) => vec![Descriptor::zeros()],
                Geometry::Polygon(_) => Vec::new(),
            }
        }
    }

    struct FailingProvider;

    impl GeometryProvider for FailingProvider {
        fn fetch_landmarks(
            &self,
            _bounds: &GeoBounds,
            _tags: &[String],
        ) -> Result<Vec<Geometry>, FetchError> {
            Err(FetchError::NotAFeatureCollection("Feature".into()))
        }
    }

    fn geometries() -> Vec<Geometry> {
        vec![
            Geometry::Point(GeoPoint::from_degrees(47.30, 8.50)),
            Geometry::Polygon(vec![
                GeoPoint::from_degrees(47.31, 8.51),
                GeoPoint::from_degrees(47.31, 8.53),
                GeoPoint::from_degrees(47.33, 8.53),
                GeoPoint::from_degrees(47.33, 8.51),
            ]),
            Geometry::Point(GeoPoint::from_degrees(47.34, 8.56)),
        ]
    }

    #[test]
    fn empty_geometry_builds_empty_index() {
        let index = LandmarkIndex::build(&[], RasterExtent::new(64, 64), &RowExtractor { cap: 4 });
        assert!(index.is_empty());
        assert!(index.pool().is_empty());
        assert_eq!(index.owner(0), None);
    }

    #[test]
    fn pool_partitions_landmark_descriptors() {
        let index =
            LandmarkIndex::build(&geometries(), RasterExtent::new(100, 100), &RowExtractor { cap: 3 });

        assert_eq!(index.len(), 3);
        let total: usize = index.landmarks().iter().map(|l| l.descriptors().len()).sum();
        assert_eq!(total, index.pool().len());

        let mut pool_index = 0;
        for landmark in index.landmarks() {
            for descriptor in landmark.descriptors() {
                assert_eq!(index.owner(pool_index), Some(landmark));
                assert_eq!(&index.pool()[pool_index], descriptor);
                pool_index += 1;
            }
        }
        assert_eq!(index.owner(pool_index), None);
    }

    #[test]
    fn polygons_are_indexed_at_their_centroid() {
        let index =
            LandmarkIndex::build(&geometries(), RasterExtent::new(100, 100), &RowExtractor { cap: 1 });
        let centroid = index.landmarks()[1].position();
        assert!((centroid.latitude_deg() - 47.32).abs() < 1e-9);
        assert!((centroid.longitude_deg() - 8.52).abs() < 1e-9);
    }

    #[test]
    fn geometry_without_descriptors_is_dropped() {
        let index = LandmarkIndex::from_appearance(&geometries(), &PointsOnly);
        assert_eq!(index.len(), 2);
        assert_eq!(index.pool().len(), 2);
        assert!(index.landmarks().iter().all(|l| !l.descriptors().is_empty()));
    }

    #[test]
    fn landmark_requires_descriptors() {
        assert_eq!(Landmark::new(GeoPoint::from_degrees(0.0, 0.0), vec![]), None);
    }

    #[test]
    fn failing_provider_builds_empty_index() {
        let area = MissionArea::new(
            GeoPoint::from_degrees(47.3769, 8.5417),
            Length::new::<meter>(500.0),
        );
        let index = LandmarkIndex::from_provider(
            &FailingProvider,
            &area,
            &[],
            &IndexParams::new(RasterExtent::new(64, 64)),
            &RowExtractor { cap: 1 },
        );
        assert!(index.is_empty());
    }
}

use super::{Confidence, Estimator, PositionEstimate};
use crate::{geometry::GeoPoint, matcher::Correspondence};
use log::debug;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use uom::{
    ConstZero,
    si::{
        angle::degree,
        f64::{Angle, Length},
        length::meter,
    },
};

/// Default number of consensus iterations.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Default smallest longitude residual under which a point is an inlier, in degrees.
pub const DEFAULT_INLIER_THRESHOLD_DEG: f64 = 1e-3;

/// Altitude reported by robust estimates until an altitude source is integrated.
pub const NOMINAL_ALTITUDE_M: f64 = 100.0;

/// Fewest correspondences for which outliers are rejected.
pub const MIN_FIT_POINTS: usize = 3;

/// Three standard deviations expressed in median absolute deviations of a normal
/// distribution.
const SPREAD_SCALE: f64 = 3.0 * 1.4826;

/// The line `longitude = slope * latitude + intercept` in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineModel {
    slope: f64,
    intercept: f64,
}

impl LineModel {
    /// Returns the least squares line through `a` and `b` as `(latitude, longitude)` pairs in
    /// degrees.
    ///
    /// Points sharing a latitude give the constant line through their mean longitude. Returns
    /// `None` for non-finite input.
    pub fn through(a: (f64, f64), b: (f64, f64)) -> Option<Self> {
        let dlat = b.0 - a.0;
        if !dlat.is_finite() || !(b.1 - a.1).is_finite() {
            return None;
        }

        let slope = match dlat == 0.0 {
            true => 0.0,
            false => (b.1 - a.1) / dlat,
        };
        Some(Self {
            slope,
            intercept: (a.1 + b.1) / 2.0 - slope * (a.0 + b.0) / 2.0,
        })
    }

    pub fn residual(&self, point: (f64, f64)) -> f64 {
        (point.1 - (self.slope * point.0 + self.intercept)).abs()
    }
}

/// How far from a model a point may lie and still support it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InlierThreshold {
    /// A fixed longitude residual.
    Fixed(Angle),

    /// Three standard deviations of the distinct landmark longitudes, estimated from their
    /// median absolute deviation, and never less than `min`.
    ///
    /// Repeated positions do not change the threshold, so more correspondences to the same
    /// landmarks cannot shrink it.
    Adaptive { min: Angle },
}

impl InlierThreshold {
    /// Returns the residual in degrees for `(latitude, longitude)` points.
    pub fn resolve(&self, points: &[(f64, f64)]) -> f64 {
        match self {
            InlierThreshold::Fixed(threshold) => threshold.get::<degree>(),
            InlierThreshold::Adaptive { min } => {
                let mut distinct = points.to_vec();
                distinct.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
                distinct.dedup();

                let longitudes: Vec<f64> = distinct.iter().map(|p| p.1).collect();
                let spread = median(&longitudes)
                    .and_then(|center| {
                        let deviations: Vec<f64> =
                            longitudes.iter().map(|lon| (lon - center).abs()).collect();
                        median(&deviations)
                    })
                    .unwrap_or(0.0);

                (SPREAD_SCALE * spread).max(min.get::<degree>())
            }
        }
    }
}

impl Default for InlierThreshold {
    fn default() -> Self {
        InlierThreshold::Adaptive {
            min: Angle::new::<degree>(DEFAULT_INLIER_THRESHOLD_DEG),
        }
    }
}

/// Estimates position as the centroid of the landmarks agreeing on a consensus line.
///
/// Appearance aliasing produces matches to landmarks far from the true ones. The estimator
/// fits a line relating longitude to latitude with random sample consensus and averages only
/// the landmarks close to the line with the most support.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseEstimator {
    iterations: usize,
    inlier_threshold: InlierThreshold,
    nominal_altitude: Length,
    seed: u64,
}

impl PoseEstimator {
    pub fn new(iterations: usize, inlier_threshold: InlierThreshold, seed: u64) -> Self {
        Self {
            iterations,
            inlier_threshold,
            nominal_altitude: Length::new::<meter>(NOMINAL_ALTITUDE_M),
            seed,
        }
    }

    pub fn with_nominal_altitude(self, nominal_altitude: Length) -> Self {
        Self {
            nominal_altitude,
            ..self
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn inlier_threshold(&self) -> InlierThreshold {
        self.inlier_threshold
    }

    /// Estimates a position drawing consensus samples from `rng`.
    pub fn estimate_with_rng<'a, I, R>(&self, correspondences: I, rng: &mut R) -> PositionEstimate
    where
        I: IntoIterator<Item = Correspondence<'a>>,
        R: Rng + ?Sized,
    {
        let points: Vec<GeoPoint> = correspondences
            .into_iter()
            .map(|c| c.landmark().position())
            .collect();

        if points.is_empty() {
            debug!("no correspondences to estimate from");
            return PositionEstimate::invalid();
        }

        if points.len() < MIN_FIT_POINTS {
            debug!("{} correspondences, reporting their mean", points.len());
            return PositionEstimate::new(mean(&points), Length::ZERO, Confidence::Low);
        }

        let inliers = self.inliers(&points, rng);
        if inliers.is_empty() {
            debug!("no consensus among {} correspondences", points.len());
            return PositionEstimate::invalid();
        }

        debug!("{} of {} correspondences are inliers", inliers.len(), points.len());
        let inlier_points: Vec<GeoPoint> = inliers.iter().map(|&i| points[i]).collect();
        PositionEstimate::new(
            mean(&inlier_points),
            self.nominal_altitude,
            Confidence::Robust {
                inliers: inliers.len(),
            },
        )
    }

    /// Returns the indices of `points` supporting the best line found.
    ///
    /// When there are no more point pairs than iterations every pair is tried once, otherwise
    /// pairs are drawn from `rng`. Among equally supported lines the first one found wins.
    /// Returns an empty `Vec` for fewer than two points or when no pair defines a line.
    pub fn inliers<R>(&self, points: &[GeoPoint], rng: &mut R) -> Vec<usize>
    where
        R: Rng + ?Sized,
    {
        let coords: Vec<(f64, f64)> = points
            .iter()
            .map(|p| (p.latitude_deg(), p.longitude_deg()))
            .collect();
        let threshold = self.inlier_threshold.resolve(&coords);
        let n = coords.len();
        if n < 2 {
            return Vec::new();
        }

        let mut best: Vec<usize> = Vec::new();
        let mut consider = |i: usize, j: usize| {
            let Some(model) = LineModel::through(coords[i], coords[j]) else {
                return;
            };
            let support: Vec<usize> = (0..n)
                .filter(|&k| model.residual(coords[k]) <= threshold)
                .collect();
            if support.len() > best.len() {
                best = support;
            }
        };

        let pairs = n * (n - 1) / 2;
        if pairs <= self.iterations {
            for i in 0..n {
                for j in i + 1..n {
                    consider(i, j);
                }
            }
        } else {
            for _ in 0..self.iterations {
                let i = rng.random_range(0..n);
                let j = rng.random_range(0..n - 1);
                // Skip over `i` so the pair is distinct.
                consider(i, if j >= i { j + 1 } else { j });
            }
        }

        best
    }
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS, InlierThreshold::default(), 0)
    }
}

impl Estimator for PoseEstimator {
    type Output = PositionEstimate;

    fn estimate<'a, I>(&self, correspondences: I) -> Self::Output
    where
        I: IntoIterator<Item = Correspondence<'a>>,
    {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        self.estimate_with_rng(correspondences, &mut rng)
    }
}

fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => None,
        n if n % 2 == 0 => Some((sorted[mid - 1] + sorted[mid]) / 2.0),
        _ => Some(sorted[mid]),
    }
}

fn mean(points: &[GeoPoint]) -> GeoPoint {
    let n = points.len() as f64;
    let (lat, lon) = points.iter().fold((0.0, 0.0), |(lat, lon), p| {
        (lat + p.latitude_deg(), lon + p.longitude_deg())
    });
    GeoPoint::from_degrees(lat / n, lon / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{descriptor::Descriptor, index::Landmark};
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn landmarks(coords: &[(f64, f64)]) -> Vec<Landmark> {
        coords
            .iter()
            .map(|&(lat, lon)| {
                Landmark::new(GeoPoint::from_degrees(lat, lon), vec![Descriptor::zeros()])
                    .expect("landmark has a descriptor")
            })
            .collect()
    }

    fn correspondences(landmarks: &[Landmark]) -> Vec<Correspondence<'_>> {
        landmarks
            .iter()
            .enumerate()
            .map(|(i, landmark)| Correspondence::new(i, landmark, 0))
            .collect()
    }

    fn points(coords: &[(f64, f64)]) -> Vec<GeoPoint> {
        coords
            .iter()
            .map(|&(lat, lon)| GeoPoint::from_degrees(lat, lon))
            .collect()
    }

    fn fixed(threshold_deg: f64) -> InlierThreshold {
        InlierThreshold::Fixed(Angle::new::<degree>(threshold_deg))
    }

    /// Points on the line lon = 0.5 * lat - 15.15 near Zurich.
    fn on_line(count: usize) -> Vec<(f64, f64)> {
        (0..count)
            .map(|i| {
                let lat = 47.30 + 0.001 * i as f64;
                (lat, 0.5 * lat - 15.15)
            })
            .collect()
    }

    /// Points scattered well away from the line and from each other.
    fn outliers(count: usize) -> Vec<(f64, f64)> {
        (0..count)
            .map(|i| (47.30 + 0.0137 * i as f64, 8.60 + 0.0291 * (i * i) as f64))
            .collect()
    }

    #[test]
    fn no_correspondences_are_invalid() {
        let estimate = PoseEstimator::default().estimate(Vec::new());
        assert_eq!(estimate, PositionEstimate::invalid());
    }

    #[test]
    fn two_correspondences_give_low_confidence_mean() {
        let landmarks = landmarks(&[(47.30, 8.50), (47.32, 8.54)]);
        let estimate = PoseEstimator::default().estimate(correspondences(&landmarks));

        assert_eq!(estimate.confidence(), Confidence::Low);
        assert_relative_eq!(estimate.latitude().get::<degree>(), 47.31, epsilon = 1e-9);
        assert_relative_eq!(estimate.longitude().get::<degree>(), 8.52, epsilon = 1e-9);
        assert_eq!(estimate.altitude(), Length::ZERO);
    }

    #[test]
    fn one_correspondence_is_its_landmark() {
        let landmarks = landmarks(&[(47.30, 8.50)]);
        let estimate = PoseEstimator::default().estimate(correspondences(&landmarks));
        assert_eq!(estimate.confidence(), Confidence::Low);
        assert_relative_eq!(estimate.latitude().get::<degree>(), 47.30, epsilon = 1e-9);
    }

    #[test]
    fn correspondences_to_one_landmark_locate_it() {
        let landmark = Landmark::new(
            GeoPoint::from_degrees(47.3769, 8.5417),
            vec![Descriptor::zeros(), Descriptor::new([0xFF; 32])],
        )
        .expect("landmark has descriptors");
        let correspondences: Vec<Correspondence<'_>> = (0..3)
            .map(|query| Correspondence::new(query, &landmark, 0))
            .collect();

        let estimate = PoseEstimator::default().estimate(correspondences);

        assert_eq!(estimate.confidence(), Confidence::Robust { inliers: 3 });
        assert_relative_eq!(estimate.latitude().get::<degree>(), 47.3769, epsilon = 1e-9);
        assert_relative_eq!(estimate.longitude().get::<degree>(), 8.5417, epsilon = 1e-9);
        assert_relative_eq!(estimate.altitude().get::<meter>(), NOMINAL_ALTITUDE_M);
    }

    #[test]
    fn shared_latitude_fits_constant_line() {
        let landmarks = landmarks(&[(47.30, 8.50), (47.30, 8.52), (47.30, 8.54)]);
        let estimate = PoseEstimator::default().estimate(correspondences(&landmarks));

        assert_eq!(estimate.confidence(), Confidence::Robust { inliers: 3 });
        assert_relative_eq!(estimate.latitude().get::<degree>(), 47.30, epsilon = 1e-9);
        assert_relative_eq!(estimate.longitude().get::<degree>(), 8.52, epsilon = 1e-9);
    }

    #[test]
    fn nearby_landmarks_in_general_position_all_agree() {
        let coords = [(47.375, 8.539), (47.378, 8.544), (47.374, 8.546)];
        let landmarks = landmarks(&coords);
        let estimate = PoseEstimator::default().estimate(correspondences(&landmarks));

        assert_eq!(estimate.confidence(), Confidence::Robust { inliers: 3 });
        assert_relative_eq!(
            estimate.latitude().get::<degree>(),
            (47.375 + 47.378 + 47.374) / 3.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            estimate.longitude().get::<degree>(),
            (8.539 + 8.544 + 8.546) / 3.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn outliers_are_rejected() {
        let line = on_line(6);
        let mut coords = line.clone();
        coords.extend(outliers(3));
        let landmarks = landmarks(&coords);

        let estimate = PoseEstimator::default().estimate(correspondences(&landmarks));

        let n = line.len() as f64;
        assert_eq!(estimate.confidence(), Confidence::Robust { inliers: 6 });
        assert_relative_eq!(
            estimate.latitude().get::<degree>(),
            line.iter().map(|p| p.0).sum::<f64>() / n,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            estimate.longitude().get::<degree>(),
            line.iter().map(|p| p.1).sum::<f64>() / n,
            epsilon = 1e-9
        );
        assert_relative_eq!(estimate.altitude().get::<meter>(), NOMINAL_ALTITUDE_M);
    }

    #[test]
    fn sampled_consensus_finds_line() {
        // 60 points give more pairs than iterations, forcing random sampling.
        let mut coords = on_line(40);
        coords.extend(outliers(20));
        let estimator = PoseEstimator::new(200, fixed(1e-6), 7);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(estimator.seed());

        let inliers = estimator.inliers(&points(&coords), &mut rng);
        assert_eq!(inliers, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn estimate_is_repeatable() {
        let mut coords = on_line(40);
        coords.extend(outliers(20));
        let landmarks = landmarks(&coords);
        let estimator = PoseEstimator::new(100, fixed(1e-6), 42);

        assert_eq!(
            estimator.estimate(correspondences(&landmarks)),
            estimator.estimate(correspondences(&landmarks))
        );
    }

    #[rstest]
    #[case(fixed(1e-6))]
    #[case(InlierThreshold::default())]
    fn inliers_grow_with_correct_duplicates(#[case] threshold: InlierThreshold) {
        let line = on_line(4);
        let mut coords = line.clone();
        coords.extend(outliers(6));
        let estimator = PoseEstimator::new(DEFAULT_ITERATIONS, threshold, 0);

        let mut previous = 0;
        for duplicates in 0..20 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(estimator.seed());
            let count = estimator.inliers(&points(&coords), &mut rng).len();
            assert!(
                count >= previous,
                "{duplicates} duplicates: {count} inliers after {previous}"
            );
            previous = count;
            coords.push(line[duplicates % line.len()]);
        }
    }

    #[test]
    fn adaptive_threshold_ignores_repeated_positions() {
        let threshold = InlierThreshold::default();
        let coords = [(47.375, 8.539), (47.378, 8.544), (47.374, 8.546)];
        let mut repeated = coords.to_vec();
        repeated.extend([coords[1]; 10]);

        // Median absolute deviation of the longitudes is 0.002.
        assert_relative_eq!(threshold.resolve(&coords), SPREAD_SCALE * 0.002, epsilon = 1e-12);
        assert_eq!(threshold.resolve(&coords), threshold.resolve(&repeated));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[(47.3769, 8.5417)])]
    #[case(&[(47.3769, 8.5417), (47.3769, 8.5417)])]
    fn adaptive_threshold_has_a_floor(#[case] coords: &[(f64, f64)]) {
        assert_relative_eq!(
            InlierThreshold::default().resolve(coords),
            DEFAULT_INLIER_THRESHOLD_DEG
        );
    }

    #[rstest]
    #[case((0.0, 0.0), (1.0, 2.0), (0.5, 1.0), 0.0)]
    #[case((0.0, 0.0), (1.0, 2.0), (0.5, 2.0), 1.0)]
    #[case((1.0, 1.0), (3.0, 1.0), (2.0, 0.0), 1.0)]
    #[case((1.0, 0.0), (1.0, 5.0), (3.0, 2.5), 0.0)]
    #[case((1.0, 0.0), (1.0, 5.0), (1.0, 0.0), 2.5)]
    fn line_residual(
        #[case] a: (f64, f64),
        #[case] b: (f64, f64),
        #[case] point: (f64, f64),
        #[case] residual: f64,
    ) {
        let model = LineModel::through(a, b).expect("coordinates are finite");
        assert_relative_eq!(model.residual(point), residual, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_points_have_no_model() {
        assert_eq!(LineModel::through((f64::NAN, 0.0), (1.0, 5.0)), None);
        assert_eq!(LineModel::through((1.0, 0.0), (2.0, f64::INFINITY)), None);
    }
}

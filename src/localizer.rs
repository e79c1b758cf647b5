use crate::{
    config::Config,
    estimator::{Estimator, PoseEstimator, PositionEstimate},
    extract::{Brief, FeatureExtractor, QueryFeatureSet},
    index::LandmarkIndex,
    matcher::{Correspondence, FeatureMatcher},
    provider::GeometryProvider,
};
use image::GrayImage;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// The result of localizing one camera frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Localization<'a> {
    pub estimate: PositionEstimate,
    pub correspondences: Vec<Correspondence<'a>>,

    /// Number of features extracted from the frame.
    pub query_features: usize,
}

/// Matches camera frames against a fixed [`LandmarkIndex`].
pub struct Localizer<E> {
    index: LandmarkIndex,
    extractor: E,
    matcher: FeatureMatcher,
    estimator: PoseEstimator,
    latency_limit: Option<Duration>,
}

impl<E: FeatureExtractor> Localizer<E> {
    pub fn new(
        index: LandmarkIndex,
        extractor: E,
        matcher: FeatureMatcher,
        estimator: PoseEstimator,
    ) -> Self {
        Self {
            index,
            extractor,
            matcher,
            estimator,
            latency_limit: None,
        }
    }

    /// Warns whenever localizing a frame takes longer than `limit`.
    pub fn with_latency_limit(self, limit: Option<Duration>) -> Self {
        Self {
            latency_limit: limit,
            ..self
        }
    }

    pub fn index(&self) -> &LandmarkIndex {
        &self.index
    }

    pub fn matcher(&self) -> &FeatureMatcher {
        &self.matcher
    }

    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    /// Estimates where `image` was taken.
    ///
    /// Every frame is handled independently, nothing is carried over between calls.
    pub fn localize(&self, image: &GrayImage) -> Localization<'_> {
        let start = Instant::now();

        let query = QueryFeatureSet::from_image(image, &self.extractor);
        let correspondences = self.matcher.matches(&query, &self.index);
        let estimate = self.estimator.estimate(correspondences.iter().copied());

        let elapsed = start.elapsed();
        debug!(
            "{} features, {} correspondences in {:?}",
            query.len(),
            correspondences.len(),
            elapsed
        );
        if let Some(limit) = self.latency_limit.filter(|limit| elapsed > *limit) {
            warn!("localization took {elapsed:?}, over the {limit:?} limit");
        }

        Localization {
            estimate,
            correspondences,
            query_features: query.len(),
        }
    }
}

impl Localizer<Brief> {
    /// Builds the index for the configured mission area and every component from `config`.
    pub fn from_config<P>(config: &Config, provider: &P) -> Self
    where
        P: GeometryProvider + ?Sized,
    {
        let extractor = config.feature_extraction.extractor();
        let index = LandmarkIndex::from_provider(
            provider,
            &config.mission.area(),
            &config.mission.landmark_tags,
            &config.index.params(),
            &extractor,
        );
        info!(
            "localizer ready with {} landmarks, memory hint {} GB",
            index.len(),
            config.runtime.memory_limit_gb
        );

        Self::new(
            index,
            extractor,
            config.matching.matcher(),
            config.localization.estimator(),
        )
        .with_latency_limit(config.runtime.latency_limit())
    }
}

//! Runtime configuration, stored as JSON.

use crate::{
    error::Error,
    estimator::{
        DEFAULT_INLIER_THRESHOLD_DEG, DEFAULT_ITERATIONS, InlierThreshold, NOMINAL_ALTITUDE_M,
        PoseEstimator,
    },
    extract::{Brief, BriefParams},
    geometry::GeoPoint,
    index::{DEFAULT_POINT_RADIUS, IndexParams},
    matcher::{DEFAULT_MAX_DISTANCE, DEFAULT_MAX_RESULTS, FeatureMatcher},
    provider::MissionArea,
    raster::RasterExtent,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
    time::Duration,
};
use uom::si::{
    angle::degree,
    f64::{Angle, Length},
    length::meter,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feature_extraction: FeatureExtractionConfig,
    pub mission: MissionConfig,
    pub index: IndexConfig,
    pub matching: MatchingConfig,
    pub localization: LocalizationConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// Sections or fields missing from the file take their default values.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration at `path`, writing the defaults there first if it does not
    /// exist.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_path(path);
        }

        info!("no configuration at {}, writing defaults", path.display());
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Writes the configuration as pretty printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Rejects values no component can work with.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: &str| Err(Error::InvalidInput(msg.into()));

        if self.feature_extraction.levels == 0 {
            return invalid("feature_extraction.levels must be at least 1");
        }
        if !(self.feature_extraction.scale_factor > 1.0) {
            return invalid("feature_extraction.scale_factor must be greater than 1");
        }
        if self.index.raster_width == 0 || self.index.raster_height == 0 {
            return invalid("index raster must have a non-zero size");
        }
        if !(self.mission.radius_m > 0.0) {
            return invalid("mission.radius_m must be positive");
        }
        if !(self.mission.center_latitude_deg.abs() <= 90.0) {
            return invalid("mission.center_latitude_deg must be within [-90, 90]");
        }
        if !(self.localization.inlier_threshold_deg >= 0.0) {
            return invalid("localization.inlier_threshold_deg must not be negative");
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Brief,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureExtractionConfig {
    pub algorithm: Algorithm,
    pub max_features: usize,
    pub scale_factor: f32,
    pub levels: usize,
    pub patch_radius: u32,
    pub fast_threshold: u8,
}

impl FeatureExtractionConfig {
    pub fn brief_params(&self) -> BriefParams {
        BriefParams {
            max_features: self.max_features,
            scale_factor: self.scale_factor,
            levels: self.levels,
            patch_radius: self.patch_radius,
            fast_threshold: self.fast_threshold,
        }
    }

    pub fn extractor(&self) -> Brief {
        match self.algorithm {
            Algorithm::Brief => Brief::new(self.brief_params()),
        }
    }
}

impl Default for FeatureExtractionConfig {
    fn default() -> Self {
        let params = BriefParams::default();
        Self {
            algorithm: Algorithm::Brief,
            max_features: params.max_features,
            scale_factor: params.scale_factor,
            levels: params.levels,
            patch_radius: params.patch_radius,
            fast_threshold: params.fast_threshold,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub center_latitude_deg: f64,
    pub center_longitude_deg: f64,
    pub radius_m: f64,

    /// Landmarks carrying any of these tags are indexed.
    pub landmark_tags: Vec<String>,
}

impl MissionConfig {
    pub fn area(&self) -> MissionArea {
        MissionArea::new(
            GeoPoint::from_degrees(self.center_latitude_deg, self.center_longitude_deg),
            Length::new::<meter>(self.radius_m),
        )
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        // Zurich.
        Self {
            center_latitude_deg: 47.3769,
            center_longitude_deg: 8.5417,
            radius_m: 500.0,
            landmark_tags: vec!["building".into(), "road".into(), "waterway".into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub raster_width: u32,
    pub raster_height: u32,
    pub point_radius_px: u32,
}

impl IndexConfig {
    pub fn params(&self) -> IndexParams {
        IndexParams {
            extent: RasterExtent::new(self.raster_width, self.raster_height),
            point_radius: self.point_radius_px,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            raster_width: 800,
            raster_height: 800,
            point_radius_px: DEFAULT_POINT_RADIUS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub max_results: usize,

    /// Largest accepted Hamming distance, `null` accepts any.
    pub max_distance: Option<u32>,
}

impl MatchingConfig {
    pub fn matcher(&self) -> FeatureMatcher {
        FeatureMatcher::new(self.max_results).with_max_distance(self.max_distance)
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            max_distance: Some(DEFAULT_MAX_DISTANCE),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    pub ransac_iterations: usize,

    /// Inlier residual, or its lower bound when `adaptive_threshold` is set.
    pub inlier_threshold_deg: f64,

    /// Scales the inlier residual with the spread of the matched landmarks.
    pub adaptive_threshold: bool,

    /// Seed of the consensus sampler, drawn from the OS when `null`.
    pub seed: Option<u64>,
    pub nominal_altitude_m: f64,
}

impl LocalizationConfig {
    pub fn inlier_threshold(&self) -> InlierThreshold {
        let threshold = Angle::new::<degree>(self.inlier_threshold_deg);
        match self.adaptive_threshold {
            true => InlierThreshold::Adaptive { min: threshold },
            false => InlierThreshold::Fixed(threshold),
        }
    }

    pub fn estimator(&self) -> PoseEstimator {
        PoseEstimator::new(
            self.ransac_iterations,
            self.inlier_threshold(),
            self.seed.unwrap_or_else(rand::random),
        )
        .with_nominal_altitude(Length::new::<meter>(self.nominal_altitude_m))
    }
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            ransac_iterations: DEFAULT_ITERATIONS,
            inlier_threshold_deg: DEFAULT_INLIER_THRESHOLD_DEG,
            adaptive_threshold: true,
            seed: None,
            nominal_altitude_m: NOMINAL_ALTITUDE_M,
        }
    }
}

/// Resource budgets of the host. These are hints, only exceeded latency is reported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub memory_limit_gb: f64,
    pub latency_limit_sec: f64,
}

impl RuntimeConfig {
    pub fn latency_limit(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.latency_limit_sec).ok()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_limit_gb: 1.5,
            latency_limit_sec: 2.0,
        }
    }
}

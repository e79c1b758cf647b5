// #![warn(missing_docs)]

//! Landmark Based Localization Utilities
//!
//! Estimates where a camera frame was taken by matching its binary features against
//! descriptors of rendered map landmarks, then fitting a consensus over the matched
//! landmark positions.

#[allow(missing_docs)]
pub mod error;

pub mod config;
pub mod descriptor;
pub mod estimator;
pub mod extract;
pub mod geometry;
pub mod index;
pub mod iter;
pub mod localizer;
pub mod matcher;
pub mod provider;
pub mod raster;

pub mod prelude {
    pub use crate::{
        config::Config,
        descriptor::Descriptor,
        error::Error,
        estimator::{Confidence, Estimator, PoseEstimator, PositionEstimate},
        extract::{Brief, BriefParams, Feature, FeatureExtractor, Keypoint, QueryFeatureSet},
        geometry::{GeoBounds, GeoPoint, Geometry},
        index::{Landmark, LandmarkIndex},
        iter::CorrespondenceIterator,
        localizer::{Localization, Localizer},
        matcher::{Correspondence, FeatureMatcher},
        provider::{GeoJsonProvider, GeometryProvider, MissionArea},
        raster::RasterExtent,
    };
}

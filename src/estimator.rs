mod ransac;

use crate::{geometry::GeoPoint, matcher::Correspondence};
pub use ransac::{
    DEFAULT_INLIER_THRESHOLD_DEG, DEFAULT_ITERATIONS, InlierThreshold, LineModel, MIN_FIT_POINTS,
    NOMINAL_ALTITUDE_M, PoseEstimator,
};
use sguaba::systems::Wgs84;
use std::fmt;
use uom::{
    ConstZero,
    si::{
        angle::degree,
        f64::{Angle, Length},
        length::meter,
    },
};

/// Turns correspondences into an estimate.
pub trait Estimator {
    type Output;

    fn estimate<'a, I>(&self, correspondences: I) -> Self::Output
    where
        I: IntoIterator<Item = Correspondence<'a>>;
}

/// How much a [`PositionEstimate`] can be trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    /// No usable correspondence, the coordinates are zero and carry no information.
    Invalid,

    /// Too few correspondences to reject outliers, the coordinates are their plain mean.
    Low,

    /// The coordinates are the mean of the inliers of a consensus fit.
    Robust { inliers: usize },
}

/// The terminal output of one localization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionEstimate {
    latitude: Angle,
    longitude: Angle,
    altitude: Length,
    confidence: Confidence,
}

impl PositionEstimate {
    pub fn new(position: GeoPoint, altitude: Length, confidence: Confidence) -> Self {
        Self {
            latitude: position.latitude(),
            longitude: position.longitude(),
            altitude,
            confidence,
        }
    }

    /// The "no information" sentinel, zero everywhere.
    pub fn invalid() -> Self {
        Self {
            latitude: Angle::ZERO,
            longitude: Angle::ZERO,
            altitude: Length::ZERO,
            confidence: Confidence::Invalid,
        }
    }

    pub fn latitude(&self) -> Angle {
        self.latitude
    }

    pub fn longitude(&self) -> Angle {
        self.longitude
    }

    pub fn altitude(&self) -> Length {
        self.altitude
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_valid(&self) -> bool {
        self.confidence != Confidence::Invalid
    }

    /// Converts the estimate into a [`Wgs84`] position.
    ///
    /// Returns `None` for an invalid estimate.
    pub fn to_wgs84(&self) -> Option<Wgs84> {
        if !self.is_valid() {
            return None;
        }

        Some(
            Wgs84::builder()
                .latitude(self.latitude)?
                .longitude(self.longitude)
                .altitude(self.altitude)
                .build(),
        )
    }
}

impl fmt::Display for PositionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "no position (invalid)");
        }

        write!(
            f,
            "lat={:.6} lon={:.6} alt={:.1}m",
            self.latitude.get::<degree>(),
            self.longitude.get::<degree>(),
            self.altitude.get::<meter>(),
        )?;

        match self.confidence {
            Confidence::Low => write!(f, " (low confidence)"),
            Confidence::Robust { inliers } => write!(f, " ({inliers} inliers)"),
            Confidence::Invalid => Ok(()),
        }
    }
}

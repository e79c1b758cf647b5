//! Keypoint and descriptor extraction from grayscale rasters.

mod brief;

use crate::descriptor::Descriptor;
pub use brief::{Brief, BriefParams};
use image::GrayImage;

/// A location in image space, in pixels from the top left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A keypoint together with the descriptor of the patch around it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: Descriptor,
}

impl Feature {
    pub fn new(keypoint: Keypoint, descriptor: Descriptor) -> Self {
        Self {
            keypoint,
            descriptor,
        }
    }
}

/// Produces features from an image.
///
/// Implementations return an empty `Vec` when the image has no features.
pub trait FeatureExtractor {
    fn extract(&self, image: &GrayImage) -> Vec<Feature>;
}

impl<E: FeatureExtractor + ?Sized> FeatureExtractor for &E {
    fn extract(&self, image: &GrayImage) -> Vec<Feature> {
        (**self).extract(image)
    }
}

impl<E: FeatureExtractor + ?Sized> FeatureExtractor for Box<E> {
    fn extract(&self, image: &GrayImage) -> Vec<Feature> {
        (**self).extract(image)
    }
}

/// The ordered features extracted from one live image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryFeatureSet {
    features: Vec<Feature>,
}

impl QueryFeatureSet {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Extracts the query features of `image` with `extractor`.
    pub fn from_image(image: &GrayImage, extractor: &impl FeatureExtractor) -> Self {
        Self::new(extractor.extract(image))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> + Clone {
        self.features.iter().map(|feature| &feature.descriptor)
    }
}

impl FromIterator<Feature> for QueryFeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

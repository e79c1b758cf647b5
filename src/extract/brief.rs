use super::{Feature, FeatureExtractor, Keypoint};
use crate::descriptor::{DESCRIPTOR_BITS, Descriptor};
use image::{
    GrayImage,
    imageops::{FilterType, resize},
};
use imageproc::{corners::corners_fast9, filter::gaussian_blur_f32};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Seed of the sampling pattern shared by every `Brief` instance.
///
/// Descriptors are only comparable when produced with the same pattern.
const PATTERN_SEED: u64 = 0x0b1e_f5ee_d000_0001;

/// Smoothing applied before intensity comparisons.
const SMOOTHING_SIGMA: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BriefParams {
    /// Upper bound on the number of features returned per image.
    pub max_features: usize,

    /// Downscaling ratio between consecutive pyramid levels.
    pub scale_factor: f32,

    /// Number of pyramid levels including the full resolution image.
    pub levels: usize,

    /// Half the side length of the square patch a descriptor summarizes.
    pub patch_radius: u32,

    /// Intensity difference used by the FAST corner test.
    pub fast_threshold: u8,
}

impl Default for BriefParams {
    fn default() -> Self {
        Self {
            max_features: 1000,
            scale_factor: 1.2,
            levels: 8,
            patch_radius: 15,
            fast_threshold: 20,
        }
    }
}

/// FAST corners described by binary intensity comparisons over an image pyramid.
///
/// Each descriptor bit compares the smoothed intensity at two offsets from the keypoint.
/// The offsets are drawn once from a fixed seed so every instance with the same patch radius
/// produces comparable descriptors.
#[derive(Clone, Debug, PartialEq)]
pub struct Brief {
    params: BriefParams,
    pattern: Vec<[(i32, i32); 2]>,
}

impl Brief {
    pub fn new(params: BriefParams) -> Self {
        Self {
            pattern: sampling_pattern(params.patch_radius),
            params,
        }
    }

    pub fn params(&self) -> &BriefParams {
        &self.params
    }

    fn level_features(&self, level: &GrayImage, smoothed: &GrayImage, scale: f32) -> Vec<Scored> {
        let r = self.params.patch_radius;
        let (width, height) = level.dimensions();

        corners_fast9(level, self.params.fast_threshold)
            .into_iter()
            // Every sampling offset must land inside the image.
            .filter(|c| c.x >= r && c.y >= r && c.x + r < width && c.y + r < height)
            .map(|c| Scored {
                score: c.score,
                feature: Feature::new(
                    Keypoint::new(c.x as f32 * scale, c.y as f32 * scale),
                    self.describe(smoothed, c.x as i32, c.y as i32),
                ),
            })
            .collect()
    }

    fn describe(&self, smoothed: &GrayImage, x: i32, y: i32) -> Descriptor {
        let intensity = |(dx, dy): (i32, i32)| smoothed.get_pixel((x + dx) as u32, (y + dy) as u32).0[0];

        let mut descriptor = Descriptor::zeros();
        for (bit, [a, b]) in self.pattern.iter().enumerate() {
            if intensity(*a) < intensity(*b) {
                descriptor.set_bit(bit);
            }
        }

        descriptor
    }
}

impl Default for Brief {
    fn default() -> Self {
        Self::new(BriefParams::default())
    }
}

impl FeatureExtractor for Brief {
    fn extract(&self, image: &GrayImage) -> Vec<Feature> {
        let side = 2 * self.params.patch_radius + 1;
        let mut scored: Vec<Scored> = Vec::new();

        let mut scale = 1.0f32;
        for level in 0..self.params.levels {
            let (width, height) = (
                (image.width() as f32 / scale).round() as u32,
                (image.height() as f32 / scale).round() as u32,
            );
            if width < side || height < side {
                break;
            }

            let level_image = match level {
                0 => image.clone(),
                _ => resize(image, width, height, FilterType::Triangle),
            };
            let smoothed = gaussian_blur_f32(&level_image, SMOOTHING_SIGMA);
            scored.extend(self.level_features(&level_image, &smoothed, scale));

            if self.params.scale_factor <= 1.0 {
                break;
            }
            scale *= self.params.scale_factor;
        }

        // Stable, so equal scores keep pyramid and raster order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.params.max_features);
        scored.into_iter().map(|s| s.feature).collect()
    }
}

struct Scored {
    score: f32,
    feature: Feature,
}

fn sampling_pattern(radius: u32) -> Vec<[(i32, i32); 2]> {
    let r = radius as i32;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(PATTERN_SEED);
    let mut offset = move || (rng.random_range(-r..=r), rng.random_range(-r..=r));

    (0..DESCRIPTOR_BITS).map(|_| [offset(), offset()]).collect()
}

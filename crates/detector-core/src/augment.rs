//! Training-time data augmentation.
//!
//! Applies a random affine transform (rotation, shift, horizontal flip,
//! zoom, shear) to each training image, sampled fresh on every pass so a
//! given image yields a different variant each epoch. Validation and test
//! images are never augmented.
//!
//! The transforms compose into a single 2×2 matrix plus a translation;
//! output pixels are inverse-mapped into the source and bilinearly sampled,
//! with out-of-bounds reads clamped to the nearest edge pixel.

use image::{Rgb, RgbImage};
use rand::Rng;

const MAX_ROTATION_DEG: f32 = 20.0;
const MAX_SHIFT_FRAC: f32 = 0.2;
const MAX_SHEAR: f32 = 0.2;
const MAX_ZOOM_DELTA: f32 = 0.2;

/// One sampled set of augmentation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentParams {
    /// Rotation about the image center, degrees.
    pub rotation_deg: f32,
    /// Horizontal translation as a fraction of the width.
    pub shift_x: f32,
    /// Vertical translation as a fraction of the height.
    pub shift_y: f32,
    /// Scale factor; 1.0 is identity.
    pub zoom: f32,
    /// Horizontal shear coefficient.
    pub shear: f32,
    pub flip_horizontal: bool,
}

impl AugmentParams {
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        Self {
            rotation_deg: rng.gen_range(-MAX_ROTATION_DEG..=MAX_ROTATION_DEG),
            shift_x: rng.gen_range(-MAX_SHIFT_FRAC..=MAX_SHIFT_FRAC),
            shift_y: rng.gen_range(-MAX_SHIFT_FRAC..=MAX_SHIFT_FRAC),
            zoom: rng.gen_range(1.0 - MAX_ZOOM_DELTA..=1.0 + MAX_ZOOM_DELTA),
            shear: rng.gen_range(-MAX_SHEAR..=MAX_SHEAR),
            flip_horizontal: rng.gen_bool(0.5),
        }
    }

    pub fn identity() -> Self {
        Self {
            rotation_deg: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
            zoom: 1.0,
            shear: 0.0,
            flip_horizontal: false,
        }
    }
}

/// Apply a freshly sampled random transform.
pub fn random_transform<R: Rng>(img: &RgbImage, rng: &mut R) -> RgbImage {
    apply(img, &AugmentParams::sample(rng))
}

/// Warp an image with the given parameters. Output dimensions equal input
/// dimensions.
pub fn apply(img: &RgbImage, params: &AugmentParams) -> RgbImage {
    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let tx = params.shift_x * width as f32;
    let ty = params.shift_y * height as f32;

    // Forward matrix M = zoom * rotation * shear; invert analytically.
    let theta = params.rotation_deg.to_radians();
    let (sin, cos) = theta.sin_cos();
    let m00 = params.zoom * cos;
    let m01 = params.zoom * (cos * params.shear - sin);
    let m10 = params.zoom * sin;
    let m11 = params.zoom * (sin * params.shear + cos);
    let det = m00 * m11 - m01 * m10;

    RgbImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx - tx;
        let dy = y as f32 - cy - ty;
        let mut src_x = (m11 * dx - m01 * dy) / det + cx;
        let src_y = (-m10 * dx + m00 * dy) / det + cy;
        if params.flip_horizontal {
            src_x = width as f32 - 1.0 - src_x;
        }
        sample_bilinear(img, src_x, src_y)
    })
}

/// Bilinear sample with edge-clamp fill for out-of-bounds coordinates.
fn sample_bilinear(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let x = x.clamp(0.0, width as f32 - 1.0);
    let y = y.clamp(0.0, height as f32 - 1.0);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00.0[c] as f32 * (1.0 - fx) + p10.0[c] as f32 * fx;
        let bottom = p01.0[c] as f32 * (1.0 - fx) + p11.0[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    Rgb(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        })
    }

    #[test]
    fn identity_transform_preserves_pixels() {
        let img = gradient_image(8, 8);
        let out = apply(&img, &AugmentParams::identity());
        assert_eq!(img, out);
    }

    #[test]
    fn flip_mirrors_horizontally() {
        let img = gradient_image(8, 8);
        let params = AugmentParams {
            flip_horizontal: true,
            ..AugmentParams::identity()
        };

        let out = apply(&img, &params);

        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(out.get_pixel(x, y), img.get_pixel(7 - x, y));
            }
        }
    }

    #[test]
    fn random_transform_preserves_dimensions() {
        let img = gradient_image(12, 12);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..10 {
            let out = random_transform(&img, &mut rng);
            assert_eq!(out.dimensions(), (12, 12));
        }
    }

    #[test]
    fn sampled_parameters_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..100 {
            let p = AugmentParams::sample(&mut rng);
            assert!(p.rotation_deg.abs() <= MAX_ROTATION_DEG);
            assert!(p.shift_x.abs() <= MAX_SHIFT_FRAC);
            assert!(p.shift_y.abs() <= MAX_SHIFT_FRAC);
            assert!((0.8..=1.2).contains(&p.zoom));
            assert!(p.shear.abs() <= MAX_SHEAR);
        }
    }

    #[test]
    fn out_of_bounds_reads_clamp_to_edges() {
        // A large shift drags most of the frame out of bounds; the result
        // must still be composed of colors present in the source.
        let img = RgbImage::from_pixel(6, 6, Rgb([200, 100, 50]));
        let params = AugmentParams {
            shift_x: 0.2,
            shift_y: 0.2,
            ..AugmentParams::identity()
        };

        let out = apply(&img, &params);

        for pixel in out.pixels() {
            assert_eq!(pixel, &Rgb([200, 100, 50]));
        }
    }
}

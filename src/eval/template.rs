//! Template matching over region crops.
//!
//! The score is zero-mean normalized cross-correlation in approximately
//! `[-1, 1]`. Template statistics (zero-mean buffer, variance) are
//! precomputed once per reference image and cached by path.

use crate::image::{io::load_gray_image, ImageView};
use crate::util::{RegionMatchError, RegionMatchResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Windows with variance at or below this are skipped as flat.
const MIN_WINDOW_VARIANCE: f32 = 1e-6;

/// Precomputed zero-mean buffer and statistics for one reference image.
#[derive(Debug)]
pub struct TemplatePlan {
    width: usize,
    height: usize,
    var_t: f32,
    zero_mean: Vec<f32>,
}

impl TemplatePlan {
    /// Builds a plan from a grayscale template view.
    pub fn from_view(tpl: ImageView<'_, u8>) -> RegionMatchResult<Self> {
        let width = tpl.width();
        let height = tpl.height();
        let count = (width * height) as f64;

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for y in 0..height {
            for &value in tpl.row(y).unwrap_or(&[]) {
                let v = value as f64;
                sum += v;
                sum_sq += v * v;
            }
        }
        let mean = sum / count;
        let variance = sum_sq - sum * sum / count;
        if variance <= MIN_WINDOW_VARIANCE as f64 {
            return Err(RegionMatchError::DegenerateTemplate {
                reason: "zero variance",
            });
        }

        let mut zero_mean = Vec::with_capacity(width * height);
        for y in 0..height {
            for &value in tpl.row(y).unwrap_or(&[]) {
                zero_mean.push((value as f64 - mean) as f32);
            }
        }

        Ok(Self {
            width,
            height,
            var_t: variance as f32,
            zero_mean,
        })
    }

    /// Returns the template width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the template height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }
}

/// Best placement of a template within a crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    /// X offset of the placement within the crop.
    pub x: usize,
    /// Y offset of the placement within the crop.
    pub y: usize,
    /// ZNCC score at the placement, in approximately `[-1, 1]`.
    pub score: f32,
}

/// Scans every placement of the template inside the crop and returns the
/// best-scoring one.
///
/// Returns `None` when the crop is smaller than the template in either
/// dimension (a legitimate non-match, not an error) or when every window
/// is flat. Ties keep the smallest `y`, then smallest `x`.
pub fn best_match(crop: ImageView<'_, u8>, plan: &TemplatePlan) -> Option<BestMatch> {
    let crop_w = crop.width();
    let crop_h = crop.height();
    let tpl_w = plan.width;
    let tpl_h = plan.height;
    if crop_w < tpl_w || crop_h < tpl_h {
        return None;
    }

    let sum_w = (tpl_w * tpl_h) as f32;
    let mut best: Option<BestMatch> = None;
    for y in 0..=(crop_h - tpl_h) {
        for x in 0..=(crop_w - tpl_w) {
            let mut dot = 0.0f32;
            let mut sum_i = 0.0f32;
            let mut sum_i2 = 0.0f32;

            for ty in 0..tpl_h {
                let row = match crop.row(y + ty) {
                    Some(row) => &row[x..x + tpl_w],
                    None => return best,
                };
                let base = ty * tpl_w;
                for (tx, &value) in row.iter().enumerate() {
                    let v = value as f32;
                    dot += plan.zero_mean[base + tx] * v;
                    sum_i += v;
                    sum_i2 += v * v;
                }
            }

            let var_i = sum_i2 - sum_i * sum_i / sum_w;
            if var_i <= MIN_WINDOW_VARIANCE {
                continue;
            }
            let score = dot / (plan.var_t * var_i).sqrt();
            if !score.is_finite() {
                continue;
            }
            // Strict comparison keeps the first placement in scan order on
            // ties (smallest y, then x).
            if best.map_or(true, |b| score > b.score) {
                best = Some(BestMatch { x, y, score });
            }
        }
    }
    best
}

/// Template plans cached by configured path, resolved against a base
/// directory.
///
/// A path that fails to load is remembered as absent so repeated cycles do
/// not retry the filesystem; the per-cycle warning stays with the caller.
pub struct TemplateCache {
    base_dir: Option<PathBuf>,
    plans: HashMap<PathBuf, Option<Arc<TemplatePlan>>>,
}

impl TemplateCache {
    /// Creates an empty cache resolving paths against `base_dir`.
    pub fn new(base_dir: Option<&Path>) -> Self {
        Self {
            base_dir: base_dir.map(Path::to_path_buf),
            plans: HashMap::new(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Loads and caches the plan for `path`, returning `None` when the
    /// file is missing, unreadable, or degenerate.
    pub fn load(&mut self, path: &Path) -> Option<Arc<TemplatePlan>> {
        if let Some(cached) = self.plans.get(path) {
            return cached.clone();
        }
        let resolved = self.resolve(path);
        let plan = load_gray_image(&resolved)
            .and_then(|img| TemplatePlan::from_view(img.view()))
            .map_err(|err| {
                tracing::warn!(path = %resolved.display(), error = %err, "template load failed");
                err
            })
            .ok()
            .map(Arc::new);
        self.plans.insert(path.to_path_buf(), plan.clone());
        plan
    }

    /// Returns the cached plan for `path` without touching the filesystem.
    pub fn get(&self, path: &Path) -> Option<Arc<TemplatePlan>> {
        self.plans.get(path).cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OwnedImage;

    fn make_image(width: usize, height: usize) -> OwnedImage {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push((((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8);
            }
        }
        OwnedImage::new(data, width, height).unwrap()
    }

    fn extract_patch(img: &OwnedImage, x0: usize, y0: usize, w: usize, h: usize) -> OwnedImage {
        let view = img.view();
        let mut out = Vec::with_capacity(w * h);
        for y in 0..h {
            out.extend_from_slice(&view.row(y0 + y).unwrap()[x0..x0 + w]);
        }
        OwnedImage::new(out, w, h).unwrap()
    }

    #[test]
    fn exact_patch_scores_near_one_at_its_origin() {
        let img = make_image(64, 48);
        let patch = extract_patch(&img, 20, 10, 16, 12);
        let plan = TemplatePlan::from_view(patch.view()).unwrap();

        let hit = best_match(img.view(), &plan).unwrap();
        assert_eq!((hit.x, hit.y), (20, 10));
        assert!(hit.score > 0.999, "score {}", hit.score);
    }

    #[test]
    fn undersized_crop_is_not_a_match() {
        let img = make_image(64, 48);
        let plan = TemplatePlan::from_view(img.view()).unwrap();
        let crop = img.view().roi(0, 0, 8, 8).unwrap();
        assert!(best_match(crop, &plan).is_none());
    }

    #[test]
    fn flat_template_is_degenerate() {
        let flat = OwnedImage::new(vec![7u8; 16], 4, 4).unwrap();
        let err = TemplatePlan::from_view(flat.view()).unwrap_err();
        assert_eq!(
            err,
            RegionMatchError::DegenerateTemplate {
                reason: "zero variance"
            }
        );
    }

    #[test]
    fn inverted_patch_scores_negative() {
        let img = make_image(32, 32);
        let patch = extract_patch(&img, 4, 4, 8, 8);
        let view = patch.view();
        let mut data = Vec::with_capacity(64);
        for y in 0..8 {
            for &v in view.row(y).unwrap() {
                data.push(255 - v);
            }
        }
        let anti = OwnedImage::new(data, 8, 8).unwrap();
        let plan = TemplatePlan::from_view(anti.view()).unwrap();

        let crop = img.view().roi(4, 4, 8, 8).unwrap();
        let hit = best_match(crop, &plan).unwrap();
        assert!(hit.score < 0.0, "score {}", hit.score);
    }
}

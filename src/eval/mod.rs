//! Per-cycle region evaluation.
//!
//! [`EvalContext`] owns everything evaluation needs across cycles: the
//! compiled regions, the template plan cache, and the shared text
//! recognizer. Each call to [`EvalContext::evaluate_frame`] produces a
//! fresh result map; nothing from a previous cycle leaks into the next.
//! A region that cannot be evaluated (missing template file, undersized
//! crop, no detections) degrades to a zero-confidence non-match with a
//! warning and never aborts its siblings.

use crate::image::ImageView;
use crate::region::{Region, RegionKind};
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

pub mod fusion;
pub mod template;
pub mod text;

pub use fusion::fuse_hybrid;
pub use template::{best_match, BestMatch, TemplateCache, TemplatePlan};
pub use text::{NullRecognizer, TextDetection, TextRecognizer, TextScore};

use crate::region::FusionKey;

/// Best-match offset within the region crop plus the template's pixel
/// size. Click targeting uses this to aim at the matched sub-feature
/// instead of the region's geometric center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchLocation {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Outcome of evaluating one region for one frame.
///
/// Created fresh each cycle and discarded after policy resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationResult {
    pub matched: bool,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub kind: RegionKind,
    /// First unmet required sub-check, hybrid regions only.
    pub failed_requirement: Option<FusionKey>,
    pub location: Option<MatchLocation>,
}

impl EvaluationResult {
    /// Zero-confidence non-match for a region of the given kind.
    pub fn unmatched(kind: RegionKind) -> Self {
        Self {
            matched: false,
            confidence: 0.0,
            kind,
            failed_requirement: None,
            location: None,
        }
    }
}

/// Long-lived evaluation state shared across cycles.
pub struct EvalContext {
    regions: Vec<Region>,
    templates: TemplateCache,
    recognizer: Arc<dyn TextRecognizer>,
}

impl EvalContext {
    /// Builds a context, loading every referenced template up front.
    ///
    /// Template load failures are warnings here and zero-confidence
    /// results at evaluation time, never hard errors.
    pub fn new(
        regions: Vec<Region>,
        base_dir: Option<&std::path::Path>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        let mut templates = TemplateCache::new(base_dir);
        for region in &regions {
            if let Some(cfg) = &region.template {
                templates.load(&cfg.path);
            }
        }
        Self {
            regions,
            templates,
            recognizer,
        }
    }

    /// Returns the compiled region set.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Evaluates every detectable region against a grayscale frame.
    ///
    /// Button and placeholder-detector regions are skipped and absent from
    /// the map. The map is fully populated before it is returned, so
    /// policy resolution never observes a partial cycle.
    pub fn evaluate_frame(&self, frame: ImageView<'_, u8>) -> BTreeMap<String, EvaluationResult> {
        #[cfg(feature = "rayon")]
        let entries: Vec<(String, Option<EvaluationResult>)> = self
            .regions
            .par_iter()
            .map(|region| (region.name.clone(), self.evaluate_region(frame, region)))
            .collect();

        #[cfg(not(feature = "rayon"))]
        let entries: Vec<(String, Option<EvaluationResult>)> = self
            .regions
            .iter()
            .map(|region| (region.name.clone(), self.evaluate_region(frame, region)))
            .collect();

        entries
            .into_iter()
            .filter_map(|(name, result)| result.map(|r| (name, r)))
            .collect()
    }

    fn evaluate_region(
        &self,
        frame: ImageView<'_, u8>,
        region: &Region,
    ) -> Option<EvaluationResult> {
        match region.kind {
            RegionKind::Button | RegionKind::Detector => None,
            RegionKind::Template => Some(self.eval_template(frame, region)),
            RegionKind::Ocr => Some(self.eval_ocr(frame, region)),
            RegionKind::Hybrid => {
                let template = self.eval_template(frame, region);
                let ocr = self.eval_ocr(frame, region);
                let logic = region.fusion.as_ref()?;
                Some(fuse_hybrid(logic, Some(&template), Some(&ocr)))
            }
        }
    }

    /// Clamps the region rect to the frame and returns the crop plus the
    /// crop's offset from the rect origin.
    fn crop<'a>(
        &self,
        frame: ImageView<'a, u8>,
        region: &Region,
    ) -> Option<(ImageView<'a, u8>, (u32, u32))> {
        let rect = &region.rect;
        let x0 = rect.x.max(0) as i64;
        let y0 = rect.y.max(0) as i64;
        let x1 = (rect.x as i64 + rect.w as i64).min(frame.width() as i64);
        let y1 = (rect.y as i64 + rect.h as i64).min(frame.height() as i64);
        if x1 <= x0 || y1 <= y0 {
            tracing::warn!(region = %region.name, "region rect outside frame");
            return None;
        }
        let view = frame
            .roi(
                x0 as usize,
                y0 as usize,
                (x1 - x0) as usize,
                (y1 - y0) as usize,
            )
            .ok()?;
        let offset = ((x0 - rect.x as i64) as u32, (y0 - rect.y as i64) as u32);
        Some((view, offset))
    }

    fn eval_template(&self, frame: ImageView<'_, u8>, region: &Region) -> EvaluationResult {
        let kind = region.kind;
        let Some(cfg) = &region.template else {
            return EvaluationResult::unmatched(kind);
        };
        let Some((crop, offset)) = self.crop(frame, region) else {
            return EvaluationResult::unmatched(kind);
        };
        let Some(plan) = self.templates.get(&cfg.path) else {
            tracing::warn!(region = %region.name, path = %cfg.path.display(), "template unavailable");
            return EvaluationResult::unmatched(kind);
        };

        let Some(hit) = best_match(crop, &plan) else {
            tracing::warn!(
                region = %region.name,
                crop_w = crop.width(),
                crop_h = crop.height(),
                tpl_w = plan.width(),
                tpl_h = plan.height(),
                "crop smaller than template or no scorable window"
            );
            return EvaluationResult::unmatched(kind);
        };

        let confidence = hit.score.clamp(0.0, 1.0);
        EvaluationResult {
            matched: confidence >= cfg.threshold,
            confidence,
            kind,
            failed_requirement: None,
            location: Some(MatchLocation {
                x: offset.0 + hit.x as u32,
                y: offset.1 + hit.y as u32,
                width: plan.width() as u32,
                height: plan.height() as u32,
            }),
        }
    }

    fn eval_ocr(&self, frame: ImageView<'_, u8>, region: &Region) -> EvaluationResult {
        let kind = region.kind;
        let Some(cfg) = &region.ocr else {
            return EvaluationResult::unmatched(kind);
        };
        let Some((crop, _)) = self.crop(frame, region) else {
            return EvaluationResult::unmatched(kind);
        };

        let detections = self.recognizer.recognize(crop);
        if detections.is_empty() {
            tracing::warn!(region = %region.name, "no text detections in crop");
            return EvaluationResult::unmatched(kind);
        }
        let score = text::score_detections(&detections, cfg);
        EvaluationResult {
            matched: score.matched,
            confidence: score.confidence,
            kind,
            failed_requirement: None,
            location: None,
        }
    }
}

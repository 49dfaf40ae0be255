//! Hybrid fusion of template and text sub-results.

use crate::eval::EvaluationResult;
use crate::region::{Aggregate, FusionKey, FusionLogic, RegionKind};

impl Aggregate {
    /// Combines confidences under the configured function.
    ///
    /// An empty list yields 0.0 for every mode.
    pub fn combine(self, values: &[f32]) -> f32 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Self::Min => values.iter().copied().fold(f32::INFINITY, f32::min),
            Self::Mean => values.iter().sum::<f32>() / values.len() as f32,
            Self::Product => values.iter().product(),
        }
    }
}

/// Fuses the sub-results of one hybrid region.
///
/// Required sub-checks are tested in `require` order; the first unmet one
/// zeroes the result and is recorded in `failed_requirement`. When all
/// hold, the fused confidence aggregates the required confidences, and the
/// template sub-result's location is carried over when template is among
/// the requirements.
pub fn fuse_hybrid(
    logic: &FusionLogic,
    template: Option<&EvaluationResult>,
    ocr: Option<&EvaluationResult>,
) -> EvaluationResult {
    let mut confidences = Vec::with_capacity(logic.require.len());
    let mut location = None;

    for &key in &logic.require {
        let sub = match key {
            FusionKey::Template => template,
            FusionKey::Ocr => ocr,
        };
        let Some(sub) = sub.filter(|s| s.matched) else {
            return EvaluationResult {
                matched: false,
                confidence: 0.0,
                kind: RegionKind::Hybrid,
                failed_requirement: Some(key),
                location: None,
            };
        };
        confidences.push(sub.confidence);
        if key == FusionKey::Template {
            location = sub.location;
        }
    }

    EvaluationResult {
        matched: true,
        confidence: logic.aggregate.combine(&confidences).clamp(0.0, 1.0),
        kind: RegionKind::Hybrid,
        failed_requirement: None,
        location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::MatchLocation;

    fn result(matched: bool, confidence: f32, kind: RegionKind) -> EvaluationResult {
        EvaluationResult {
            matched,
            confidence,
            kind,
            failed_requirement: None,
            location: None,
        }
    }

    #[test]
    fn combine_empty_is_zero_for_every_mode() {
        assert_eq!(Aggregate::Min.combine(&[]), 0.0);
        assert_eq!(Aggregate::Mean.combine(&[]), 0.0);
        assert_eq!(Aggregate::Product.combine(&[]), 0.0);
    }

    #[test]
    fn combine_modes_order_as_expected() {
        let values = [0.9f32, 0.5, 0.7];
        let min = Aggregate::Min.combine(&values);
        let mean = Aggregate::Mean.combine(&values);
        let product = Aggregate::Product.combine(&values);
        assert!((min - 0.5).abs() < 1e-6);
        assert!((mean - 0.7).abs() < 1e-6);
        assert!((product - 0.315).abs() < 1e-6);
        assert!(product <= min && min <= mean);
    }

    #[test]
    fn first_unmet_requirement_is_reported() {
        let logic = FusionLogic {
            require: vec![FusionKey::Template, FusionKey::Ocr],
            aggregate: Aggregate::Min,
        };
        let tpl = result(true, 0.9, RegionKind::Template);
        let ocr = result(false, 0.2, RegionKind::Ocr);

        let fused = fuse_hybrid(&logic, Some(&tpl), Some(&ocr));
        assert!(!fused.matched);
        assert_eq!(fused.confidence, 0.0);
        assert_eq!(fused.failed_requirement, Some(FusionKey::Ocr));

        // Reversed order reports the other key first when both fail.
        let logic = FusionLogic {
            require: vec![FusionKey::Ocr, FusionKey::Template],
            aggregate: Aggregate::Min,
        };
        let tpl = result(false, 0.0, RegionKind::Template);
        let fused = fuse_hybrid(&logic, Some(&tpl), Some(&ocr));
        assert_eq!(fused.failed_requirement, Some(FusionKey::Ocr));
    }

    #[test]
    fn all_met_aggregates_and_keeps_template_location() {
        let logic = FusionLogic {
            require: vec![FusionKey::Template, FusionKey::Ocr],
            aggregate: Aggregate::Mean,
        };
        let mut tpl = result(true, 0.8, RegionKind::Template);
        tpl.location = Some(MatchLocation {
            x: 3,
            y: 4,
            width: 10,
            height: 10,
        });
        let ocr = result(true, 0.6, RegionKind::Ocr);

        let fused = fuse_hybrid(&logic, Some(&tpl), Some(&ocr));
        assert!(fused.matched);
        assert!((fused.confidence - 0.7).abs() < 1e-6);
        assert_eq!(fused.failed_requirement, None);
        assert_eq!(fused.location.unwrap().x, 3);
    }

    #[test]
    fn missing_sub_result_counts_as_unmet() {
        let logic = FusionLogic {
            require: vec![FusionKey::Template],
            aggregate: Aggregate::Min,
        };
        let fused = fuse_hybrid(&logic, None, None);
        assert!(!fused.matched);
        assert_eq!(fused.failed_requirement, Some(FusionKey::Template));
    }
}

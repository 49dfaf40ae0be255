//! End-to-end cycle tests: YAML config on disk, synthetic frames, a
//! scripted recognizer, and the runner loop.

use regionmatch::eval::{TextDetection, TextRecognizer};
use regionmatch::policy::{load_policy_set, ActionKind, Decision, PolicyEngine};
use regionmatch::region::load_region_specs;
use regionmatch::runner::{DecisionExecutor, FrameSource, RunConfig, Runner};
use regionmatch::{
    load_region_set, EvalContext, ImageView, OwnedImage, RegionMatchError, RegionMatchResult,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn make_frame(width: usize, height: usize) -> OwnedImage {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push((((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8);
        }
    }
    OwnedImage::new(data, width, height).unwrap()
}

fn save_patch(frame: &OwnedImage, x0: usize, y0: usize, w: usize, h: usize, path: &Path) {
    let view = frame.view();
    let mut data = Vec::with_capacity(w * h);
    for y in 0..h {
        data.extend_from_slice(&view.row(y0 + y).unwrap()[x0..x0 + w]);
    }
    image::GrayImage::from_raw(w as u32, h as u32, data)
        .unwrap()
        .save(path)
        .unwrap();
}

/// Recognizer returning the same detections for every crop.
struct Scripted(Vec<TextDetection>);

impl TextRecognizer for Scripted {
    fn recognize(&self, _crop: ImageView<'_, u8>) -> Vec<TextDetection> {
        self.0.clone()
    }
}

struct RepeatSource {
    frame: OwnedImage,
    served: usize,
}

impl FrameSource for RepeatSource {
    fn next_frame(&mut self) -> RegionMatchResult<OwnedImage> {
        self.served += 1;
        Ok(self.frame.clone())
    }
}

#[derive(Default, Clone)]
struct Recording(Arc<Mutex<Vec<(Decision, Option<(i32, i32)>)>>>);

impl DecisionExecutor for Recording {
    fn execute(
        &mut self,
        decision: &Decision,
        target: Option<(i32, i32)>,
    ) -> RegionMatchResult<()> {
        self.0.lock().unwrap().push((decision.clone(), target));
        Ok(())
    }
}

const REGIONS_YAML: &str = r#"
- name: banner
  kind: hybrid
  rect: [20, 20, 40, 30]
  template:
    path: banner.png
    threshold: 0.8
  ocr:
    expected: victory
    mode: contains
    min_confidence: 0.5
  fusion:
    require: [template, ocr]
    aggregate: min
  click:
    anchor: center
    offset: [0, 0]
- name: status
  kind: ocr
  rect: [0, 60, 80, 20]
  ocr:
    expected: crashed
    mode: contains
    min_confidence: 0.5
"#;

const POLICIES_YAML: &str = r#"
policies:
  - name: click_banner
    when:
      region: banner
      matched: true
      confidence_gte: 0.6
    action:
      type: click
      cooldown: 5.0
  - name: bail_out
    when:
      region: status
      matched: true
    action:
      type: stop
      cooldown: 0.0
"#;

fn write_run_dir(dir: &Path, frame: &OwnedImage) {
    std::fs::write(dir.join("regions.yaml"), REGIONS_YAML).unwrap();
    std::fs::write(dir.join("policies.yaml"), POLICIES_YAML).unwrap();
    save_patch(frame, 30, 25, 16, 12, &dir.join("banner.png"));
}

fn build_runner(
    dir: &Path,
    frame: &OwnedImage,
    detections: Vec<TextDetection>,
) -> (Runner<RepeatSource, Recording>, Recording) {
    let (regions, _) = load_region_set(&dir.join("regions.yaml"), 100, 100, Some(dir)).unwrap();
    let specs = load_region_specs(&dir.join("regions.yaml")).unwrap();
    let (policies, _) = load_policy_set(&dir.join("policies.yaml"), &specs).unwrap();

    let ctx = EvalContext::new(regions, Some(dir), Arc::new(Scripted(detections)));
    let executor = Recording::default();
    let runner = Runner::new(
        ctx,
        PolicyEngine::new(policies),
        RepeatSource {
            frame: frame.clone(),
            served: 0,
        },
        executor.clone(),
        RunConfig {
            interval: Duration::from_millis(1),
        },
    );
    (runner, executor)
}

#[test]
fn hybrid_region_fires_click_with_resolved_target() {
    let dir = tempfile::tempdir().unwrap();
    let frame = make_frame(100, 100);
    write_run_dir(dir.path(), &frame);

    let (mut runner, executor) = build_runner(
        dir.path(),
        &frame,
        vec![TextDetection {
            text: "VICTORY achieved".to_string(),
            confidence: 0.9,
        }],
    );

    let decision = runner.run_cycle(&frame).unwrap().unwrap();
    assert_eq!(decision.policy, "click_banner");
    assert_eq!(decision.region, "banner");
    assert_eq!(decision.action.kind, ActionKind::Click);
    // min(template ~1.0, ocr 0.9) = 0.9
    assert!((decision.confidence - 0.9).abs() < 1e-3);

    let recorded = executor.0.lock().unwrap();
    let (_, target) = &recorded[0];
    // Patch at frame (30, 25), size 16x12, rect origin (20, 20): center of
    // the matched sub-feature, not of the region.
    assert_eq!(*target, Some((38, 31)));
}

#[test]
fn failed_ocr_requirement_blocks_the_click_policy() {
    let dir = tempfile::tempdir().unwrap();
    let frame = make_frame(100, 100);
    write_run_dir(dir.path(), &frame);

    // Text present but below the minimum confidence: hybrid stays unmatched.
    let (mut runner, executor) = build_runner(
        dir.path(),
        &frame,
        vec![TextDetection {
            text: "victory".to_string(),
            confidence: 0.3,
        }],
    );

    assert!(runner.run_cycle(&frame).unwrap().is_none());
    assert!(executor.0.lock().unwrap().is_empty());
}

#[test]
fn stop_policy_ends_the_run_loop() {
    let dir = tempfile::tempdir().unwrap();
    let frame = make_frame(100, 100);
    write_run_dir(dir.path(), &frame);

    let (mut runner, executor) = build_runner(
        dir.path(),
        &frame,
        vec![TextDetection {
            text: "process crashed".to_string(),
            confidence: 0.8,
        }],
    );

    // "process crashed" fails the banner's OCR requirement, so only the
    // stop policy is eligible.
    runner.run().unwrap();
    let recorded = executor.0.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0.policy, "bail_out");
    assert_eq!(recorded[0].0.action.kind, ActionKind::Stop);
    assert_eq!(recorded[0].1, None);
}

#[test]
fn cancel_token_stops_an_idle_loop() {
    let dir = tempfile::tempdir().unwrap();
    let frame = make_frame(100, 100);
    write_run_dir(dir.path(), &frame);

    // No detections at all: nothing ever fires.
    let (mut runner, executor) = build_runner(dir.path(), &frame, Vec::new());
    let token = runner.cancel_token();

    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
    });
    runner.run().unwrap();
    handle.join().unwrap();
    assert!(executor.0.lock().unwrap().is_empty());
}

#[test]
fn lint_rejection_carries_every_error() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = r#"
- name: a
  kind: mystery
  rect: [0, 0, 10, 10]
- name: b
  kind: template
  rect: [0, 0, 10, 10]
"#;
    std::fs::write(dir.path().join("regions.yaml"), yaml).unwrap();

    let err = load_region_set(&dir.path().join("regions.yaml"), 100, 100, Some(dir.path()))
        .unwrap_err();
    let RegionMatchError::LintRejected { diagnostics } = err else {
        panic!("expected lint rejection");
    };
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|d| d.region == "a"));
    assert!(errors.iter().any(|d| d.region == "b"));
}

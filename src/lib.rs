//! Regionmatch evaluates configured screen regions of a captured frame with
//! template matching and text recognition, fuses per-region results, and
//! resolves an ordered policy list into at most one action per cycle.
//!
//! The crate is the decision core only: frame capture, on-screen overlays,
//! and the click/stop executor are external collaborators behind the
//! [`runner::FrameSource`] and [`runner::DecisionExecutor`] seams. Optional
//! parallel region evaluation is available via the `rayon` feature.

pub mod eval;
pub mod image;
pub mod lint;
pub mod policy;
pub mod region;
pub mod runner;
pub mod util;

pub use eval::{
    fuse_hybrid, EvalContext, EvaluationResult, MatchLocation, NullRecognizer, TextDetection,
    TextRecognizer,
};
pub use image::{ImageView, OwnedImage};
pub use lint::{has_errors, lint_policies, lint_regions, Diagnostic, Level};
pub use policy::{Action, ActionKind, Decision, Policy, PolicyEngine};
pub use region::{
    compile_regions, load_region_set, Aggregate, Anchor, ClickBinding, FusionKey, FusionLogic,
    OcrConfig, Rect, Region, RegionKind, TemplateConfig, TextMatchMode,
};
pub use runner::{CancelToken, DecisionExecutor, FrameSource, RunConfig, Runner};
pub use util::{RegionMatchError, RegionMatchResult};

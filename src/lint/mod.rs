//! Structural validation of region and policy sets.
//!
//! The linter produces diagnostics, never panics and never stops at the
//! first finding. Only structural violations (missing name, unresolvable
//! kind, missing required block, unresolvable template file) are
//! error-level; geometry and threshold oddities are warnings. Callers fail
//! a run only on error-level diagnostics.

use crate::region::spec::{PolicySpec, RegionSpec};
use crate::region::{Aggregate, FusionKey, MatchMethod, Rect, RegionKind};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One lint finding, attributed to a region (or policy) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub region: String,
    pub message: String,
}

impl Diagnostic {
    fn error(region: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            region: region.into(),
            message: message.into(),
        }
    }

    fn warning(region: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            region: region.into(),
            message: message.into(),
        }
    }

    /// True for error-level findings.
    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.level, self.region, self.message)
    }
}

/// True if any diagnostic in the list is error-level.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Lints a region set against the frame dimensions and against itself.
///
/// Template paths are resolved against `base_dir` when given. Checks are
/// independent; an unknown kind short-circuits the remaining checks for
/// that region only.
pub fn lint_regions(
    specs: &[RegionSpec],
    img_w: u32,
    img_h: u32,
    base_dir: Option<&Path>,
) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for spec in specs {
        let name = spec.name.as_str();
        if name.is_empty() {
            out.push(Diagnostic::error("<unnamed>", "missing region name"));
        } else if !seen.insert(name) {
            out.push(Diagnostic::error(name, "duplicate region name"));
        }

        let Some(kind) = RegionKind::parse(&spec.kind) else {
            out.push(Diagnostic::error(
                name,
                format!("unknown kind '{}'", spec.kind),
            ));
            continue;
        };

        lint_rect(spec, img_w, img_h, &mut out);

        if !spec.annotation.is_empty() && spec.annotation.len() > 64 {
            out.push(Diagnostic::warning(
                name,
                format!("annotation too long ({} chars)", spec.annotation.len()),
            ));
        }

        if kind.uses_template() {
            lint_template(spec, kind, base_dir, &mut out);
        }
        if kind.uses_ocr() {
            lint_ocr(spec, kind, &mut out);
        }
        if kind == RegionKind::Hybrid {
            lint_fusion(spec, &mut out);
        }
    }

    lint_overlaps(specs, &mut out);
    out
}

fn lint_rect(spec: &RegionSpec, img_w: u32, img_h: u32, out: &mut Vec<Diagnostic>) {
    let name = spec.name.as_str();
    if spec.rect.len() != 4 {
        out.push(Diagnostic::error(name, "rect must be [x, y, w, h]"));
        return;
    }
    let Some(rect) = Rect::from_raw(&spec.rect) else {
        out.push(Diagnostic::error(name, "zero or negative size"));
        return;
    };

    if rect.x < 0 || rect.y < 0 {
        out.push(Diagnostic::warning(name, "negative coordinates"));
    }
    // Per-axis overflow reports, so a rect past both edges yields two
    // findings.
    let right = rect.x as i64 + rect.w as i64;
    let bottom = rect.y as i64 + rect.h as i64;
    if right > img_w as i64 {
        out.push(Diagnostic::warning(
            name,
            format!("out of bounds: x+w = {right} exceeds image width {img_w}"),
        ));
    }
    if bottom > img_h as i64 {
        out.push(Diagnostic::warning(
            name,
            format!("out of bounds: y+h = {bottom} exceeds image height {img_h}"),
        ));
    }
}

fn lint_template(
    spec: &RegionSpec,
    kind: RegionKind,
    base_dir: Option<&Path>,
    out: &mut Vec<Diagnostic>,
) {
    let name = spec.name.as_str();
    let Some(block) = &spec.template else {
        let what = if kind == RegionKind::Hybrid {
            "hybrid region missing template block"
        } else {
            "template region missing template block"
        };
        out.push(Diagnostic::error(name, what));
        return;
    };

    if block.path.is_empty() {
        out.push(Diagnostic::error(name, "template missing image path"));
    } else {
        let resolved = match base_dir {
            Some(dir) => dir.join(&block.path),
            None => Path::new(&block.path).to_path_buf(),
        };
        if !resolved.exists() {
            out.push(Diagnostic::error(
                name,
                format!("template image missing: {}", block.path),
            ));
        }
    }

    if MatchMethod::parse(&block.method).is_none() {
        out.push(Diagnostic::warning(
            name,
            format!("unknown match method '{}'", block.method),
        ));
    }
    if !(block.threshold > 0.0 && block.threshold <= 1.0) {
        out.push(Diagnostic::warning(
            name,
            format!("template threshold {} out of (0, 1]", block.threshold),
        ));
    }
}

fn lint_ocr(spec: &RegionSpec, kind: RegionKind, out: &mut Vec<Diagnostic>) {
    let name = spec.name.as_str();
    let Some(block) = &spec.ocr else {
        let what = if kind == RegionKind::Hybrid {
            "hybrid region missing ocr block"
        } else {
            "ocr region missing ocr block"
        };
        out.push(Diagnostic::error(name, what));
        return;
    };

    if block.expected.is_empty() {
        out.push(Diagnostic::error(name, "ocr region missing expected text"));
    }
    match block.mode.as_str() {
        "exact" | "contains" => {}
        "regex" => {
            if let Err(err) = regex::Regex::new(&block.expected) {
                out.push(Diagnostic::error(
                    name,
                    format!("invalid regex pattern: {err}"),
                ));
            }
        }
        other => {
            out.push(Diagnostic::warning(
                name,
                format!("unknown match mode '{other}'"),
            ));
        }
    }
    if !(0.0..=1.0).contains(&block.min_confidence) {
        out.push(Diagnostic::warning(
            name,
            format!("ocr confidence {} out of [0, 1]", block.min_confidence),
        ));
    }
}

fn lint_fusion(spec: &RegionSpec, out: &mut Vec<Diagnostic>) {
    let name = spec.name.as_str();
    let (require, aggregate) = match &spec.fusion {
        Some(block) => (block.require.as_deref(), block.aggregate.as_deref()),
        None => (None, None),
    };

    match require {
        None => {
            out.push(Diagnostic::warning(
                name,
                "missing require list; both checks will be required",
            ));
        }
        Some([]) => {
            out.push(Diagnostic::warning(
                name,
                "empty require list; both checks will be required",
            ));
        }
        Some(keys) => {
            for key in keys {
                if FusionKey::parse(key).is_none() {
                    out.push(Diagnostic::error(
                        name,
                        format!("unknown require key '{key}'"),
                    ));
                }
            }
            if keys.len() == 1 {
                out.push(Diagnostic::warning(
                    name,
                    "require lists a single check; consider a single-mode region",
                ));
            }
        }
    }

    if let Some(raw) = aggregate {
        if Aggregate::parse(raw).is_none() {
            out.push(Diagnostic::warning(
                name,
                format!("unknown aggregate '{raw}'; min will be used"),
            ));
        }
    }
}

fn lint_overlaps(specs: &[RegionSpec], out: &mut Vec<Diagnostic>) {
    // Overlap is symmetric and reported on both names.
    for (i, a) in specs.iter().enumerate() {
        let Some(rect_a) = Rect::from_raw(&a.rect) else {
            continue;
        };
        for b in &specs[i + 1..] {
            let Some(rect_b) = Rect::from_raw(&b.rect) else {
                continue;
            };
            if rect_a.intersects(&rect_b) {
                out.push(Diagnostic::warning(&a.name, format!("overlaps {}", b.name)));
                out.push(Diagnostic::warning(&b.name, format!("overlaps {}", a.name)));
            }
        }
    }
}

/// Lints a policy set against the region set it will run over.
///
/// Diagnostics are attributed to the policy name.
pub fn lint_policies(policies: &[PolicySpec], regions: &[RegionSpec]) -> Vec<Diagnostic> {
    let region_names: HashSet<&str> = regions.iter().map(|r| r.name.as_str()).collect();
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for policy in policies {
        let name = policy.name.as_str();
        if name.is_empty() {
            out.push(Diagnostic::error("<unnamed>", "missing policy name"));
        } else if !seen.insert(name) {
            out.push(Diagnostic::error(name, "duplicate policy name"));
        }

        match policy.action.kind.as_str() {
            "click" | "stop" => {}
            other => {
                out.push(Diagnostic::error(
                    name,
                    format!("unknown action type '{other}'"),
                ));
            }
        }
        if policy.action.cooldown < 0.0 {
            out.push(Diagnostic::error(name, "negative cooldown"));
        }

        if !region_names.contains(policy.when.region.as_str()) {
            out.push(Diagnostic::warning(
                name,
                format!("references unknown region '{}'", policy.when.region),
            ));
        }
        if let Some(gte) = policy.when.confidence_gte {
            if !(0.0..=1.0).contains(&gte) {
                out.push(Diagnostic::warning(
                    name,
                    format!("confidence_gte {gte} out of [0, 1]"),
                ));
            }
        }
    }

    out
}

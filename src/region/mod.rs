//! Typed region model and compilation from raw specs.
//!
//! Region definitions enter the system as loosely typed [`spec`] records,
//! get linted, and are then compiled into the immutable types here. All
//! string-coded values (kind, match mode, aggregate, anchor) are resolved
//! at compile time; evaluation never dispatches on raw strings.

use crate::eval::MatchLocation;
use crate::lint;
use crate::util::{RegionMatchError, RegionMatchResult};
use std::fmt;
use std::path::{Path, PathBuf};

pub mod spec;

pub use spec::{load_policy_specs, load_region_specs, RegionSpec};

/// Axis-aligned rectangle in frame coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    /// Builds a rect from a raw `[x, y, w, h]` list.
    ///
    /// Returns `None` unless the list has exactly four entries with
    /// positive width and height that fit the coordinate types.
    pub fn from_raw(raw: &[i64]) -> Option<Self> {
        if raw.len() != 4 {
            return None;
        }
        let x = i32::try_from(raw[0]).ok()?;
        let y = i32::try_from(raw[1]).ok()?;
        if raw[2] <= 0 || raw[3] <= 0 {
            return None;
        }
        let w = u32::try_from(raw[2]).ok()?;
        let h = u32::try_from(raw[3]).ok()?;
        Some(Self { x, y, w, h })
    }

    /// Strict axis-aligned intersection test. Zero-area touching at an
    /// edge or corner does not count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        let (ar, ab) = (self.x + self.w as i32, self.y + self.h as i32);
        let (br, bb) = (other.x + other.w as i32, other.y + other.h as i32);
        self.x < br && other.x < ar && self.y < bb && other.y < ab
    }

    /// Returns the center point of the rect.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.w / 2) as i32,
            self.y + (self.h / 2) as i32,
        )
    }
}

/// Detection mode of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Click target only; never evaluated.
    Button,
    /// Template matching against a reference image.
    Template,
    /// Text recognition against an expected-text condition.
    Ocr,
    /// Template and text recognition fused under a require/aggregate rule.
    Hybrid,
    /// Placeholder detector mode; accepted but never evaluated.
    Detector,
}

impl RegionKind {
    /// Parses the wire name of a kind.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "button" => Some(Self::Button),
            "template" => Some(Self::Template),
            "ocr" => Some(Self::Ocr),
            "hybrid" => Some(Self::Hybrid),
            "unimplemented-detector" => Some(Self::Detector),
            _ => None,
        }
    }

    /// True for kinds that run template matching.
    pub fn uses_template(self) -> bool {
        matches!(self, Self::Template | Self::Hybrid)
    }

    /// True for kinds that run text recognition.
    pub fn uses_ocr(self) -> bool {
        matches!(self, Self::Ocr | Self::Hybrid)
    }
}

/// Template correlation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMethod {
    /// Zero-mean normalized cross-correlation.
    #[default]
    NormedCorrelation,
}

impl MatchMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "normed_correlation" => Some(Self::NormedCorrelation),
            _ => None,
        }
    }
}

/// How recognized text is compared against the expected text.
#[derive(Debug, Clone)]
pub enum TextMatchMode {
    /// Full-string equality after trimming.
    Exact,
    /// Case-insensitive substring.
    Contains,
    /// Case-sensitive pattern search, compiled at load time.
    Regex(regex::Regex),
}

/// Confidence combination function for hybrid regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    /// Weakest link.
    #[default]
    Min,
    /// Arithmetic average.
    Mean,
    /// Multiplicative decay; penalizes several weak signals more than mean.
    Product,
}

impl Aggregate {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "min" => Some(Self::Min),
            "mean" => Some(Self::Mean),
            "product" => Some(Self::Product),
            _ => None,
        }
    }
}

/// Which sub-check a hybrid requirement refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionKey {
    Template,
    Ocr,
}

impl FusionKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "template" => Some(Self::Template),
            "ocr" => Some(Self::Ocr),
            _ => None,
        }
    }
}

impl fmt::Display for FusionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template => f.write_str("template"),
            Self::Ocr => f.write_str("ocr"),
        }
    }
}

/// Template matching configuration of a region.
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    pub path: PathBuf,
    pub method: MatchMethod,
    /// Match threshold in (0, 1].
    pub threshold: f32,
}

/// Text recognition configuration of a region.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub expected: String,
    pub mode: TextMatchMode,
    /// Minimum detection confidence in [0, 1] required for a match.
    pub min_confidence: f32,
}

/// Fusion rule of a hybrid region.
#[derive(Debug, Clone)]
pub struct FusionLogic {
    /// Required sub-checks, in declaration order.
    pub require: Vec<FusionKey>,
    pub aggregate: Aggregate,
}

/// Click anchor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    Center,
    Origin,
}

/// Click binding of a region: anchor mode plus a pixel offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickBinding {
    pub anchor: Anchor,
    pub offset: (i32, i32),
}

impl ClickBinding {
    /// Resolves the click point in frame coordinates.
    ///
    /// With a match location the anchor targets the matched sub-feature
    /// inside the region rather than the region's own geometry.
    pub fn target(&self, rect: &Rect, location: Option<&MatchLocation>) -> (i32, i32) {
        let (mut x, mut y) = match location {
            Some(loc) => {
                let origin = (rect.x + loc.x as i32, rect.y + loc.y as i32);
                match self.anchor {
                    Anchor::Origin => origin,
                    Anchor::Center => (
                        origin.0 + (loc.width / 2) as i32,
                        origin.1 + (loc.height / 2) as i32,
                    ),
                }
            }
            None => match self.anchor {
                Anchor::Origin => (rect.x, rect.y),
                Anchor::Center => rect.center(),
            },
        };
        x += self.offset.0;
        y += self.offset.1;
        (x, y)
    }
}

/// Immutable, fully typed region definition.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub kind: RegionKind,
    pub rect: Rect,
    pub template: Option<TemplateConfig>,
    pub ocr: Option<OcrConfig>,
    pub fusion: Option<FusionLogic>,
    pub click: Option<ClickBinding>,
    pub annotation: String,
}

fn invalid(region: &str, reason: impl Into<String>) -> RegionMatchError {
    RegionMatchError::InvalidRegion {
        region: region.to_string(),
        reason: reason.into(),
    }
}

/// Compiles one raw spec into the typed model.
///
/// Callers are expected to lint first; compilation re-checks only what it
/// cannot represent. An unknown aggregate falls back to `min` here because
/// the linter has already surfaced it as a diagnostic.
pub fn compile_region(spec: &RegionSpec) -> RegionMatchResult<Region> {
    let name = spec.name.clone();
    let kind = RegionKind::parse(&spec.kind)
        .ok_or_else(|| invalid(&name, format!("unknown kind '{}'", spec.kind)))?;
    let rect = Rect::from_raw(&spec.rect)
        .ok_or_else(|| invalid(&name, "rect must be [x, y, w, h] with positive size"))?;

    let template = if kind.uses_template() {
        let block = spec
            .template
            .as_ref()
            .ok_or_else(|| invalid(&name, "missing template block"))?;
        Some(TemplateConfig {
            path: PathBuf::from(&block.path),
            method: MatchMethod::parse(&block.method).unwrap_or_default(),
            threshold: block.threshold,
        })
    } else {
        None
    };

    let ocr = if kind.uses_ocr() {
        let block = spec
            .ocr
            .as_ref()
            .ok_or_else(|| invalid(&name, "missing ocr block"))?;
        let mode = match block.mode.as_str() {
            "exact" => TextMatchMode::Exact,
            "regex" => {
                let re = regex::Regex::new(&block.expected).map_err(|err| {
                    invalid(&name, format!("invalid regex pattern: {err}"))
                })?;
                TextMatchMode::Regex(re)
            }
            // Unknown modes lint as a warning and read as the default.
            _ => TextMatchMode::Contains,
        };
        Some(OcrConfig {
            expected: block.expected.clone(),
            mode,
            min_confidence: block.min_confidence,
        })
    } else {
        None
    };

    let fusion = if kind == RegionKind::Hybrid {
        let (require_raw, aggregate_raw) = match &spec.fusion {
            Some(block) => (block.require.clone(), block.aggregate.clone()),
            None => (None, None),
        };
        let require = match require_raw {
            Some(keys) if !keys.is_empty() => {
                let mut parsed = Vec::with_capacity(keys.len());
                for key in &keys {
                    parsed.push(
                        FusionKey::parse(key)
                            .ok_or_else(|| invalid(&name, format!("unknown require key '{key}'")))?,
                    );
                }
                parsed
            }
            // Missing or empty require defaults to both checks; the linter
            // has already flagged the omission.
            _ => vec![FusionKey::Template, FusionKey::Ocr],
        };
        let aggregate = aggregate_raw
            .as_deref()
            .and_then(Aggregate::parse)
            .unwrap_or_default();
        Some(FusionLogic { require, aggregate })
    } else {
        None
    };

    let click = spec.click.as_ref().map(|c| ClickBinding {
        anchor: match c.anchor.as_str() {
            "origin" => Anchor::Origin,
            _ => Anchor::Center,
        },
        offset: c.offset,
    });

    Ok(Region {
        name,
        kind,
        rect,
        template,
        ocr,
        fusion,
        click,
        annotation: spec.annotation.clone(),
    })
}

/// Compiles a full region set.
pub fn compile_regions(specs: &[RegionSpec]) -> RegionMatchResult<Vec<Region>> {
    specs.iter().map(compile_region).collect()
}

/// Loads, lints, and compiles a region set in one step.
///
/// Error-level diagnostics reject the whole set; the returned error carries
/// every diagnostic so callers can report them all. On success the warnings
/// are returned alongside the compiled regions.
pub fn load_region_set(
    path: &Path,
    img_w: u32,
    img_h: u32,
    base_dir: Option<&Path>,
) -> RegionMatchResult<(Vec<Region>, Vec<lint::Diagnostic>)> {
    let specs = load_region_specs(path)?;
    let diagnostics = lint::lint_regions(&specs, img_w, img_h, base_dir);
    if diagnostics.iter().any(|d| d.is_error()) {
        return Err(RegionMatchError::LintRejected { diagnostics });
    }
    let regions = compile_regions(&specs)?;
    Ok((regions, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::MatchLocation;

    #[test]
    fn rect_rejects_bad_raw_lists() {
        assert!(Rect::from_raw(&[0, 0, 10]).is_none());
        assert!(Rect::from_raw(&[0, 0, 0, 10]).is_none());
        assert!(Rect::from_raw(&[0, 0, 10, -1]).is_none());
        assert_eq!(
            Rect::from_raw(&[1, 2, 3, 4]),
            Some(Rect {
                x: 1,
                y: 2,
                w: 3,
                h: 4
            })
        );
    }

    #[test]
    fn edge_touching_rects_do_not_intersect() {
        let a = Rect {
            x: 0,
            y: 0,
            w: 10,
            h: 10,
        };
        let b = Rect {
            x: 10,
            y: 0,
            w: 10,
            h: 10,
        };
        let c = Rect {
            x: 5,
            y: 5,
            w: 10,
            h: 10,
        };
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));
        assert!(a.intersects(&c));
        assert!(c.intersects(&a));
    }

    #[test]
    fn click_target_prefers_match_location() {
        let rect = Rect {
            x: 100,
            y: 200,
            w: 50,
            h: 50,
        };
        let binding = ClickBinding {
            anchor: Anchor::Center,
            offset: (1, -1),
        };
        let loc = MatchLocation {
            x: 10,
            y: 20,
            width: 8,
            height: 6,
        };
        assert_eq!(binding.target(&rect, Some(&loc)), (115, 222));
        assert_eq!(binding.target(&rect, None), (126, 224));

        let origin = ClickBinding {
            anchor: Anchor::Origin,
            offset: (0, 0),
        };
        assert_eq!(origin.target(&rect, Some(&loc)), (110, 220));
        assert_eq!(origin.target(&rect, None), (100, 200));
    }
}

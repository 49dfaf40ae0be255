use clap::{Parser, Subcommand};
use regionmatch::image::io::load_gray_image;
use regionmatch::policy::{load_policy_set, PolicyEngine};
use regionmatch::region::spec::{load_policy_specs, load_region_specs};
use regionmatch::region::RegionKind;
use regionmatch::{has_errors, lint_policies, lint_regions, EvalContext, NullRecognizer};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Region evaluation and policy linter/runner")]
struct Cli {
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lint a region set (and optionally a policy set) against a frame.
    Lint {
        /// Path to regions.yaml.
        regions: PathBuf,
        /// Frame image providing the coordinate space dimensions.
        frame: PathBuf,
        /// Optional policy file to lint against the region set.
        #[arg(long)]
        policies: Option<PathBuf>,
        /// Base directory for resolving template paths. Defaults to the
        /// region file's directory.
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },
    /// Evaluate recorded frames offline and print per-region results.
    Run {
        /// Run directory containing regions.yaml and a frames/ subdirectory.
        run_dir: PathBuf,
        /// Optional policy file; decisions are printed, not executed.
        #[arg(long)]
        policies: Option<PathBuf>,
    },
}

fn kind_label(kind: RegionKind) -> &'static str {
    match kind {
        RegionKind::Button => "button",
        RegionKind::Template => "template",
        RegionKind::Ocr => "ocr",
        RegionKind::Hybrid => "hybrid",
        RegionKind::Detector => "unimplemented-detector",
    }
}

fn frame_paths(run_dir: &Path) -> Vec<PathBuf> {
    let frame_dir = run_dir.join("frames");
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&frame_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
                .collect()
        })
        .unwrap_or_default();
    paths.sort();
    paths
}

fn run_lint(
    regions_path: &Path,
    frame_path: &Path,
    policies_path: Option<&Path>,
    base_dir: Option<&Path>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let frame = load_gray_image(frame_path)?;
    let specs = load_region_specs(regions_path)?;

    let default_base = regions_path.parent().map(Path::to_path_buf);
    let base = base_dir.or(default_base.as_deref());
    let mut diagnostics = lint_regions(&specs, frame.width() as u32, frame.height() as u32, base);

    if let Some(path) = policies_path {
        let policy_specs = load_policy_specs(path)?;
        diagnostics.extend(lint_policies(&policy_specs, &specs));
    }

    if diagnostics.is_empty() {
        println!("no findings");
    }
    for diagnostic in &diagnostics {
        println!("{diagnostic}");
    }
    Ok(has_errors(&diagnostics))
}

fn run_offline(
    run_dir: &Path,
    policies_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let frames = frame_paths(run_dir);
    if frames.is_empty() {
        return Err(format!("no frames under {}", run_dir.join("frames").display()).into());
    }
    let first = load_gray_image(&frames[0])?;

    let regions_path = run_dir.join("regions.yaml");
    let (regions, warnings) = regionmatch::load_region_set(
        &regions_path,
        first.width() as u32,
        first.height() as u32,
        Some(run_dir),
    )?;
    for warning in &warnings {
        eprintln!("{warning}");
    }

    let mut engine = match policies_path {
        Some(path) => {
            let specs = load_region_specs(&regions_path)?;
            let (policies, policy_warnings) = load_policy_set(path, &specs)?;
            for warning in &policy_warnings {
                eprintln!("{warning}");
            }
            Some(PolicyEngine::new(policies))
        }
        None => None,
    };

    let ctx = EvalContext::new(regions, Some(run_dir), Arc::new(NullRecognizer));
    for (idx, path) in frames.iter().enumerate() {
        let frame = load_gray_image(path)?;
        let results = ctx.evaluate_frame(frame.view());

        println!(
            "frame {}/{}: {}",
            idx + 1,
            frames.len(),
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        for (name, result) in &results {
            println!(
                "  - {name} [{}]: matched={} confidence={:.2}",
                kind_label(result.kind),
                result.matched,
                result.confidence
            );
        }
        if let Some(engine) = engine.as_mut() {
            if let Some(decision) = engine.evaluate(&results) {
                println!(
                    "  fired {} on {} (confidence {:.2})",
                    decision.policy, decision.region, decision.confidence
                );
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    let outcome = match &cli.command {
        Command::Lint {
            regions,
            frame,
            policies,
            base_dir,
        } => run_lint(regions, frame, policies.as_deref(), base_dir.as_deref()).map(|errors| {
            if errors {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }),
        Command::Run { run_dir, policies } => {
            run_offline(run_dir, policies.as_deref()).map(|_| ExitCode::SUCCESS)
        }
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

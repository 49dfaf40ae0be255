//! Cycle loop driving capture, evaluation, and policy resolution.
//!
//! One cycle runs to completion before the next begins: acquire frame,
//! evaluate every region, resolve policies, execute at most one decision,
//! sleep. Cancellation is a token polled once per cycle boundary; there is
//! no mid-cycle cancellation.

use crate::eval::EvalContext;
use crate::image::OwnedImage;
use crate::policy::{ActionKind, Decision, PolicyEngine};
use crate::region::ClickBinding;
use crate::util::RegionMatchResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative stop signal, checked once per cycle.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop; the loop exits at the next cycle boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Frame acquisition seam; the screen grabber lives behind this.
pub trait FrameSource {
    /// Produces the next grayscale frame, blocking until one is available.
    fn next_frame(&mut self) -> RegionMatchResult<OwnedImage>;
}

/// Effect seam; pointer clicks and process stops live behind this.
pub trait DecisionExecutor {
    /// Performs a fired decision. `target` is the resolved click point in
    /// frame coordinates for click actions, `None` for stop.
    fn execute(&mut self, decision: &Decision, target: Option<(i32, i32)>)
        -> RegionMatchResult<()>;
}

/// Loop pacing configuration.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    /// Fixed delay between cycles.
    pub interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
        }
    }
}

/// Owns the evaluation context and policy engine and drives the cycle loop.
pub struct Runner<S, E> {
    ctx: EvalContext,
    engine: PolicyEngine,
    source: S,
    executor: E,
    config: RunConfig,
    cancel: CancelToken,
}

impl<S: FrameSource, E: DecisionExecutor> Runner<S, E> {
    pub fn new(
        ctx: EvalContext,
        engine: PolicyEngine,
        source: S,
        executor: E,
        config: RunConfig,
    ) -> Self {
        Self {
            ctx,
            engine,
            source,
            executor,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Returns a token that stops the loop at the next cycle boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs one cycle against an already-acquired frame.
    ///
    /// Returns the fired decision, if any, after executing it. A stop
    /// decision is executed and returned; the caller decides to exit.
    pub fn run_cycle(&mut self, frame: &OwnedImage) -> RegionMatchResult<Option<Decision>> {
        let results = self.ctx.evaluate_frame(frame.view());
        let Some(decision) = self.engine.evaluate(&results) else {
            return Ok(None);
        };

        let target = match decision.action.kind {
            ActionKind::Stop => None,
            ActionKind::Click => self
                .ctx
                .regions()
                .iter()
                .find(|r| r.name == decision.region)
                .map(|region| {
                    let binding = region.click.unwrap_or_else(ClickBinding::default);
                    let location = results
                        .get(&decision.region)
                        .and_then(|r| r.location.as_ref().copied());
                    binding.target(&region.rect, location.as_ref())
                }),
        };

        tracing::info!(
            policy = %decision.policy,
            region = %decision.region,
            confidence = decision.confidence,
            "policy fired"
        );
        self.executor.execute(&decision, target)?;
        Ok(Some(decision))
    }

    /// Drives cycles until cancelled or a stop decision fires.
    pub fn run(&mut self) -> RegionMatchResult<()> {
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("run cancelled");
                return Ok(());
            }
            let frame = self.source.next_frame()?;
            if let Some(decision) = self.run_cycle(&frame)? {
                if decision.action.kind == ActionKind::Stop {
                    tracing::info!(policy = %decision.policy, "stop decision fired");
                    return Ok(());
                }
            }
            std::thread::sleep(self.config.interval);
        }
    }
}

use std::ops::Range;
use std::time::{Duration, Instant};

use cc_core::IntensitySampler;
use cc_snake::{SegParams, Snake, SnakeError, constrict, cut_intersects, cut_loops, resample};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use serde::Serialize;

use crate::coordination::{implode, loosen};
use crate::filter::{ContourFilter, FilterError, FilterErrorPolicy};
use crate::handler::{FrameState, HandlerId, SnakeHandler};
use crate::{CancelToken, Nest, SegmentationError};

/// Resampling with curvature-preserving insertion runs this often.
pub const RESAMPLE_EVERY: usize = 10;

/// Step of the post-convergence shrink.
pub const SHRINK_STEP: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub params: SegParams,
    /// Base of the per-handler random streams.
    pub seed: u64,
    pub filter_policy: FilterErrorPolicy,
    /// Evolve snakes of one frame on the rayon pool.
    pub parallel: bool,
    /// Wall-clock budget of one `segment_frame`/`segment_range` call.
    pub time_limit: Option<Duration>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            params: SegParams::default(),
            seed: 0,
            filter_policy: FilterErrorPolicy::StoreSegmented,
            parallel: false,
            time_limit: None,
        }
    }
}

/// Why iteration stopped for one snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationOutcome {
    Converged,
    IterationCap,
    /// Node count passed `nmax` percent of the starting count.
    NodeLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerReport {
    pub handler: HandlerId,
    pub state: FrameState,
    pub outcome: Option<IterationOutcome>,
    pub iterations: usize,
    pub nodes: usize,
    pub filter_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: usize,
    pub handlers: Vec<HandlerReport>,
}

impl FrameReport {
    pub fn finalized(&self) -> usize {
        self.handlers
            .iter()
            .filter(|h| h.state == FrameState::Finalized)
            .count()
    }

    pub fn died(&self) -> usize {
        self.handlers.iter().filter(|h| h.state == FrameState::Dead).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub frames: Vec<FrameReport>,
}

/// Runs the per-frame state machine over a [`Nest`].
///
/// For every handler active in a frame: seed a snake (fresh, or from the
/// previous final), loosen or implode the whole nest, iterate the force
/// model with periodic topology repair, finalize, filter and store. A frame
/// either stores results for all surviving handlers or, on a fatal error,
/// nothing at all.
pub struct Segmenter {
    config: SegmenterConfig,
    filters: Vec<Box<dyn ContourFilter>>,
    cancel: CancelToken,
}

struct Finished {
    outcome: IterationOutcome,
    iterations: usize,
    segmented: Snake,
    final_snake: Snake,
    filter_failed: bool,
}

enum Failure {
    Dead(SnakeError),
    Fatal(SegmentationError),
}

impl From<SnakeError> for Failure {
    fn from(e: SnakeError) -> Self {
        Self::Dead(e)
    }
}

struct Budget<'a> {
    frame: usize,
    cancel: &'a CancelToken,
    deadline: Option<Instant>,
}

impl Budget<'_> {
    fn check(&self) -> Result<(), Failure> {
        if self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Failure::Fatal(SegmentationError::Cancelled { frame: self.frame }));
        }
        Ok(())
    }
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self, SegmentationError> {
        config.params.validate()?;
        Ok(Self {
            config,
            filters: Vec::new(),
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn with_filter(mut self, filter: impl ContourFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push_filter(&mut self, filter: Box<dyn ContourFilter>) {
        self.filters.push(filter);
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn segment_frame<S>(
        &self,
        nest: &mut Nest,
        frame: usize,
        sampler: &S,
    ) -> Result<FrameReport, SegmentationError>
    where
        S: IntensitySampler + Sync + ?Sized,
    {
        let deadline = self.config.time_limit.map(|d| Instant::now() + d);
        self.run_frame(nest, frame, sampler, deadline)
    }

    /// Segments `frames` in order; `raster_for_frame` supplies each frame's
    /// sampler. Stops at the first fatal error, keeping earlier frames.
    pub fn segment_range<S, F>(
        &self,
        nest: &mut Nest,
        frames: Range<usize>,
        mut raster_for_frame: F,
    ) -> Result<RunReport, SegmentationError>
    where
        S: IntensitySampler + Sync,
        F: FnMut(usize) -> S,
    {
        let started = Instant::now();
        let deadline = self.config.time_limit.map(|d| started + d);
        let mut report = RunReport::default();

        for frame in frames.clone() {
            let sampler = raster_for_frame(frame);
            report
                .frames
                .push(self.run_frame(nest, frame, &sampler, deadline)?);
        }

        info!(
            "segmented frames {}..{} for {} handlers ({} alive) in {:.2?}",
            frames.start,
            frames.end,
            nest.len(),
            nest.alive_count(),
            started.elapsed()
        );
        Ok(report)
    }

    fn run_frame<S>(
        &self,
        nest: &mut Nest,
        frame: usize,
        sampler: &S,
        deadline: Option<Instant>,
    ) -> Result<FrameReport, SegmentationError>
    where
        S: IntensitySampler + Sync + ?Sized,
    {
        let params = &self.config.params;
        let mut dead_at_seed: Vec<(HandlerId, SnakeError)> = Vec::new();

        for h in nest.handlers_mut() {
            if !h.is_active_at(frame) {
                h.set_live(None);
                continue;
            }
            match self.seed_snake(h, frame) {
                Ok(snake) => {
                    h.set_live(Some(snake));
                    h.set_frame_state(FrameState::Seeded);
                }
                Err(e) => {
                    h.set_live(None);
                    dead_at_seed.push((h.id(), e));
                }
            }
        }

        if params.expand_snake {
            for (id, e) in implode(nest, frame, params) {
                if let Some(h) = nest.get_mut(HandlerId(id)) {
                    h.set_live(None);
                }
                dead_at_seed.push((HandlerId(id), e));
            }
        } else {
            loosen(nest, frame, params);
        }

        let budget = Budget {
            frame,
            cancel: &self.cancel,
            deadline,
        };
        let base_seed = self.config.seed;
        let work = |h: &mut SnakeHandler| -> Option<(HandlerId, Result<Finished, Failure>)> {
            let mut snake = h.live()?.clone();
            h.set_frame_state(FrameState::Iterating);
            let mut rng = SmallRng::seed_from_u64(stream_seed(base_seed, h.id().0, frame));
            let result = self.evolve(&mut snake, sampler, &mut rng, &budget);
            h.set_frame_state(match &result {
                Ok(_) => FrameState::Converged,
                Err(Failure::Dead(_)) => FrameState::Dead,
                Err(Failure::Fatal(_)) => FrameState::Aborted,
            });
            h.set_live(Some(snake));
            Some((h.id(), result))
        };

        let results: Vec<(HandlerId, Result<Finished, Failure>)> = if self.config.parallel {
            nest.handlers_mut()
                .par_iter_mut()
                .filter(|h| h.is_active_at(frame))
                .filter_map(work)
                .collect()
        } else {
            nest.handlers_mut()
                .iter_mut()
                .filter(|h| h.is_active_at(frame))
                .filter_map(work)
                .collect()
        };

        // Fatal errors win in handler order; nothing from this frame is kept.
        let mut finished = Vec::with_capacity(results.len());
        let mut dead = dead_at_seed;
        for (id, r) in results {
            match r {
                Ok(f) => finished.push((id, f)),
                Err(Failure::Dead(e)) => dead.push((id, e)),
                Err(Failure::Fatal(e)) => {
                    warn!("frame {frame}: handler {id} aborted the frame: {e}");
                    return Err(e);
                }
            }
        }

        let mut report = FrameReport {
            frame,
            handlers: Vec::with_capacity(finished.len() + dead.len()),
        };

        for (id, e) in dead {
            if let Some(h) = nest.get_mut(id) {
                warn!("frame {frame}: handler {id} died: {e}");
                h.kill(frame);
                report.handlers.push(HandlerReport {
                    handler: id,
                    state: FrameState::Dead,
                    outcome: None,
                    iterations: 0,
                    nodes: 0,
                    filter_failed: false,
                });
            }
        }

        for (id, f) in finished {
            if let Some(h) = nest.get_mut(id) {
                let nodes = f.final_snake.count();
                h.store(frame, f.segmented, f.final_snake);
                h.set_frame_state(FrameState::Finalized);
                report.handlers.push(HandlerReport {
                    handler: id,
                    state: FrameState::Finalized,
                    outcome: Some(f.outcome),
                    iterations: f.iterations,
                    nodes,
                    filter_failed: f.filter_failed,
                });
            }
        }
        report.handlers.sort_by_key(|r| r.handler);

        if !nest.is_empty() && nest.alive_count() == 0 {
            return Err(SegmentationError::AllSnakesDead { frame });
        }

        debug!(
            "frame {frame}: {} finalized, {} died",
            report.finalized(),
            report.died()
        );
        Ok(report)
    }

    fn seed_snake(&self, h: &SnakeHandler, frame: usize) -> Result<Snake, SnakeError> {
        let params = &self.config.params;
        let id = h.id().0;
        if params.reuse_previous
            && frame > h.start_frame()
            && let Some(prev) = h.final_snake(frame - 1)
        {
            return Snake::from_points(id, &prev.as_polygon(), params.orientation());
        }
        h.seed().to_snake(id, params)
    }

    fn evolve<S>(
        &self,
        snake: &mut Snake,
        sampler: &S,
        rng: &mut SmallRng,
        budget: &Budget<'_>,
    ) -> Result<Finished, Failure>
    where
        S: IntensitySampler + Sync + ?Sized,
    {
        let params = &self.config.params;
        let (outcome, iterations) = self.iterate(snake, sampler, rng, budget)?;
        if outcome == IterationOutcome::NodeLimit {
            warn!(
                "frame {}: snake {} stopped at node limit with {} nodes",
                budget.frame,
                snake.id(),
                snake.count()
            );
        }

        resample(snake, params, false, rng)?;
        if !params.expand_snake {
            snake.unfreeze_all();
            let steps = (params.final_shrink / SHRINK_STEP).round() as usize;
            for _ in 0..steps {
                snake.scale(SHRINK_STEP);
            }
        }
        cut_loops(snake, params)?;
        cut_intersects(snake, params)?;

        let segmented = snake.clone();
        let (final_snake, filter_failed) = match self.run_filters(snake) {
            Ok(s) => (s, false),
            Err((filter, source)) => match self.config.filter_policy {
                FilterErrorPolicy::StoreSegmented => {
                    warn!(
                        "frame {}: filter `{filter}` failed for snake {}: {source}; keeping unfiltered contour",
                        budget.frame,
                        snake.id()
                    );
                    (segmented.clone(), true)
                }
                FilterErrorPolicy::AbortFrame => {
                    return Err(Failure::Fatal(SegmentationError::FilterFailed {
                        frame: budget.frame,
                        handler: HandlerId(snake.id()),
                        filter,
                        source,
                    }));
                }
            },
        };

        Ok(Finished {
            outcome,
            iterations,
            segmented,
            final_snake,
            filter_failed,
        })
    }

    fn iterate<S>(
        &self,
        snake: &mut Snake,
        sampler: &S,
        rng: &mut SmallRng,
        budget: &Budget<'_>,
    ) -> Result<(IterationOutcome, usize), Failure>
    where
        S: IntensitySampler + Sync + ?Sized,
    {
        let params = &self.config.params;
        for i in 0..params.max_iterations {
            budget.check()?;

            if i % params.cut_every == 0 {
                cut_loops(snake, params)?;
            }
            if i % RESAMPLE_EVERY == 0 && i > 0 {
                resample(snake, params, true, rng)?;
            }
            let converged = constrict(snake, sampler, params)?;

            if snake.count() * 100 / snake.starting_node_count().max(1) > params.nmax {
                if params.reuse_previous {
                    return Err(Failure::Fatal(SegmentationError::ConvergenceFailure {
                        frame: budget.frame,
                    }));
                }
                return Ok((IterationOutcome::NodeLimit, i + 1));
            }
            if converged {
                return Ok((IterationOutcome::Converged, i + 1));
            }
        }
        Ok((IterationOutcome::IterationCap, params.max_iterations))
    }

    fn run_filters(&self, snake: &Snake) -> Result<Snake, (String, FilterError)> {
        if self.filters.is_empty() {
            return Ok(snake.clone());
        }

        let mut points = snake.as_polygon();
        for f in &self.filters {
            points = f.apply(&points).map_err(|e| (f.name().to_string(), e))?;
        }
        Snake::from_points(snake.id(), &points, snake.orientation()).map_err(|e| {
            (
                "filter chain".to_string(),
                FilterError::new(format!("filtered contour rejected: {e}")),
            )
        })
    }
}

/// Mixes the run seed, handler and frame into one stream seed, so results
/// do not depend on evaluation order.
fn stream_seed(seed: u64, handler: u64, frame: usize) -> u64 {
    let mut z = seed
        ^ handler.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (frame as u64).wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cc_core::{BorderMode, BorderedView, Image, Point2d};
    use cc_snake::SegParams;

    use super::{IterationOutcome, Segmenter, SegmenterConfig, stream_seed};
    use crate::filter::{FilterError, FilterErrorPolicy, MovingAverage};
    use crate::handler::{FrameState, HandlerState};
    use crate::{Nest, SegmentationError, Seed};

    const SIZE: usize = 160;

    fn two_disks() -> Image<u8> {
        let centers = [Point2d::new(45.0, 80.0), Point2d::new(115.0, 80.0)];
        Image::from_fn(SIZE, SIZE, |x, y| {
            let p = Point2d::new(x as f64, y as f64);
            let t = centers
                .iter()
                .map(|&c| ((22.0 - p.dist(c)) / 4.0).clamp(0.0, 1.0))
                .fold(0.0, f64::max);
            (20.0 + 180.0 * t).round() as u8
        })
    }

    fn nest_for_two_disks() -> Nest {
        let mut nest = Nest::new();
        for c in [Point2d::new(45.0, 80.0), Point2d::new(115.0, 80.0)] {
            nest.add_handler(
                Seed::Ellipse {
                    center: c,
                    rx: 26.0,
                    ry: 26.0,
                },
                0,
            );
        }
        nest
    }

    fn config() -> SegmenterConfig {
        SegmenterConfig {
            params: SegParams {
                vel_crit: 0.01,
                blowup: 5.0,
                ..SegParams::default()
            },
            seed: 42,
            ..SegmenterConfig::default()
        }
    }

    #[test]
    fn segments_two_cells_over_frames() {
        let img = two_disks();
        let seg = Segmenter::new(config()).expect("valid config");
        let mut nest = nest_for_two_disks();

        let report = seg
            .segment_range(&mut nest, 0..2, |_| {
                BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty")
            })
            .expect("frames segment");

        assert_eq!(report.frames.len(), 2);
        for frame in &report.frames {
            assert_eq!(frame.finalized(), 2);
            for h in &frame.handlers {
                assert!(h.nodes >= 3);
                assert_ne!(h.outcome, Some(IterationOutcome::NodeLimit));
            }
        }

        for (h, c) in nest
            .handlers()
            .iter()
            .zip([Point2d::new(45.0, 80.0), Point2d::new(115.0, 80.0)])
        {
            assert_eq!(h.end_frame(), Some(1));
            assert_eq!(h.frame_state(), Some(FrameState::Finalized));
            let s = h.final_snake(1).expect("stored");
            assert!(s.centroid().dist(c) < 4.0, "centroid {:?}", s.centroid());
            let poly = s.as_polygon();
            let r = poly.iter().map(|p| p.dist(c)).sum::<f64>() / poly.len() as f64;
            assert!(r > 15.0 && r < 35.0, "radius {r}");
        }
    }

    #[test]
    fn serial_and_parallel_runs_match() {
        let img = two_disks();
        let run = |parallel: bool| {
            let seg = Segmenter::new(SegmenterConfig {
                parallel,
                ..config()
            })
            .expect("valid config");
            let mut nest = nest_for_two_disks();
            let view = BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty");
            seg.segment_frame(&mut nest, 0, &view).expect("frame segments");
            nest.handlers()
                .iter()
                .map(|h| h.final_polygon(0).expect("stored"))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(false), run(true));
    }

    #[test]
    fn collapsed_seed_kills_handler_and_keeps_others() {
        let img = two_disks();
        let view = BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty");
        let seg = Segmenter::new(config()).expect("valid config");
        let mut nest = nest_for_two_disks();
        let bad = nest.add_handler(
            Seed::Polygon(vec![Point2d::new(0.0, 0.0), Point2d::new(1.0, 1.0)]),
            0,
        );

        let report = seg.segment_frame(&mut nest, 0, &view).expect("others survive");

        assert_eq!(report.finalized(), 2);
        assert_eq!(report.died(), 1);
        let h = nest.get(bad).expect("retained for bookkeeping");
        assert_eq!(h.state(), HandlerState::Dead { frame: 0 });
        assert!(h.final_snake(0).is_none());

        // Dead handlers sit out later frames.
        let report = seg.segment_frame(&mut nest, 1, &view).expect("others survive");
        assert_eq!(report.handlers.len(), 2);
        assert_eq!(nest.alive_count(), 2);
    }

    #[test]
    fn all_dead_is_fatal() {
        let view = |_x: i32, _y: i32| -> u8 { 0 };
        let seg = Segmenter::new(config()).expect("valid config");
        let mut nest = Nest::new();
        nest.add_handler(Seed::Polygon(vec![]), 0);

        let err = seg.segment_frame(&mut nest, 3, &view).expect_err("nothing alive");
        assert!(matches!(err, SegmentationError::AllSnakesDead { frame: 3 }));
    }

    #[test]
    fn filter_failure_policies() {
        let img = two_disks();
        let view = BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty");
        let failing = |_: &[Point2d]| -> Result<Vec<Point2d>, FilterError> {
            Err(FilterError::new("boom"))
        };

        let seg = Segmenter::new(config()).expect("valid config").with_filter(failing);
        let mut nest = nest_for_two_disks();
        let report = seg.segment_frame(&mut nest, 0, &view).expect("policy keeps frame");
        assert!(report.handlers.iter().all(|h| h.filter_failed));
        for h in nest.handlers() {
            assert_eq!(h.final_polygon(0), h.segmented(0).map(|s| s.as_polygon()));
        }

        let seg = Segmenter::new(SegmenterConfig {
            filter_policy: FilterErrorPolicy::AbortFrame,
            ..config()
        })
        .expect("valid config")
        .with_filter(failing);
        let mut nest = nest_for_two_disks();
        let err = seg.segment_frame(&mut nest, 0, &view).expect_err("frame aborts");
        assert!(matches!(err, SegmentationError::FilterFailed { frame: 0, .. }));
        assert!(nest.handlers().iter().all(|h| h.final_snake(0).is_none()));
    }

    #[test]
    fn filters_shape_the_final_contour() {
        let img = two_disks();
        let view = BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty");
        let seg = Segmenter::new(config())
            .expect("valid config")
            .with_filter(MovingAverage { half_window: 1 });
        let mut nest = nest_for_two_disks();

        seg.segment_frame(&mut nest, 0, &view).expect("frame segments");

        for h in nest.handlers() {
            let seg_poly = h.segmented(0).expect("stored").as_polygon();
            let fin_poly = h.final_polygon(0).expect("stored");
            assert_eq!(seg_poly.len(), fin_poly.len());
            assert_ne!(seg_poly, fin_poly);
        }
    }

    #[test]
    fn cancellation_aborts_without_storing() {
        let img = two_disks();
        let view = BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty");
        let seg = Segmenter::new(config()).expect("valid config");
        seg.cancel_token().cancel();
        let mut nest = nest_for_two_disks();

        let err = seg.segment_frame(&mut nest, 0, &view).expect_err("cancelled");
        assert!(matches!(err, SegmentationError::Cancelled { frame: 0 }));
        assert!(nest.handlers().iter().all(|h| h.end_frame().is_none()));

        let seg = Segmenter::new(SegmenterConfig {
            time_limit: Some(Duration::ZERO),
            ..config()
        })
        .expect("valid config");
        let err = seg.segment_frame(&mut nest, 0, &view).expect_err("out of time");
        assert!(matches!(err, SegmentationError::Cancelled { .. }));
    }

    #[test]
    fn node_limit_stops_early_without_reuse() {
        let img = Image::from_fn(SIZE, SIZE, |x, y| {
            let d = Point2d::new(x as f64, y as f64).dist(Point2d::new(80.0, 80.0));
            (20.0 + 180.0 * ((62.0 - d) / 4.0).clamp(0.0, 1.0)).round() as u8
        });
        let view = BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty");
        // Growing from the imploded circle to the disk edge needs far more
        // than 250% of the seed's 6 nodes.
        let params = SegParams {
            expand_snake: true,
            reuse_previous: false,
            nmax: 250,
            vel_crit: 0.01,
            ..SegParams::default()
        };
        let seg = Segmenter::new(SegmenterConfig {
            params: params.clone(),
            ..config()
        })
        .expect("valid config");
        let mut nest = Nest::new();
        nest.add_handler(
            Seed::Ellipse {
                center: Point2d::new(80.0, 80.0),
                rx: 10.0,
                ry: 10.0,
            },
            0,
        );

        let report = seg.segment_frame(&mut nest, 0, &view).expect("early stop is accepted");
        assert_eq!(report.handlers[0].outcome, Some(IterationOutcome::NodeLimit));
        assert_eq!(report.finalized(), 1);

        let seg = Segmenter::new(SegmenterConfig {
            params: SegParams {
                reuse_previous: true,
                ..params
            },
            ..config()
        })
        .expect("valid config");
        let err = seg.segment_frame(&mut nest, 0, &view).expect_err("limit is fatal");
        assert!(matches!(err, SegmentationError::ConvergenceFailure { frame: 0 }));
    }

    #[test]
    fn expanding_with_defaults_fills_a_large_disk() {
        let c = Point2d::new(80.0, 80.0);
        let img = Image::from_fn(SIZE, SIZE, |x, y| {
            let d = Point2d::new(x as f64, y as f64).dist(c);
            (20.0 + 180.0 * ((42.0 - d) / 4.0).clamp(0.0, 1.0)).round() as u8
        });
        let view = BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty");
        let seg = Segmenter::new(SegmenterConfig {
            params: SegParams {
                expand_snake: true,
                ..SegParams::default()
            },
            seed: 42,
            ..SegmenterConfig::default()
        })
        .expect("valid config");
        let mut nest = Nest::new();
        nest.add_handler(
            Seed::Ellipse {
                center: c,
                rx: 40.0,
                ry: 40.0,
            },
            0,
        );

        let report = seg.segment_frame(&mut nest, 0, &view).expect("frame segments");

        assert_eq!(report.handlers[0].outcome, Some(IterationOutcome::Converged));
        assert_eq!(report.finalized(), 1);
        // Node limit is measured against the 21-node seed, not the imploded circle.
        assert!(report.handlers[0].nodes > 20, "{} nodes", report.handlers[0].nodes);
        let poly = nest.handlers()[0].final_polygon(0).expect("stored");
        let r = poly.iter().map(|p| p.dist(c)).sum::<f64>() / poly.len() as f64;
        assert!(r > 31.5 && r < 34.5, "radius {r}");
    }

    #[test]
    fn invalid_params_are_rejected_up_front() {
        let err = Segmenter::new(SegmenterConfig {
            params: SegParams {
                delta_t: 0.0,
                ..SegParams::default()
            },
            ..SegmenterConfig::default()
        })
        .err()
        .expect("rejected");
        assert!(matches!(err, SegmentationError::InvalidParams(_)));
    }

    #[test]
    fn stream_seeds_differ_per_handler_and_frame() {
        assert_ne!(stream_seed(1, 0, 0), stream_seed(1, 1, 0));
        assert_ne!(stream_seed(1, 0, 0), stream_seed(1, 0, 1));
        assert_eq!(stream_seed(9, 4, 2), stream_seed(9, 4, 2));
    }
}

use crate::classify::{RowClassifier, RowKind};
use crate::config::{PlacementConfig, DEFAULT_SCREEN_HEIGHT};
use crate::geom::{Point, Rect};
use crate::input::{InputDriver, InputError};
use crate::planner::PlacementPlanner;
use crate::scroll::{visible_rows, ViewportScroller};
use crate::vision::{load_template, VisionError, VisionProvider};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("anchor template not found: {}", .0.display())]
    AnchorTemplateMissing(PathBuf),
    #[error(
        "could not find anchor on screen. Make sure the object browser is visible and matches the template screenshot"
    )]
    AnchorNotFound,
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to write dry-run trace: {0}")]
    Trace(#[from] io::Error),
    #[error("stop requested")]
    Stopped,
}

#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Out-of-band request to stop, checked before every pointer action and
/// able to cut a settle delay short.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<StopState>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.lock() = true;
        self.0.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.lock()
    }

    /// Block for `duration` or until stopped. Returns true if stopped.
    pub fn wait(&self, duration: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .0
            .wake
            .wait_timeout_while(guard, duration, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn checkpoint(stop: &StopFlag) -> Result<(), RunError> {
    if stop.is_stopped() {
        return Err(RunError::Stopped);
    }
    Ok(())
}

fn settle(stop: &StopFlag, delay: Duration) -> Result<(), RunError> {
    if stop.wait(delay) {
        return Err(RunError::Stopped);
    }
    Ok(())
}

/// What the engine drives. A dry run touches neither screen nor pointer.
pub enum Devices<'a> {
    Live {
        vision: &'a dyn VisionProvider,
        input: &'a mut dyn InputDriver,
    },
    DryRun,
}

/// Geometry fixed once before the loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Layout {
    pub anchor: Rect,
    pub list_start: Point,
    pub screen_height: i32,
    pub visible_rows: u32,
    pub origin: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    LimitReached,
    EndOfList,
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub placed: u32,
    pub rows_visited: u64,
    pub categories_skipped: u64,
    pub missing_skipped: u64,
    pub scroll_rows: u64,
    pub dry_run: bool,
    pub layout: Layout,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct IterationState {
    index: u64,
    placed: u32,
    categories: u64,
    missing: u64,
    miss_streak: u32,
}

pub fn resolve_layout(cfg: &PlacementConfig, devices: &Devices<'_>) -> Result<Layout, RunError> {
    let (anchor, origin, screen_height) = match devices {
        Devices::DryRun => (
            Rect::default(),
            cfg.origin.unwrap_or_default(),
            cfg.screen_height.unwrap_or(DEFAULT_SCREEN_HEIGHT),
        ),
        Devices::Live { vision, input } => {
            let anchor = locate_anchor(*vision, cfg)?;
            let origin = match cfg.origin {
                Some(origin) => origin,
                None => input.pointer_position()?,
            };
            let screen_height = match cfg.screen_height {
                Some(h) => h,
                None => detect_screen_height(*vision),
            };
            (anchor, origin, screen_height)
        }
    };

    let list_start = anchor.top_left().offset(cfg.list_offset_x, cfg.list_offset_y);
    Ok(Layout {
        anchor,
        list_start,
        screen_height,
        visible_rows: visible_rows(screen_height, list_start.y, cfg.row_height),
        origin,
    })
}

fn locate_anchor(vision: &dyn VisionProvider, cfg: &PlacementConfig) -> Result<Rect, RunError> {
    if !cfg.anchor_template.exists() {
        return Err(RunError::AnchorTemplateMissing(cfg.anchor_template.clone()));
    }
    let template = load_template(&cfg.anchor_template)?;
    let anchor = vision
        .find_on_screen(&template, cfg.confidence)?
        .ok_or(RunError::AnchorNotFound)?;
    info!(?anchor, "anchor located");
    Ok(anchor)
}

fn detect_screen_height(vision: &dyn VisionProvider) -> i32 {
    match vision.screen_size() {
        Ok((_, h)) => i32::try_from(h).unwrap_or(DEFAULT_SCREEN_HEIGHT),
        Err(err) => {
            warn!(error = %err, "screen size unavailable, assuming {DEFAULT_SCREEN_HEIGHT}px");
            DEFAULT_SCREEN_HEIGHT
        }
    }
}

/// Resolve the layout, then walk the list until the limit, the optional
/// end-of-list sentinel, or an interruption ends the run.
pub fn run(
    cfg: &PlacementConfig,
    mut devices: Devices<'_>,
    stop: &StopFlag,
    trace: &mut dyn Write,
) -> Result<RunReport, RunError> {
    let started_at = Utc::now();
    let layout = resolve_layout(cfg, &devices)?;
    info!(
        list_start = %layout.list_start,
        visible_rows = layout.visible_rows,
        origin = %layout.origin,
        dry_run = cfg.dry_run,
        "layout resolved"
    );

    let mut scroller = ViewportScroller::new(
        layout.list_start,
        cfg.row_height,
        layout.visible_rows,
        cfg.scroll_clicks_per_row,
    );
    let mut state = IterationState::default();
    let result = iterate(
        cfg,
        &layout,
        &mut devices,
        &mut scroller,
        &mut state,
        stop,
        trace,
    );
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(RunError::Stopped) => Outcome::Interrupted,
        Err(RunError::Input(InputError::FailSafe(at))) => {
            warn!(%at, "fail-safe triggered");
            Outcome::Interrupted
        }
        Err(err) => return Err(err),
    };
    if outcome == Outcome::Interrupted {
        warn!(placed = state.placed, "run interrupted");
    }

    Ok(RunReport {
        outcome,
        placed: state.placed,
        rows_visited: state.index,
        categories_skipped: state.categories,
        missing_skipped: state.missing,
        scroll_rows: scroller.consumed(),
        dry_run: matches!(devices, Devices::DryRun),
        layout,
        started_at,
        finished_at: Utc::now(),
    })
}

fn iterate(
    cfg: &PlacementConfig,
    layout: &Layout,
    devices: &mut Devices<'_>,
    scroller: &mut ViewportScroller,
    state: &mut IterationState,
    stop: &StopFlag,
    trace: &mut dyn Write,
) -> Result<Outcome, RunError> {
    let classifier = RowClassifier::new(cfg);
    let planner = PlacementPlanner::new(layout.origin, cfg.spacing, cfg.per_row);

    loop {
        if cfg.limit.is_some_and(|limit| state.placed >= limit) {
            return Ok(Outcome::LimitReached);
        }
        checkpoint(stop)?;

        let view = scroller.ensure_visible(state.index);
        if let Some(scroll) = view.scroll {
            debug!(
                rows = scroll.rows,
                amount = scroll.amount,
                capacity = scroller.capacity(),
                "scrolling list"
            );
            if let Devices::Live { input, .. } = devices {
                checkpoint(stop)?;
                input.scroll(scroll.amount, scroll.at)?;
                settle(stop, cfg.scroll_delay)?;
            }
        }
        let row = view.position;

        if let Devices::Live { vision, .. } = devices {
            match classifier.classify(*vision, row) {
                RowKind::Category => {
                    debug!(index = state.index, "category row");
                    state.categories += 1;
                    state.miss_streak = 0;
                    state.index += 1;
                    continue;
                }
                RowKind::MissingItemSignal => {
                    warn!(
                        "skipping row {}: item color not detected at {}",
                        state.index, row
                    );
                    state.missing += 1;
                    state.miss_streak += 1;
                    state.index += 1;
                    if cfg.stop_after_misses.is_some_and(|n| state.miss_streak >= n) {
                        info!(streak = state.miss_streak, "no items left, treating as end of list");
                        return Ok(Outcome::EndOfList);
                    }
                    continue;
                }
                RowKind::Valid => state.miss_streak = 0,
            }
        }

        let world = planner.position_for(state.placed);
        match devices {
            Devices::DryRun => {
                writeln!(trace, "Would click list entry at {row} and place at {world}")?;
                state.placed += 1;
                state.index += 1;
            }
            Devices::Live { input, .. } => {
                checkpoint(stop)?;
                input.move_to(row)?;
                checkpoint(stop)?;
                input.click()?;
                settle(stop, cfg.click_delay)?;
                input.move_to(world)?;
                checkpoint(stop)?;
                input.click()?;
                debug!(
                    index = state.index,
                    slot = view.row_in_view,
                    %row,
                    %world,
                    "placed"
                );
                state.placed += 1;
                state.index += 1;
                settle(stop, cfg.place_delay)?;
            }
        }
    }
}

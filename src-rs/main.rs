mod classify;
mod config;
mod engine;
mod geom;
mod input;
mod logging;
mod planner;
mod scroll;
#[cfg(test)]
mod testing;
mod vision;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use config::{point_pair, rgb_triple, seconds, ColorProbe, PlacementConfig};
use engine::{Devices, Outcome, RunReport, StopFlag};
use input::EnigoDriver;
use logging::LogArgs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use vision::ScreenVision;

#[derive(Parser, Debug)]
#[command(
    name = "object-placer",
    version,
    about = "Click through an editor's object list and place every entry on a grid"
)]
struct Cli {
    /// Cropped screenshot of a stable element at the top of the object list (PNG recommended)
    anchor_template: PathBuf,
    /// Pixel height of each list entry
    #[arg(long, default_value_t = 26)]
    row_height: i32,
    /// Pixels from the anchor's left edge to the first entry
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    list_offset_x: i32,
    /// Pixels from the anchor's top edge to the first entry
    #[arg(long, default_value_t = 40, allow_negative_numbers = true)]
    list_offset_y: i32,
    /// Screen height in pixels (default: detected, 1080 if detection fails)
    #[arg(long)]
    screen_height: Option<i32>,
    /// Pixel spacing between placed objects
    #[arg(long, default_value_t = 120)]
    spacing_pixels: i32,
    /// Objects to place before wrapping to the next grid row
    #[arg(long, default_value_t = 15)]
    per_row: u32,
    /// Maximum number of objects to place (default: run until interrupted)
    #[arg(long)]
    limit: Option<u32>,
    /// Seconds between selecting an entry and placing it
    #[arg(long, default_value_t = 0.05, allow_negative_numbers = true)]
    click_delay: f64,
    /// Seconds to let the UI settle after placing an object
    #[arg(long, default_value_t = 0.1, allow_negative_numbers = true)]
    place_delay: f64,
    /// Mouse wheel clicks that move the list by one row
    #[arg(long, default_value_t = 3)]
    scroll_clicks_per_row: i32,
    /// Seconds to let the list redraw after scrolling
    #[arg(long, default_value_t = 0.15, allow_negative_numbers = true)]
    scroll_delay: f64,
    /// Template matching confidence for finding the anchor (0..1)
    #[arg(long, default_value_t = 0.9)]
    confidence: f32,
    /// Screen coordinates of the first placement (default: pointer position at start)
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    origin: Option<Vec<i32>>,
    /// RGB of the category icon; rows showing it are skipped
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"])]
    category_color: Option<Vec<u8>>,
    /// Per-channel tolerance for the category icon color
    #[arg(long, default_value_t = 8)]
    category_tolerance: u8,
    /// Horizontal offset from the entry label to the category icon pixel
    #[arg(long, default_value_t = -14, allow_negative_numbers = true)]
    category_offset_x: i32,
    /// RGB expected on placeable rows
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"], default_values_t = [142u8, 125, 18])]
    item_color: Vec<u8>,
    /// Per-channel tolerance for the item color
    #[arg(long, default_value_t = 10)]
    item_color_tolerance: u8,
    /// Horizontal offset from the entry label to the item color pixel
    #[arg(long, default_value_t = 26, allow_negative_numbers = true)]
    item_offset_x: i32,
    /// Vertical offset from the row top to the item color pixel
    #[arg(long, default_value_t = 12, allow_negative_numbers = true)]
    item_offset_y: i32,
    /// Click rows even when the item color is not detected
    #[arg(long, action = ArgAction::SetTrue)]
    allow_missing_item_color: bool,
    /// Stop after this many consecutive rows without the item color
    #[arg(long)]
    stop_after_misses: Option<u32>,
    /// Keep going when the pointer is parked in a screen corner
    #[arg(long, action = ArgAction::SetTrue)]
    no_failsafe: bool,
    /// Print planned clicks instead of moving the mouse
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Print the run report JSON to stdout when finished
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    #[command(flatten)]
    log: LogArgs,
}

fn main() {
    match run() {
        Ok(Outcome::Interrupted) => {
            eprintln!("Interrupted by user. Exiting cleanly.");
            std::process::exit(1);
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<Outcome> {
    let cli = Cli::parse();
    logging::init(&cli.log);

    let cfg = build_config(&cli)?;
    let stop = StopFlag::new();
    watch_ctrl_c(stop.clone());

    let stdout = io::stdout();
    let mut trace = stdout.lock();
    let report = if cfg.dry_run {
        engine::run(&cfg, Devices::DryRun, &stop, &mut trace)?
    } else {
        let vision = ScreenVision::primary().context("failed to open the screen for capture")?;
        let mut input = EnigoDriver::new(cfg.failsafe)
            .context("failed to take control of the pointer; check accessibility permissions")?;
        let devices = Devices::Live {
            vision: &vision,
            input: &mut input,
        };
        engine::run(&cfg, devices, &stop, &mut trace)?
    };

    log_report(&report);
    if cli.json {
        writeln!(trace, "{}", serde_json::to_string(&report)?)?;
    }
    Ok(report.outcome)
}

fn build_config(cli: &Cli) -> Result<PlacementConfig> {
    let mut cfg = PlacementConfig::new(cli.anchor_template.clone());
    cfg.row_height = cli.row_height;
    cfg.list_offset_x = cli.list_offset_x;
    cfg.list_offset_y = cli.list_offset_y;
    cfg.screen_height = cli.screen_height;
    cfg.spacing = cli.spacing_pixels;
    cfg.per_row = cli.per_row;
    cfg.limit = cli.limit;
    cfg.click_delay = seconds("click-delay", cli.click_delay)?;
    cfg.place_delay = seconds("place-delay", cli.place_delay)?;
    cfg.scroll_clicks_per_row = cli.scroll_clicks_per_row;
    cfg.scroll_delay = seconds("scroll-delay", cli.scroll_delay)?;
    cfg.confidence = cli.confidence;
    cfg.origin = cli
        .origin
        .as_deref()
        .map(|v| point_pair("origin", v))
        .transpose()?;
    cfg.category = cli
        .category_color
        .as_deref()
        .map(|v| rgb_triple("category-color", v))
        .transpose()?
        .map(|color| ColorProbe {
            color,
            tolerance: cli.category_tolerance,
            offset_x: cli.category_offset_x,
            offset_y: 0,
        });
    cfg.item = Some(ColorProbe {
        color: rgb_triple("item-color", &cli.item_color)?,
        tolerance: cli.item_color_tolerance,
        offset_x: cli.item_offset_x,
        offset_y: cli.item_offset_y,
    });
    cfg.require_item_color = !cli.allow_missing_item_color;
    cfg.stop_after_misses = cli.stop_after_misses;
    cfg.failsafe = !cli.no_failsafe;
    cfg.dry_run = cli.dry_run;
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

/// The first Ctrl-C raises the stop flag so the engine halts before its next
/// pointer action and reports progress. A second one exits immediately, which
/// covers a capture or template search that never returns.
fn watch_ctrl_c(stop: StopFlag) {
    let spawned = thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(err) => {
                    tracing::warn!(error = %err, "Ctrl-C handling unavailable");
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                stop.stop();
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Interrupted by user. Exiting cleanly.");
                    std::process::exit(1);
                }
            });
        });
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "failed to spawn Ctrl-C watcher");
    }
}

fn log_report(report: &RunReport) {
    tracing::info!(
        outcome = ?report.outcome,
        placed = report.placed,
        rows_visited = report.rows_visited,
        categories_skipped = report.categories_skipped,
        missing_skipped = report.missing_skipped,
        scroll_rows = report.scroll_rows,
        "run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point, Rgb};
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["object-placer"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_stock_layout() {
        let cfg = build_config(&parse(&["anchor.png"])).unwrap();
        assert_eq!(cfg.anchor_template, PathBuf::from("anchor.png"));
        assert_eq!(cfg.row_height, 26);
        assert_eq!((cfg.list_offset_x, cfg.list_offset_y), (10, 40));
        assert_eq!(cfg.spacing, 120);
        assert_eq!(cfg.per_row, 15);
        assert_eq!(cfg.click_delay, Duration::from_millis(50));
        assert_eq!(cfg.category, None);
        assert_eq!(cfg.item.map(|p| p.color), Some(Rgb(142, 125, 18)));
        assert!(cfg.require_item_color);
        assert!(cfg.failsafe);
        assert!(!cfg.dry_run);
        assert_eq!(cfg.limit, None);
    }

    #[test]
    fn parses_colors_origin_and_switches() {
        let cli = parse(&[
            "anchor.png",
            "--category-color",
            "200",
            "190",
            "180",
            "--category-offset-x",
            "-20",
            "--origin",
            "-100",
            "250",
            "--limit",
            "5",
            "--allow-missing-item-color",
            "--no-failsafe",
            "--dry-run",
        ]);
        let cfg = build_config(&cli).unwrap();
        let category = cfg.category.unwrap();
        assert_eq!(category.color, Rgb(200, 190, 180));
        assert_eq!(category.offset_x, -20);
        assert_eq!(category.tolerance, 8);
        assert_eq!(cfg.origin, Some(Point::new(-100, 250)));
        assert_eq!(cfg.limit, Some(5));
        assert!(!cfg.require_item_color);
        assert!(cfg.required_item_probe().is_none());
        assert!(!cfg.failsafe);
        assert!(cfg.dry_run);
    }

    #[test]
    fn rejects_invalid_tunables() {
        assert!(build_config(&parse(&["anchor.png", "--confidence", "1.2"])).is_err());
        assert!(build_config(&parse(&["anchor.png", "--per-row", "0"])).is_err());
        assert!(build_config(&parse(&["anchor.png", "--click-delay", "-0.5"])).is_err());
    }

    #[test]
    fn anchor_path_is_required() {
        assert!(Cli::try_parse_from(["object-placer"]).is_err());
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use cell_contour::{
    BorderedView, FilterErrorPolicy, HandlerId, Image, MovingAverage, Nest, Point2d, RunReport,
    SegParams, Seed, Segmenter, SegmenterConfig,
};
use clap::{Args, Parser, Subcommand};
use image::{GrayImage, Rgb, RgbImage};
use log::info;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cc_gallery")]
#[command(about = "Segment and track cells in image sequences with active contours")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Segment a sequence of PNG frames from seed contours
    #[command(name = "segment")]
    Segment(SegmentArgs),
    /// Render a synthetic sequence of drifting cells with matching seeds
    #[command(name = "synth")]
    Synth(SynthArgs),
    /// Write the default parameter set as JSON
    #[command(name = "params")]
    Params(ParamsArgs),
}

#[derive(Args, Debug, Clone)]
struct SegmentArgs {
    /// Frames in sequence order
    #[arg(long, required = true, num_args = 1..)]
    frames: Vec<PathBuf>,
    #[arg(long, required = true)]
    seeds: PathBuf,
    /// Parameter overrides; missing fields keep their defaults
    #[arg(long)]
    params: Option<PathBuf>,
    #[arg(long, default_value = "out/segment")]
    out: PathBuf,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long)]
    parallel: bool,
    /// Half window of a moving-average filter applied to final contours
    #[arg(long)]
    smooth: Option<usize>,
    /// Fail the frame instead of keeping the unfiltered contour
    #[arg(long)]
    strict_filters: bool,
    #[arg(long)]
    time_limit_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
struct SynthArgs {
    #[arg(long, default_value = "out/synth")]
    out: PathBuf,
    #[arg(long, default_value_t = 4)]
    frames: usize,
    #[arg(long, default_value_t = 3)]
    cells: usize,
    #[arg(long, default_value_t = 22.0)]
    radius: f64,
    /// Per-frame drift in pixels
    #[arg(long, default_value_t = 1.5)]
    drift: f64,
}

#[derive(Args, Debug, Clone)]
struct ParamsArgs {
    #[arg(long, default_value = "params.json")]
    out: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeedEntry {
    #[serde(default)]
    start_frame: usize,
    seed: Seed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeedsFile {
    seeds: Vec<SeedEntry>,
}

#[derive(Debug, Clone, Serialize)]
struct ContourDto {
    handler: HandlerId,
    frame: usize,
    area: f64,
    centroid: Point2d,
    points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize)]
struct MetaSegment {
    frames: usize,
    handlers: usize,
    alive: usize,
    seed: u64,
    parallel: bool,
    smooth: Option<usize>,
    filter_policy: FilterErrorPolicy,
    elapsed_ms: f64,
    params: SegParams,
    report: RunReport,
}

#[derive(Debug, Clone, Serialize)]
struct CellTruth {
    center: Point2d,
    radius: f64,
}

#[derive(Debug, Clone, Serialize)]
struct SynthTruth {
    width: usize,
    height: usize,
    frames: Vec<Vec<CellTruth>>,
}

const PALETTE: [Rgb<u8>; 6] = [
    Rgb([255, 64, 64]),
    Rgb([64, 200, 64]),
    Rgb([64, 128, 255]),
    Rgb([255, 200, 0]),
    Rgb([200, 64, 255]),
    Rgb([0, 220, 220]),
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Segment(args) => run_segment(args),
        Command::Synth(args) => run_synth(args),
        Command::Params(args) => run_params(args),
    }
}

fn run_segment(args: SegmentArgs) -> Result<()> {
    ensure_file_exists(&args.seeds, "seeds")?;
    let seeds: SeedsFile = read_json(&args.seeds)?;
    if seeds.seeds.is_empty() {
        bail!("seeds file {} lists no seeds.", args.seeds.display());
    }

    let params = match &args.params {
        Some(path) => {
            ensure_file_exists(path, "params")?;
            read_json::<SegParams>(path)?
        }
        None => SegParams::default(),
    };

    let frames = args
        .frames
        .iter()
        .map(|p| load_input_u8(p))
        .collect::<Result<Vec<_>>>()?;
    for (i, f) in frames.iter().enumerate().skip(1) {
        if (f.width(), f.height()) != (frames[0].width(), frames[0].height()) {
            bail!(
                "frame {i} is {}x{}, expected {}x{}.",
                f.width(),
                f.height(),
                frames[0].width(),
                frames[0].height()
            );
        }
    }
    let views = frames
        .iter()
        .map(|f| BorderedView::new(f.as_view(), params.border))
        .collect::<Result<Vec<_>, _>>()
        .context("wrapping frames for sampling")?;

    let filter_policy = if args.strict_filters {
        FilterErrorPolicy::AbortFrame
    } else {
        FilterErrorPolicy::StoreSegmented
    };
    let mut segmenter = Segmenter::new(SegmenterConfig {
        params: params.clone(),
        seed: args.seed,
        filter_policy,
        parallel: args.parallel,
        time_limit: args.time_limit_ms.map(Duration::from_millis),
    })
    .context("validating segmentation parameters")?;
    if let Some(half_window) = args.smooth {
        segmenter.push_filter(Box::new(MovingAverage { half_window }));
    }

    let mut nest = Nest::new();
    for entry in seeds.seeds {
        if entry.start_frame >= frames.len() {
            bail!(
                "seed starts at frame {} but only {} frames were given.",
                entry.start_frame,
                frames.len()
            );
        }
        nest.add_handler(entry.seed, entry.start_frame);
    }

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;

    let started = Instant::now();
    let report = segmenter
        .segment_range(&mut nest, 0..frames.len(), |f| views[f].clone())
        .context("segmenting sequence")?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;

    let mut contours = Vec::new();
    for (frame, img) in frames.iter().enumerate() {
        let mut rgb = to_rgb(img)?;
        for h in nest.handlers() {
            let Some(snake) = h.final_snake(frame) else {
                continue;
            };
            let poly = snake.as_polygon();
            draw_polygon(&mut rgb, &poly, PALETTE[h.id().0 as usize % PALETTE.len()]);
            contours.push(ContourDto {
                handler: h.id(),
                frame,
                area: snake.ring().signed_area().abs(),
                centroid: snake.centroid(),
                points: poly.iter().map(|p| [p.x, p.y]).collect(),
            });
        }
        let path = args.out.join(format!("overlay_{frame:03}.png"));
        rgb.save(&path)
            .with_context(|| format!("saving image {}", path.display()))?;
    }
    info!(
        "wrote {} contours over {} frames to {}",
        contours.len(),
        frames.len(),
        args.out.display()
    );

    write_json(args.out.join("contours.json"), &contours)?;
    write_json(
        args.out.join("meta.json"),
        &MetaSegment {
            frames: frames.len(),
            handlers: nest.len(),
            alive: nest.alive_count(),
            seed: args.seed,
            parallel: args.parallel,
            smooth: args.smooth,
            filter_policy,
            elapsed_ms,
            params,
            report,
        },
    )?;

    Ok(())
}

fn run_synth(args: SynthArgs) -> Result<()> {
    if args.frames == 0 || args.cells == 0 {
        bail!("synth needs at least one frame and one cell.");
    }

    let pitch = (3.0 * args.radius).ceil() as usize;
    let width = pitch * (args.cells + 1) + (args.drift * args.frames as f64).ceil() as usize;
    let height = 2 * pitch;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;

    let mut truth = SynthTruth {
        width,
        height,
        frames: Vec::with_capacity(args.frames),
    };
    for frame in 0..args.frames {
        let cells: Vec<CellTruth> = (0..args.cells)
            .map(|i| {
                // Stagger rows so neighbours are not collinear.
                let dy = if i % 2 == 0 { -0.2 } else { 0.2 } * args.radius;
                CellTruth {
                    center: Point2d::new(
                        ((i + 1) * pitch) as f64 + frame as f64 * args.drift,
                        pitch as f64 + dy,
                    ),
                    radius: args.radius,
                }
            })
            .collect();

        let img = render_cells(width, height, &cells);
        save_u8_image(args.out.join(format!("frame_{frame:03}.png")), &img)?;
        truth.frames.push(cells);
    }

    let seeds = SeedsFile {
        seeds: truth.frames[0]
            .iter()
            .map(|c| SeedEntry {
                start_frame: 0,
                seed: Seed::Ellipse {
                    center: c.center,
                    rx: c.radius + 6.0,
                    ry: c.radius + 3.0,
                },
            })
            .collect(),
    };
    write_json(args.out.join("seeds.json"), &seeds)?;
    write_json(args.out.join("truth.json"), &truth)?;
    info!(
        "rendered {} frames of {} cells ({}x{}) to {}",
        args.frames,
        args.cells,
        width,
        height,
        args.out.display()
    );

    Ok(())
}

fn run_params(args: ParamsArgs) -> Result<()> {
    if let Some(dir) = args.out.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    write_json(args.out, &SegParams::default())
}

fn render_cells(width: usize, height: usize, cells: &[CellTruth]) -> Image<u8> {
    Image::from_fn(width, height, |x, y| -> u8 {
        let p = Point2d::new(x as f64, y as f64);
        let t = cells
            .iter()
            .map(|c| ((c.radius + 2.0 - p.dist(c.center)) / 4.0).clamp(0.0, 1.0))
            .fold(0.0, f64::max);
        (20.0 + t * 180.0).round() as u8
    })
}

fn load_input_u8(path: &Path) -> Result<Image<u8>> {
    let dyn_img =
        image::open(path).with_context(|| format!("opening input image {}", path.display()))?;
    let luma = dyn_img.to_luma8();
    let (w, h) = luma.dimensions();
    let data = luma.into_raw();

    Image::from_vec(w as usize, h as usize, data)
        .with_context(|| format!("constructing cc-core image from {}", path.display()))
}

fn save_u8_image(path: PathBuf, img: &Image<u8>) -> Result<()> {
    let gray = GrayImage::from_raw(img.width() as u32, img.height() as u32, img.data().to_vec())
        .context("constructing GrayImage from raw bytes")?;
    gray.save(&path)
        .with_context(|| format!("saving image {}", path.display()))
}

fn to_rgb(img: &Image<u8>) -> Result<RgbImage> {
    let gray = GrayImage::from_raw(img.width() as u32, img.height() as u32, img.data().to_vec())
        .context("constructing GrayImage from raw bytes")?;
    Ok(image::DynamicImage::ImageLuma8(gray).to_rgb8())
}

fn write_json(path: PathBuf, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(&path, bytes).with_context(|| format!("writing json {}", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing json {}", path.display()))
}

fn draw_polygon(img: &mut RgbImage, poly: &[Point2d], color: Rgb<u8>) {
    let n = poly.len();
    for i in 0..n {
        let (a, b) = (poly[i], poly[(i + 1) % n]);
        let steps = a.dist(b).ceil().max(1.0) as usize;
        for s in 0..=steps {
            let t = s as f64 / steps as f64;
            put_pixel(img, a.x + t * (b.x - a.x), a.y + t * (b.y - a.y), color);
        }
    }
    for p in poly {
        draw_dot(img, p.x, p.y, color);
    }
}

fn put_pixel(img: &mut RgbImage, x: f64, y: f64, color: Rgb<u8>) {
    let (xi, yi) = (x.round() as i64, y.round() as i64);
    if xi < 0 || yi < 0 || xi >= img.width() as i64 || yi >= img.height() as i64 {
        return;
    }
    img.put_pixel(xi as u32, yi as u32, color);
}

fn draw_dot(img: &mut RgbImage, x: f64, y: f64, color: Rgb<u8>) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            put_pixel(img, x + dx as f64, y + dy as f64, color);
        }
    }
}

fn ensure_file_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} file does not exist: {}", what, path.display());
    }
    if !path.is_file() {
        bail!("{} path is not a file: {}", what, path.display());
    }
    Ok(())
}

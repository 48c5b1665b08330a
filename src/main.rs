use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use env_logger::Env;

use labelshift::batch::{discover_images, overlay_path, run_batch};
use labelshift::debug::DebugConfig;
use labelshift::receiver::{ImageStore, receive_into};
use labelshift::report::{self, ReportFormat};
use labelshift::{Calibration, LabelMeter, Measurement, compare, load_image, overlay};

#[derive(Parser)]
#[command(name = "labelshift")]
#[command(about = "Measure label displacement and rotation between photographs")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CalibrationArgs {
    /// Physical length of the label's top edge in centimeters
    #[arg(long, value_name = "CM")]
    edge_length_cm: f64,
}

#[derive(Subcommand)]
enum Command {
    /// Measure the label's top edge in one image
    Measure {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[command(flatten)]
        calibration: CalibrationArgs,

        /// Save intermediate images to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },

    /// Compare a current image against a reference image
    Compare {
        #[arg(value_name = "REFERENCE")]
        reference: PathBuf,

        #[arg(value_name = "CURRENT")]
        current: PathBuf,

        #[command(flatten)]
        calibration: CalibrationArgs,

        /// Write annotated copies of both images to this directory
        #[arg(long, value_name = "DIR")]
        overlay_dir: Option<PathBuf>,
    },

    /// Compare every image of a directory against the first one (sorted by name)
    Batch {
        #[arg(value_name = "DIR")]
        input_dir: PathBuf,

        #[command(flatten)]
        calibration: CalibrationArgs,

        /// Directory for the report and overlays
        #[arg(long, value_name = "DIR", default_value = "out")]
        out_dir: PathBuf,

        /// Also write an annotated copy of every image
        #[arg(long)]
        overlays: bool,

        #[arg(long, value_enum, default_value_t = ReportFormat::Csv)]
        format: ReportFormat,

        /// Worker threads (default: one per core)
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Receive length-prefixed images from a TCP address or a device/file path
    Receive {
        /// `host:port` or a path
        #[arg(long, value_name = "SOURCE")]
        source: String,

        /// Root directory for the dated image folders
        #[arg(long, value_name = "DIR", default_value = ".")]
        dest: PathBuf,
    },
}

fn meter_for(args: &CalibrationArgs) -> anyhow::Result<LabelMeter> {
    Ok(LabelMeter::new(Calibration::new(args.edge_length_cm)?))
}

fn print_measurement(name: &str, m: &Measurement) {
    println!("{}:", name);
    println!("  method:       {}", m.method);
    println!("  left:         ({:.2}, {:.2})", m.edge.left().x, m.edge.left().y);
    println!("  right:        ({:.2}, {:.2})", m.edge.right().x, m.edge.right().y);
    println!("  angle:        {:+.4} deg", m.angle_deg());
    println!("  length:       {:.3} px", m.pixel_length);
    println!("  scale:        {:.4} px/cm", m.pixels_per_cm);
}

fn run_measure(image_path: &Path, meter: &LabelMeter, debug_out: Option<PathBuf>) -> anyhow::Result<()> {
    let debug = debug_out.map(DebugConfig::new).transpose()?;
    let img = load_image(image_path)?;
    let inspection = meter.inspect(&img)?;

    if let Some(debug) = &debug {
        let name = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        debug.save_inspection(&name, &img, &inspection)?;
    }

    print_measurement(&image_path.display().to_string(), &inspection.measurement);
    Ok(())
}

fn run_compare(
    reference: &Path,
    current: &Path,
    meter: &LabelMeter,
    overlay_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let ref_img = load_image(reference)?;
    let cur_img = load_image(current)?;
    let ref_m = meter.measure(&ref_img)?;
    let cur_m = meter.measure(&cur_img)?;

    if let Some(dir) = overlay_dir {
        overlay::save_overlay(&ref_img, &ref_m, &overlay_path(dir, reference))?;
        overlay::save_overlay(&cur_img, &cur_m, &overlay_path(dir, current))?;
    }

    let r = compare(&ref_m, &cur_m);
    println!("\n=== {} ===", labelshift::batch::pair_label(reference, current));
    println!("Center offset:  {}", report::format_mm_px(r.offset_center_mm, r.offset_center_px));
    println!("Rotation delta: {}", report::format_deg(r.rotation_delta_deg));
    println!("Left corner:    {}", report::format_mm_px(r.left_offset_mm, r.left_offset_px));
    println!("Right corner:   {}", report::format_mm_px(r.right_offset_mm, r.right_offset_px));
    println!("Left absolute:  {}", report::format_point(r.current_left_abs));
    println!("Right absolute: {}", report::format_point(r.current_right_abs));
    println!("1px in cm:      {}", report::format_factor(r.cm_per_pixel));
    Ok(())
}

fn run_batch_command(
    input_dir: &Path,
    meter: &LabelMeter,
    out_dir: &Path,
    overlays: bool,
    format: ReportFormat,
    jobs: Option<usize>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let files = discover_images(input_dir)?;
    log::info!("Found {} images in {}", files.len(), input_dir.display());

    let overlay_dir = overlays.then_some(out_dir);
    let report = match jobs {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()?
            .install(|| run_batch(meter, &files, overlay_dir))?,
        None => run_batch(meter, &files, overlay_dir)?,
    };

    let report_path = out_dir.join(format.file_name());
    report::write_report(&report_path, &report, format)?;

    println!("Report: {}", report_path.display());
    println!("Images: {}", report.image_count());
    if report.failures() > 0 {
        println!("Failed comparisons: {}", report.failures());
    }
    println!("Total duration [s]: {:.3}", start.elapsed().as_secs_f64());
    Ok(())
}

async fn run_receive(source: &str, dest: &Path) -> anyhow::Result<()> {
    let store = ImageStore::new(dest);
    let saved = if Path::new(source).exists() {
        log::info!("Reading frames from {}", source);
        let file = tokio::fs::File::open(source).await?;
        receive_into(file, &store).await?
    } else {
        log::info!("Connecting to {}", source);
        let stream = tokio::net::TcpStream::connect(source).await?;
        receive_into(stream, &store).await?
    };
    println!("Received {} image(s) into {}", saved, store.root().display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    match args.command {
        Command::Measure {
            image_path,
            calibration,
            debug_out,
        } => run_measure(&image_path, &meter_for(&calibration)?, debug_out),
        Command::Compare {
            reference,
            current,
            calibration,
            overlay_dir,
        } => run_compare(&reference, &current, &meter_for(&calibration)?, overlay_dir.as_deref()),
        Command::Batch {
            input_dir,
            calibration,
            out_dir,
            overlays,
            format,
            jobs,
        } => run_batch_command(&input_dir, &meter_for(&calibration)?, &out_dir, overlays, format, jobs),
        Command::Receive { source, dest } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_receive(&source, &dest))
        }
    }
}

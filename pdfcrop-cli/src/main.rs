use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::debug;
use pdfcrop::{CropReport, CropSummary, Error, Margins, crop_file};

#[derive(Parser, Debug)]
#[command(
    name = "crop",
    version,
    about = "Crop PDF pages by removing margins from all four sides.",
    long_about = "Crop PDF pages by removing margins from all four sides.\n\n\
        Margins are specified in points (1/72 inch). If the right margin is not \
        specified it defaults to the left margin; if the bottom margin is not \
        specified it defaults to the top margin.\n\n\
        The result is written next to the input as <name>_cropped.<ext>."
)]
struct Args {
    /// Path to the PDF file to crop
    file: PathBuf,

    /// Left margin to remove (in points)
    #[arg(allow_negative_numbers = true)]
    left: f64,

    /// Top margin to remove (in points)
    #[arg(allow_negative_numbers = true)]
    top: f64,

    /// Right margin to remove (defaults to left margin)
    #[arg(allow_negative_numbers = true)]
    right: Option<f64>,

    /// Bottom margin to remove (defaults to top margin)
    #[arg(allow_negative_numbers = true)]
    bottom: Option<f64>,

    /// Do not print per-page sizes
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn margins(&self) -> Margins {
        Margins {
            left: self.left,
            top: self.top,
            right: self.right,
            bottom: self.bottom,
        }
    }
}

fn print_report(report: &CropReport) {
    if report.page_index == 0 {
        println!("Processing {} pages...", report.page_count);
    }
    let page = report.page_index + 1;
    println!(
        "Page {}: Original size {:?}x{:?} points",
        page,
        report.original.width(),
        report.original.height()
    );
    println!(
        "Page {}: Cropped size {:?}x{:?} points",
        page,
        report.cropped.width(),
        report.cropped.height()
    );
}

fn run(args: &Args) -> Result<CropSummary, Error> {
    let quiet = args.quiet;
    let summary = crop_file(&args.file, &args.margins(), |report| {
        if !quiet {
            print_report(report);
        }
    })?;
    debug!("cropped {} pages of {}", summary.pages.len(), args.file.display());
    if summary.pages.is_empty() && !quiet {
        println!("Processing 0 pages...");
    }
    Ok(summary)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // Help and version requests are not failures.
            return if err.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    match run(&args) {
        Ok(summary) => {
            println!("Successfully cropped PDF saved as: {}", summary.output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

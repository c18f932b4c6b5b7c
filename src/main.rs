use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use window_lens::app::{self, AppContext, ScanArgs};
use window_lens::layout::SurfaceSize;

#[derive(Parser, Debug)]
#[command(
    name = "window-lens",
    version,
    about = "Recognize the text of a window and lay it out as an overlay"
)]
struct Cli {
    /// Extra settings file, applied last
    #[arg(short = 'r', long = "settings", global = true)]
    settings: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the capture worker on stdin/stdout
    Worker,
    /// Pick a window and print the selection
    Pick,
    /// Scan a window and print the overlay layout
    Scan(ScanCli),
    /// Read pick/scan/quit commands from the terminal
    Interactive,
}

#[derive(Args, Debug)]
struct ScanCli {
    /// Recognition language (repeatable, e.g. -l en-US -l ja-JP)
    #[arg(short = 'l', long = "lang")]
    lang: Vec<String>,

    /// Also save the capture as PNG here
    #[arg(long = "save-to")]
    save_to: Option<PathBuf>,

    /// Write the overlay as .svg or .png
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Overlay surface width (defaults to the window width)
    #[arg(long = "width", requires = "height")]
    width: Option<f64>,

    /// Overlay surface height (defaults to the window height)
    #[arg(long = "height", requires = "width")]
    height: Option<f64>,

    /// Draw the capture under the text in --out
    #[arg(long = "with-capture")]
    with_capture: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    window_lens::logging::init(cli.verbose)?;
    let ctx = AppContext::load(cli.settings, cli.verbose)?;

    match cli.command {
        Commands::Worker => app::run_worker(ctx.settings()).await,
        Commands::Pick => app::run_pick(&ctx).await,
        Commands::Scan(scan) => {
            let surface = match (scan.width, scan.height) {
                (Some(width), Some(height)) => Some(SurfaceSize::new(width, height)),
                _ => None,
            };
            app::run_scan(
                &ctx,
                ScanArgs {
                    languages: scan.lang,
                    save_to: scan.save_to,
                    out: scan.out,
                    surface,
                    with_capture: scan.with_capture,
                },
            )
            .await
        }
        Commands::Interactive => app::run_interactive(&ctx).await,
    }
}

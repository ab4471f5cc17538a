mod driver;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use panorig_capture::{
    controller_for, CaptureOrchestrator, CommandInjector, ScriptGenerator, ScriptSettings,
};
use panorig_core::{CancelToken, RunConfig, SystemClock};
use panorig_stitch::{FfmpegRunner, ToolRunner};

use crate::driver::{clean_store, Driver};

#[derive(Parser)]
#[command(
    name = "panorig",
    version,
    about = "panorig: capture a camera rig from a rendering host and stitch a panorama",
    long_about = "panorig drives a rendering host with no scripting API through one capture per\ncamera face, then stitches the faces into a single equirectangular video."
)]
struct Cli {
    /// Path to the run configuration
    #[arg(long, global = true, default_value = "panorig.toml")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture every face, then stitch
    Run {
        /// Stitch what is already in the temp dir
        #[arg(long)]
        skip_capture: bool,

        /// Continue with the next face when one fails
        #[arg(long)]
        keep_going: bool,

        /// Empty the temp dir before capturing
        #[arg(long)]
        clean: bool,
    },

    /// Capture faces without stitching
    Capture {
        /// Face to capture (repeatable; default: all)
        #[arg(long = "face")]
        faces: Vec<String>,

        /// Continue with the next face when one fails
        #[arg(long)]
        keep_going: bool,
    },

    /// Stitch the captured faces into the output video
    Stitch,

    /// List the rig's faces and their projection angles
    Faces {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the control script generated for one face
    Script {
        /// Face name
        #[arg(long)]
        face: String,

        /// Also write it to the host's config directory
        #[arg(long)]
        write: bool,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => cmd_init(&cli.config, force),
        Commands::Faces { json } => cmd_faces(&load_config(&cli.config)?, json),
        Commands::Script { face, write } => cmd_script(&load_config(&cli.config)?, &face, write),
        Commands::Stitch => cmd_stitch(load_config(&cli.config)?),
        Commands::Capture { faces, keep_going } => {
            cmd_capture(load_config(&cli.config)?, &faces, keep_going)
        }
        Commands::Run {
            skip_capture,
            keep_going,
            clean,
        } => cmd_run(load_config(&cli.config)?, skip_capture, keep_going, clean),
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        anyhow::bail!(
            "config file not found: {} (create one with `panorig init`)",
            path.display()
        );
    }
    RunConfig::load_from_file(path)
        .with_context(|| format!("failed to load config: {}", path.display()))
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
    }
    RunConfig::default()
        .save_to_file(path)
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    println!("✓ Wrote {}", path.display());
    println!("  Set [host] root and executable, then run `panorig faces` to check the rig.");
    Ok(())
}

#[derive(Serialize)]
struct FaceRow<'a> {
    name: &'a str,
    pitch: f64,
    yaw: f64,
    roll: f64,
    projection_pitch: f64,
    projection_yaw: f64,
    host_pitch: f64,
}

fn cmd_faces(config: &RunConfig, json: bool) -> Result<()> {
    let rig = config.rig().context("invalid rig configuration")?;
    let model = config.angle_model();
    let rows: Vec<FaceRow> = rig
        .faces()
        .iter()
        .map(|f| {
            let p = model.to_projection(f.pitch(), f.yaw());
            FaceRow {
                name: f.name(),
                pitch: f.pitch(),
                yaw: f.yaw(),
                roll: f.roll(),
                projection_pitch: p.pitch,
                projection_yaw: p.yaw,
                host_pitch: model.to_host_pitch(f.pitch()),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let (width, height) = config.output_size();
    println!(
        "{} faces, fov {}°, output {}x{}",
        rows.len(),
        config.rig.field_of_view,
        width,
        height
    );
    println!(
        "{:<10} {:>8} {:>8} {:>10} {:>10}",
        "face", "pitch", "yaw", "proj pitch", "proj yaw"
    );
    for row in &rows {
        println!(
            "{:<10} {:>8.2} {:>8.2} {:>10.2} {:>10.2}",
            row.name, row.pitch, row.yaw, row.projection_pitch, row.projection_yaw
        );
    }
    Ok(())
}

fn cmd_script(config: &RunConfig, face: &str, write: bool) -> Result<()> {
    let rig = config.rig().context("invalid rig configuration")?;
    let face = rig.require(face)?;
    let script = ScriptGenerator::new(ScriptSettings::from_config(config)).generate(face);
    print!("{}", script.render());
    if write {
        let path = script.write_to(&config.host.script_dir())?;
        eprintln!("✓ Wrote {}", path.display());
    }
    Ok(())
}

fn ffmpeg_runner(config: &RunConfig) -> Result<Arc<dyn ToolRunner>> {
    let runner = FfmpegRunner::new(&config.stitch.ffmpeg_bin);
    if !runner.is_available() {
        anyhow::bail!(
            "ffmpeg not found at '{}'. Install FFmpeg: https://ffmpeg.org/download.html",
            runner.bin().display()
        );
    }
    Ok(Arc::new(runner))
}

fn orchestrator(config: &RunConfig, cancel: &CancelToken) -> Result<CaptureOrchestrator> {
    config
        .check_host_paths()
        .context("host installation check failed")?;
    let host = controller_for(config)?;
    let input = CommandInjector::new(
        config.host.key_command.clone(),
        config.host.click_command.clone(),
    )?;
    Ok(CaptureOrchestrator::new(
        Arc::from(host),
        Arc::new(input),
        Arc::new(SystemClock::new()),
        config.paths.temp_dir.clone(),
    )
    .with_cancel(cancel.clone()))
}

fn cmd_capture(config: RunConfig, faces: &[String], keep_going: bool) -> Result<()> {
    let cancel = install_ctrl_c();
    let runner = ffmpeg_runner_if_needed(&config)?;
    let orchestrator = orchestrator(&config, &cancel)?;
    let driver = Driver::new(config, runner, cancel)?;
    let faces = driver.select_faces(faces)?;

    let start = Instant::now();
    println!("Capturing {} face(s)", faces.len());
    let summary = driver.capture(&orchestrator, &faces, keep_going)?;
    println!(
        "Captured {}/{} face(s) in {:.1}s",
        summary.captured.len(),
        faces.len(),
        start.elapsed().as_secs_f64()
    );
    if !summary.is_complete() {
        for (face, error) in &summary.failed {
            println!("  failed: {} ({})", face, error);
        }
        anyhow::bail!("{} face(s) failed", summary.failed.len());
    }
    Ok(())
}

fn cmd_stitch(config: RunConfig) -> Result<()> {
    let cancel = install_ctrl_c();
    let runner = ffmpeg_runner(&config)?;
    let driver = Driver::new(config, runner, cancel)?;
    stitch_and_report(&driver)
}

fn cmd_run(config: RunConfig, skip_capture: bool, keep_going: bool, clean: bool) -> Result<()> {
    let cancel = install_ctrl_c();
    let start = Instant::now();
    let runner = ffmpeg_runner(&config)?;

    if clean && !skip_capture {
        clean_store(&config.paths.temp_dir)?;
    }

    let orchestrator = if skip_capture {
        None
    } else {
        Some(orchestrator(&config, &cancel)?)
    };
    let driver = Driver::new(config, runner, cancel)?;

    if let Some(orchestrator) = &orchestrator {
        let faces = driver.select_faces(&[])?;
        println!("Capturing {} face(s)", faces.len());
        let summary = driver.capture(orchestrator, &faces, keep_going)?;
        for (face, error) in &summary.failed {
            println!("  failed: {} ({})", face, error);
        }
    }

    stitch_and_report(&driver)?;
    println!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn stitch_and_report(driver: &Driver) -> Result<()> {
    println!("Stitching {} face(s)", driver.rig().len());
    let report = driver.stitch()?;
    println!(
        "✓ {} ({}x{}, {}{})",
        report.output.display(),
        report.size.0,
        report.size.1,
        report.encoder.encoder,
        if report.encoder.fell_back {
            ", software fallback"
        } else {
            ""
        }
    );
    if report.audio_face.is_none() {
        println!("  (no audio track)");
    }
    Ok(())
}

/// The capture command only needs ffmpeg when frames are transcoded.
fn ffmpeg_runner_if_needed(config: &RunConfig) -> Result<Arc<dyn ToolRunner>> {
    if config.capture.transcode_to.is_some() {
        ffmpeg_runner(config)
    } else {
        Ok(Arc::new(FfmpegRunner::new(&config.stitch.ffmpeg_bin)))
    }
}

/// Cancel the returned token on ctrl-c. The listener runs on its own thread
/// with a single-threaded runtime; capture itself stays synchronous. A second
/// ctrl-c exits at once, skipping the host-config restore.
fn install_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    std::thread::spawn(move || {
        if let Err(e) = run_async(listen_for_interrupts(token)) {
            tracing::debug!(error = %e, "ctrl-c listener stopped");
        }
    });
    cancel
}

async fn listen_for_interrupts(token: CancelToken) -> Result<()> {
    loop {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        match on_interrupt(&token) {
            Interrupt::Cancel => tracing::warn!(
                "interrupt received; stopping after the current step (ctrl-c again to quit now)"
            ),
            Interrupt::ForceQuit => {
                tracing::error!("second interrupt; exiting immediately");
                std::process::exit(130);
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    Cancel,
    ForceQuit,
}

fn on_interrupt(token: &CancelToken) -> Interrupt {
    if token.is_cancelled() {
        Interrupt::ForceQuit
    } else {
        token.cancel();
        Interrupt::Cancel
    }
}

fn run_async<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;
    runtime.block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_interrupt_forces_quit() {
        let token = CancelToken::new();
        assert_eq!(on_interrupt(&token), Interrupt::Cancel);
        assert!(token.is_cancelled());
        assert_eq!(on_interrupt(&token), Interrupt::ForceQuit);
    }
}

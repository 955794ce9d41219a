//! CLI entry point for the MKV to MP4 conversion daemon.
//!
//! Parses command line arguments, assembles the configuration, and starts
//! the daemon. Settings are layered: built-in defaults, then the config
//! file, then `MKV2MP4_*` environment variables, then command line flags.

mod logging;

use clap::Parser;
use mkv2mp4_daemon::config::{Bitrate, Config, ConfigError, Preset, Profile, Resolution, Tune};
use mkv2mp4_daemon::{ConsoleReporter, Daemon, Reporter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Watches a directory tree and converts MKV files to streaming-ready MP4
#[derive(Parser, Debug)]
#[command(name = "mkv2mp4")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory tree to watch for MKV files
    path: PathBuf,

    /// Cap output resolution, e.g. "720p" or "1280x720" (default: keep source)
    #[arg(short, long)]
    resolution: Option<Resolution>,

    /// x264 encoder preset (default: medium)
    #[arg(short, long)]
    preset: Option<Preset>,

    /// x264 CRF quality, 0-51, lower is better (default: 23)
    #[arg(short = 'q', long, value_parser = clap::value_parser!(u8).range(0..=51))]
    crf: Option<u8>,

    /// H.264 profile (default: high)
    #[arg(long)]
    profile: Option<Profile>,

    /// x264 tune, e.g. "fastdecode" or "zerolatency"
    #[arg(long)]
    tune: Option<Tune>,

    /// Maximum video bitrate, e.g. "4M" (default: derived from resolution)
    #[arg(long)]
    maxrate: Option<Bitrate>,

    /// Rate control buffer size, e.g. "8M" (default: twice the max bitrate)
    #[arg(long)]
    bufsize: Option<Bitrate>,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve JSON statistics on this port (127.0.0.1)
    #[arg(long)]
    status_port: Option<u16>,

    /// Skip startup checks for ffmpeg and ffprobe
    #[arg(long, default_value = "false")]
    skip_checks: bool,
}

/// Layer the config file, environment, and flags into one Config.
fn build_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    let encoding = &mut config.encoding;
    if let Some(resolution) = args.resolution {
        encoding.resolution = Some(resolution);
    }
    if let Some(preset) = args.preset {
        encoding.preset = preset;
    }
    if let Some(crf) = args.crf {
        encoding.crf = crf;
    }
    if let Some(profile) = args.profile {
        encoding.profile = profile;
    }
    if let Some(tune) = args.tune {
        encoding.tune = Some(tune);
    }
    if let Some(maxrate) = args.maxrate {
        encoding.maxrate = Some(maxrate);
    }
    if let Some(bufsize) = args.bufsize {
        encoding.bufsize = Some(bufsize);
    }

    if let Some(port) = args.status_port {
        config.status.enabled = true;
        config.status.port = port;
    }

    config.validate()?;
    Ok(config)
}

fn print_banner(root: &Path, config: &Config) {
    println!(
        "Watching {} and all subdirectories for MKV files...",
        root.display()
    );
    println!();
    println!("Streaming Optimization Settings:");
    let encoding = &config.encoding;
    match &encoding.resolution {
        Some(resolution) => println!("  Target Resolution: {}", resolution),
        None => println!("  Target Resolution: Original"),
    }
    println!("  Preset: {}", encoding.preset);
    println!("  CRF: {}", encoding.crf);
    println!("  Profile: {}", encoding.profile);
    if let Some(tune) = &encoding.tune {
        println!("  Tune: {}", tune);
    }
    match &encoding.maxrate {
        Some(rate) => println!("  Max Bitrate: {}", rate),
        None => println!("  Max Bitrate: Auto (by resolution)"),
    }
    match &encoding.bufsize {
        Some(size) => println!("  Buffer Size: {}", size),
        None => println!("  Buffer Size: Auto (2x max bitrate)"),
    }
    if config.status.enabled {
        println!();
        println!(
            "Status endpoint: http://127.0.0.1:{}/status",
            config.status.port
        );
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if !args.path.is_dir() {
        eprintln!("Error: {} is not a directory", args.path.display());
        return ExitCode::FAILURE;
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = logging::init_logging(&args.path.join("logs"));

    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(args.path.clone()));
    let daemon_result = if args.skip_checks {
        tracing::warn!("skipping startup checks (--skip-checks enabled)");
        Daemon::new_without_checks(config.clone(), args.path.clone(), reporter)
    } else {
        Daemon::new(config.clone(), args.path.clone(), reporter)
    };

    match daemon_result {
        Ok(daemon) => {
            print_banner(&args.path, &config);

            if let Err(e) = daemon.run_with_server().await {
                eprintln!("Daemon error: {}", e);
                return ExitCode::FAILURE;
            }

            println!("Converter stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to start: {}", e);
            ExitCode::FAILURE
        }
    }
}

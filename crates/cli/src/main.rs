mod app;
mod config_cmd;
mod jobs_cmd;
mod output;
mod prompt;
mod scenes_cmd;
mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use scenewatch_api::ImageFormat;

use crate::app::App;

#[derive(Parser)]
#[command(
    name = "scenewatch",
    version,
    about = "SceneWatch CLI - upload videos, follow extraction, browse scenes"
)]
struct Cli {
    /// Override the configured server URL for this invocation
    #[arg(long, global = true)]
    server: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List jobs on the server
    Jobs,

    /// Show one job with its snapshots
    Show {
        job_id: String,
        /// Print snapshot image URLs
        #[arg(long)]
        urls: bool,
    },

    /// Follow a job until extraction finishes (defaults to the newest job)
    Watch { job_id: Option<String> },

    /// Upload a video and create a job
    New {
        /// Video file to upload
        video: PathBuf,
        /// Frames sampled per second of video
        #[arg(long, default_value_t = 1.0)]
        fps: f64,
        /// Resize frames to this width (0 keeps the original size)
        #[arg(long, default_value_t = 512)]
        resize_width: u32,
        #[arg(long)]
        grayscale: bool,
        #[arg(long)]
        black_white: bool,
        /// Snapshot image format (jpg or png)
        #[arg(long, default_value = "jpg")]
        format: ImageFormat,
        /// Start extraction right after the upload and follow it
        #[arg(long)]
        extract: bool,
    },

    /// Start extraction for a job
    Extract {
        job_id: String,
        /// Follow the job until extraction finishes
        #[arg(long)]
        watch: bool,
    },

    /// Delete a job with its snapshots and scenes
    Delete { job_id: String },

    /// List the scenes of a job
    Scenes { job_id: String },

    /// Segment a job into scenes
    BuildScenes { job_id: String },

    /// Show one scene with its keyframes
    Scene {
        job_id: String,
        scene_id: String,
        /// Number of keyframes to request
        #[arg(long)]
        keyframes: Option<usize>,
    },

    /// Generate a short description for a scene
    Describe { job_id: String, scene_id: String },

    /// Show or set configuration
    Config {
        /// Set the server URL
        #[arg(long = "set-server")]
        set_server: Option<String>,

        /// Set the request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Set the job poll interval in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Set the keyframes requested per scene
        #[arg(long)]
        keyframes: Option<usize>,

        /// Set the snapshot page size (0 clears it)
        #[arg(long)]
        snapshot_limit: Option<u32>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into())
                .add_directive(
                    "scenewatch=info"
                        .parse()
                        .unwrap_or_else(|_| tracing::Level::INFO.into()),
                ),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        server,
        yes,
        command,
    } = cli;
    let app = || App::load(server.clone(), yes);

    match command {
        Commands::Jobs => jobs_cmd::run_jobs(&app()?).await,
        Commands::Show { job_id, urls } => jobs_cmd::run_show(&app()?, &job_id, urls).await,
        Commands::Watch { job_id } => watch::run_watch(&app()?, job_id).await,
        Commands::New {
            video,
            fps,
            resize_width,
            grayscale,
            black_white,
            format,
            extract,
        } => {
            let options = jobs_cmd::NewJobOptions {
                fps,
                resize_width: (resize_width > 0).then_some(resize_width),
                grayscale,
                black_white,
                format,
                extract,
            };
            jobs_cmd::run_new(&app()?, &video, options).await
        }
        Commands::Extract { job_id, watch } => {
            jobs_cmd::run_extract(&app()?, &job_id, watch).await
        }
        Commands::Delete { job_id } => jobs_cmd::run_delete(&app()?, &job_id).await,
        Commands::Scenes { job_id } => scenes_cmd::run_scenes(&app()?, &job_id).await,
        Commands::BuildScenes { job_id } => {
            scenes_cmd::run_build_scenes(&app()?, &job_id).await
        }
        Commands::Scene {
            job_id,
            scene_id,
            keyframes,
        } => scenes_cmd::run_scene(&app()?, &job_id, &scene_id, keyframes).await,
        Commands::Describe { job_id, scene_id } => {
            scenes_cmd::run_describe(&app()?, &job_id, &scene_id).await
        }
        Commands::Config {
            set_server,
            timeout_secs,
            poll_interval_ms,
            keyframes,
            snapshot_limit,
        } => {
            let update = config_cmd::ConfigUpdate {
                server: set_server,
                timeout_secs,
                poll_interval_ms,
                keyframes,
                snapshot_limit,
            };
            if update.is_empty() {
                config_cmd::show_config()
            } else {
                config_cmd::set_config(update)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn new_accepts_image_format() {
        let cli = Cli::try_parse_from([
            "scenewatch",
            "new",
            "clip.mp4",
            "--format",
            "png",
            "--fps",
            "2",
            "--extract",
        ])
        .expect("parse args");
        match cli.command {
            Commands::New {
                format, fps, extract, ..
            } => {
                assert_eq!(format, ImageFormat::Png);
                assert_eq!(fps, 2.0);
                assert!(extract);
            }
            _ => panic!("expected new command"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["scenewatch", "delete", "abc", "--yes", "--server", "http://x"])
            .expect("parse args");
        assert!(cli.yes);
        assert_eq!(cli.server.as_deref(), Some("http://x"));
    }
}

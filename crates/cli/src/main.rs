use std::fs;
use std::io;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use liveview::{Client, ClientConfig, Frame, FrameSink, ReconnectPolicy};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "liveview",
    about = "Stream liveview JPEG frames from a camera",
    after_help = "Example: liveview http://192.168.122.1:8080 --output-dir frames"
)]
struct Args {
    /// Camera base URL
    url: String,

    /// Write every frame to DIR/frame-<n>.jpg
    #[arg(long, short)]
    output_dir: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long, short = 'n')]
    max_frames: Option<u64>,

    /// TCP connect timeout in seconds
    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,

    /// Treat a stream silent for this many seconds as broken (0 = never)
    #[arg(long, default_value_t = 10)]
    read_timeout_secs: u64,

    /// First reconnect delay in milliseconds
    #[arg(long, default_value_t = 250)]
    initial_backoff_ms: u64,

    /// Longest reconnect delay in milliseconds
    #[arg(long, default_value_t = 5000)]
    max_backoff_ms: u64,

    /// Give up after this many consecutive failed reconnects
    #[arg(long)]
    max_retries: Option<u32>,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            stream_read_timeout: (self.read_timeout_secs > 0)
                .then(|| Duration::from_secs(self.read_timeout_secs)),
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(self.initial_backoff_ms),
                max_delay: Duration::from_millis(self.max_backoff_ms),
                max_retries: self.max_retries,
                ..ReconnectPolicy::default()
            },
            ..ClientConfig::default()
        }
    }
}

/// Writes frames to disk, or just logs them.
struct Recorder {
    output_dir: Option<PathBuf>,
    max_frames: Option<u64>,
    count: u64,
}

impl FrameSink for Recorder {
    fn on_frame(&mut self, frame: Frame) -> ControlFlow<()> {
        self.count += 1;

        match &self.output_dir {
            Some(dir) => {
                let path = dir.join(format!("frame-{:06}.jpg", self.count));
                if let Err(e) = fs::write(&path, &frame.jpeg) {
                    tracing::error!(path = %path.display(), error = %e, "failed to write frame");
                    return ControlFlow::Break(());
                }
                tracing::debug!(path = %path.display(), size = frame.len(), "frame written");
            }
            None => {
                tracing::info!(
                    sequence = frame.sequence,
                    timestamp = frame.timestamp,
                    size = frame.len(),
                    "frame"
                );
            }
        }

        match self.max_frames {
            Some(max) if self.count >= max => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if let Some(dir) = &args.output_dir {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Failed to create {}: {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let mut client = match Client::start_with_config(&args.url, args.client_config()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to start liveview: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stop = client.stop_handle();
    thread::spawn(move || {
        let mut input = String::new();
        if matches!(io::stdin().read_line(&mut input), Ok(n) if n > 0) {
            stop.stop();
        }
    });

    println!("Streaming from {} (press Enter to stop)", client.url());

    let mut recorder = Recorder {
        output_dir: args.output_dir.clone(),
        max_frames: args.max_frames,
        count: 0,
    };
    let result = client.run(&mut recorder);

    client.stop();

    match result {
        Ok(()) => {
            println!("{} frames received", recorder.count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Liveview stream failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

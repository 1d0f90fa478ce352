use clap::Parser;
use focuskit::console::{self, ConsoleCommand, HELP};
use focuskit::settings::{default_config_path, Config};
use focuskit::{init_logging, App, StartOptions, BUILD_DATE, VERSION};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (.toml or .json); defaults to the user config dir
    #[arg(short, long, env = "FOCUSKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overridden per target by RUST_LOG
    #[arg(long, env = "FOCUSKIT_LOG")]
    log_level: Option<LevelFilter>,

    /// Replay images from this directory instead of a camera
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replay rate in frames per second
    #[arg(long, default_value = "10")]
    fps: f32,

    /// G-code program to load at startup
    #[arg(long)]
    gcode: Option<PathBuf>,

    /// Arm automation at startup
    #[arg(long)]
    enable: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level)?;
    tracing::info!("FocusKit {} (built {})", VERSION, BUILD_DATE);

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load_or_default(&default_config_path()?)?,
    };

    let app = App::start(
        &config,
        StartOptions {
            replay_dir: args.replay,
            replay_fps: args.fps,
            program: args.gcode,
            enable: args.enable,
        },
    )
    .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(line) = line else {
            break;
        };

        match console::parse(&line) {
            Ok(ConsoleCommand::Control(command)) => app.handle().send(command).await?,
            Ok(ConsoleCommand::Status) => println!("{}", app.handle().status().await?),
            Ok(ConsoleCommand::Help) => println!("{}", HELP),
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Nothing) => {}
            Err(e) => println!("{}", e),
        }
    }

    app.shutdown().await;
    Ok(())
}

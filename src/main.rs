use clap::Parser;
use logtap::print::PrintConsumer;
use logtap::{collect_logs, Config, DockerSource, FollowOptions, LogConsumer, LogProducer};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "logtap", about = "Follow a container's stdout and stderr")]
struct Cli {
    /// Container id or name.
    container: String,

    /// Docker daemon address, e.g. unix:///var/run/docker.sock or
    /// tcp://127.0.0.1:2375. Overrides the config file and DOCKER_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Print what the container has written so far and exit.
    #[arg(long)]
    no_follow: bool,

    /// Write debug logs to /tmp/logtap-debug.log (tail -f to inspect).
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/logtap-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("logtap debug log started — tail -f /tmp/logtap-debug.log");
    }

    let mut config = Config::load()?;
    if let Some(host) = cli.host {
        config.docker.host = host;
    }
    let source = DockerSource::from_config(&config.docker, &cli.container)?;

    if cli.no_follow {
        let printer = PrintConsumer::new();
        for record in collect_logs(&source, config.follow.max_frame_bytes).await? {
            printer.accept(&record);
        }
        return Ok(());
    }

    let producer = LogProducer::with_options(source, FollowOptions::from(&config));
    producer.follow_output(Arc::new(PrintConsumer::new()));
    producer.start().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut tick = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                break;
            }
            _ = tick.tick() => {
                if !producer.is_running().await {
                    break;
                }
            }
        }
    }

    producer.stop().await?;
    Ok(())
}

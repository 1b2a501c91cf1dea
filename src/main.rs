use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use log::{error, info, warn};
use ringscan::config::{load_config, ChannelConfig};
use ringscan::sources::open_source;
use ringscan::{ByteSource, Channel, Error};

/// Scan byte streams for delimited frames and print the fields they carry.
#[derive(Parser, Debug)]
#[command(name = "ringscan", version, about)]
struct Args {
    /// Path to the TOML config
    #[arg(short, long)]
    config: Option<String>,

    /// Only run the channel with this id (repeatable)
    #[arg(long = "channel", value_name = "ID")]
    channels: Vec<String>,

    /// Stop at end of input even for sources configured to loop
    #[arg(long)]
    once: bool,
}

fn get_config_path() -> String {
    if let Ok(home) = std::env::var("HOME") {
        format!("{}/.config/ringscan/config.toml", home)
    } else {
        "/etc/ringscan/config.toml".to_string()
    }
}

async fn run_channel(mut channel: Channel, source: Arc<dyn ByteSource>) -> Result<u64, Error> {
    channel
        .run(source.as_ref(), |frame| {
            for line in frame.render() {
                println!("{}", line);
            }
        })
        .await
}

async fn run(args: Args) -> Result<(), Error> {
    let config_path = args.config.clone().unwrap_or_else(get_config_path);
    let cfg = load_config(&config_path)?;

    let selected: Vec<ChannelConfig> = cfg
        .channels
        .into_iter()
        .filter(|c| args.channels.is_empty() || args.channels.contains(&c.id))
        .collect();
    if selected.is_empty() {
        warn!("No channels selected - exiting");
        return Ok(());
    }

    let mut tasks = Vec::with_capacity(selected.len());
    for channel_cfg in selected {
        let source = open_source(&channel_cfg.source, args.once).await?;
        let channel = Channel::new(channel_cfg)?;
        tasks.push(run_channel(channel, source));
    }

    let mut first_err = None;
    for res in join_all(tasks).await {
        match res {
            Ok(frames) => info!("Channel done after {} frames", frames),
            Err(e) => {
                error!("Channel failed: {}", e);
                first_err.get_or_insert(e);
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.to_status_code())
        }
    }
}

//! Telemetry Client CLI
//!
//! Command-line interface for the telemetry client:
//! - Run a write/read round against an in-process cluster
//! - Print the default configuration
//! - Decode binary frame files

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Mutex;
use telemetry_client::config::{generate_default_config, Config, LoggingConfig};
use telemetry_client::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "telemetry-client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Segment transport client for a time-series telemetry cluster")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write and read back synthetic data against an in-process cluster
    Demo {
        /// Seconds of data to write
        #[arg(short, long, default_value = "10")]
        seconds: u32,
        /// Sample rate of the rate-based channel (Hz)
        #[arg(short, long, default_value = "100")]
        rate: f64,
        /// Message encoding (json, msgpack); overrides the config
        #[arg(long)]
        codec: Option<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a binary frame file
    Inspect {
        /// Path to the frame
        path: PathBuf,
        /// Channel layout as key:type pairs, in frame order (e.g. 1:float64 2:timestamp)
        #[arg(required = true)]
        channels: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Demo {
            seconds,
            rate,
            codec,
        } => {
            let codec = match codec {
                Some(name) => Codec::parse(&name)
                    .with_context(|| format!("unknown codec {:?}", name))?,
                None => config.connection.codec,
            };
            demo(&config, codec, seconds, rate).await?;
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }

        Commands::Inspect { path, channels } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read frame file {:?}", path))?;
            let (keys, data_types) = parse_layout(&channels)?;
            let frame = FrameCodec::decode(&bytes, &keys, &data_types)?;

            println!("{} channels, {} samples, {} bytes", frame.len(), frame.sample_count(), bytes.len());
            for (key, series) in frame.iter() {
                println!(
                    "  channel {:>6}  {:<9}  {:>8} samples  {:>10} bytes",
                    key,
                    series.data_type().to_string(),
                    series.len(),
                    series.byte_len()
                );
            }
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("telemetry_client={}", config.level).into());

    let json = config.format == "json";
    let file_layer = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(file_layer)
        .init();
    Ok(())
}

/// Parse `key:type` pairs into index-aligned keys and data types
fn parse_layout(pairs: &[String]) -> anyhow::Result<(Vec<ChannelKey>, Vec<DataType>)> {
    let mut keys = Vec::with_capacity(pairs.len());
    let mut data_types = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Some((key, data_type)) = pair.split_once(':') else {
            bail!("expected key:type, got {:?}", pair);
        };
        keys.push(
            key.parse()
                .with_context(|| format!("invalid channel key {:?}", key))?,
        );
        data_types.push(
            DataType::parse(data_type)
                .with_context(|| format!("unknown data type {:?}", data_type))?,
        );
    }
    Ok((keys, data_types))
}

const TIME: ChannelKey = 1;
const PRESSURE: ChannelKey = 2;
const TEMP: ChannelKey = 3;

async fn demo(config: &Config, codec: Codec, seconds: u32, rate: f64) -> anyhow::Result<()> {
    tracing::info!("Telemetry client demo v{}", env!("CARGO_PKG_VERSION"));

    let cluster = LoopbackCluster::new(config.connection.address(), codec);
    cluster.create_channel(Channel::index(TIME, "time")).await?;
    cluster
        .create_channel(Channel::new(PRESSURE, "pressure", DataType::Float32).indexed_by(TIME))
        .await?;
    cluster
        .create_channel(Channel::new(TEMP, "temp", DataType::Float64).rate(Rate::hz(rate)))
        .await?;
    let channels = cluster.channels().await;

    // Write one segment per second for every channel. Index segments end 1ns
    // after their last stamp, so the next second starts after a gap.
    let writer_config = WriterConfig {
        allow_gap: true,
        ..config.writer.clone()
    };
    let mut writer = SegmentWriter::new(cluster.open_writer_stream()?, writer_config);
    writer.open(&channels, &[TIME, PRESSURE, TEMP]).await?;

    let period = Rate::hz(rate).period();
    let per_second = (TimeSpan::SECOND.0 / period.0.max(1)) as usize;
    let first = TimeStamp::now();
    let mut start = first;
    for second in 0..seconds {
        let stamps: Vec<TimeStamp> = (0..10).map(|i| start + TimeSpan::MILLISECOND * (i * 100)).collect();
        let pressure: Vec<f32> = (0..10).map(|i| 101.3 + (second * 10 + i) as f32 * 0.01).collect();
        let temp: Vec<f64> = (0..per_second).map(|i| 20.0 + (i as f64 / 10.0).sin()).collect();

        let frame = Frame::from_pairs(vec![
            (TIME, Series::new(stamps)),
            (PRESSURE, Series::new(pressure)),
        ])?;
        writer.write_frame(frame, start).await?;
        writer.write(TEMP, Series::new(temp), start).await?;
        start = writer.high_water_mark(TEMP).unwrap_or(start + TimeSpan::SECOND);
    }
    let end = writer.commit().await?;
    writer.close().await?;
    tracing::info!(end = %end, "committed {} seconds of data", seconds);

    // Read everything back in fixed chunks
    let mut iter = SegmentIterator::new(cluster.open_iterator_stream()?);
    let range = TimeRange::new(first, end)?;
    if !iter.open(&channels, &[TIME, PRESSURE, TEMP], range).await? {
        bail!("cluster reports no data in {}", range);
    }
    iter.seek_first().await?;
    let chunk = config.iterator.chunk_span();
    let mut chunks = 0;
    let mut samples = 0;
    while iter.next_span(chunk).await? {
        chunks += 1;
        samples += iter.value().iter().map(Segment::len).sum::<usize>();
    }
    iter.close().await?;
    println!("Read {} samples in {} chunks of {}", samples, chunks, chunk);

    let report = ConnectivityChecker::from_config(&config.clock)
        .check(&cluster)
        .await?;
    println!(
        "Clock skew against {}: {} over {} samples (threshold {}{})",
        report.address,
        report.skew,
        report.samples,
        report.threshold,
        if report.exceeded { ", EXCEEDED" } else { "" }
    );

    cluster.shutdown();
    Ok(())
}

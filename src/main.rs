use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sensor_stream::config::{Cli, Command};
use sensor_stream::device::{ChannelConfig, DeviceClient};
use sensor_stream::{
    dispatch, stream_samples, CsvSink, Exit, LogSink, OutputFormat, Sample, SampleSink,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sensor_stream=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None => run_stream(&cli).await,
        Some(Command::Config { channel, http_port }) => {
            let device = DeviceClient::new(&cli.device_url(http_port))?;
            let config = device
                .get_config(channel)
                .await
                .with_context(|| format!("reading config of channel {}", channel))?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Configure {
            channel,
            interval,
            buffer_size,
            disable,
            http_port,
        }) => {
            let device = DeviceClient::new(&cli.device_url(http_port))?;
            let config = ChannelConfig {
                sampling_interval: interval,
                buffer_size,
                sampling_enabled: !disable,
            };
            device
                .set_config(channel, &config)
                .await
                .with_context(|| format!("configuring channel {}", channel))?;
            tracing::info!(channel, ?config, "channel configured");
            Ok(())
        }
        Some(Command::Drain { channel, http_port }) => {
            let device = DeviceClient::new(&cli.device_url(http_port))?;
            let data = device
                .drain(channel)
                .await
                .with_context(|| format!("draining channel {}", channel))?;
            for sample in data.data {
                println!("{}", Sample::Raw(sample).to_csv_line());
            }
            Ok(())
        }
    }
}

async fn run_stream(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.stream_config()?;
    tracing::info!(url = %config.url, schema = ?config.schema, "streaming samples");

    let mut sink: Box<dyn SampleSink> = match cli.stream.output {
        OutputFormat::Csv => Box::new(CsvSink::new(std::io::stdout())),
        OutputFormat::Log => Box::new(LogSink),
    };

    let stream = stream_samples(config);
    let exit = if cli.stream.no_signals {
        dispatch(stream, sink.as_mut(), std::future::pending::<()>()).await?
    } else {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        dispatch(stream, sink.as_mut(), interrupt).await?
    };

    match exit {
        Exit::StreamClosed => tracing::info!("stream closed"),
        Exit::Interrupted => tracing::info!("interrupted"),
    }
    Ok(())
}

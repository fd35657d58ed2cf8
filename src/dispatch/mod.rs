//! Dispatch Module
//!
//! Consumer side of the sample stream. Waits on samples, stream errors and
//! a shutdown request, writes samples to a sink and reports how the stream
//! ended. Process exit is left to the caller.

use std::future::Future;
use std::io::{self, Write};

use clap::ValueEnum;
use thiserror::Error;

use crate::sample::Sample;
use crate::stream::{SampleStream, StreamError};

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("failed to write sample")]
    Output(#[from] io::Error),
}

/// How a dispatch run ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The reader finished without a fatal error.
    StreamClosed,
    /// Shutdown was requested and a close frame was sent.
    Interrupted,
}

/// Destination for decoded samples
pub trait SampleSink {
    fn emit(&mut self, sample: &Sample) -> io::Result<()>;
}

/// Writes one `channel, timestamp, value` line per sample
pub struct CsvSink<W: Write> {
    out: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        CsvSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SampleSink for CsvSink<W> {
    fn emit(&mut self, sample: &Sample) -> io::Result<()> {
        writeln!(self.out, "{}", sample.to_csv_line())?;
        self.out.flush()
    }
}

/// Logs the debug representation of each sample
pub struct LogSink;

impl SampleSink for LogSink {
    fn emit(&mut self, sample: &Sample) -> io::Result<()> {
        tracing::info!("{:?}", sample);
        Ok(())
    }
}

/// Output format selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Log,
}

/// Drive `stream` until it ends, fails, or `shutdown` resolves.
///
/// Samples already queued are emitted before a pending error or the end of
/// the stream is reported. Pass `std::future::pending::<()>()` to disable the
/// shutdown path.
pub async fn dispatch<S, F>(
    stream: SampleStream,
    sink: &mut S,
    shutdown: F,
) -> Result<Exit, DispatchError>
where
    S: SampleSink + ?Sized,
    F: Future<Output = ()>,
{
    let SampleStream {
        mut samples,
        mut errors,
        closer,
    } = stream;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                tracing::info!("interrupt received, closing connection");
                if let Err(e) = closer.close().await {
                    tracing::warn!(error = ?e, "could not close connection");
                }
                return Ok(Exit::Interrupted);
            }
            next = samples.recv() => match next {
                Some(sample) => sink.emit(&sample)?,
                // The reader queues its error before dropping the sample sender.
                None => {
                    return match errors.try_recv() {
                        Ok(e) => Err(e.into()),
                        Err(_) => Ok(Exit::StreamClosed),
                    };
                }
            },
            Some(e) = errors.recv() => return Err(e.into()),
        }
    }
}

//! Online receiver: binds a UDP port and streams decoded HEVC Annex B
//! NAL units into an elementary-stream file, printing periodic counters.
//!
//! Mirrors `h265_receiver.py`'s `H265StreamReceiver`: a background
//! receive task feeds a bounded channel, and a foreground loop
//! depacketizes and writes, periodically sweeping the fragment store and
//! logging counters.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::signal;

use hevc_rtp_depacketizer::sink::{ElementaryStreamSink, FileSink};
use hevc_rtp_depacketizer::source::UdpSource;
use hevc_rtp_depacketizer::{Depacketizer, DepacketizerConfig};

/// Receive an HEVC RTP stream and write it to an elementary-stream file.
#[derive(Parser, Debug)]
#[command(name = "hevc-recv")]
struct Args {
    /// UDP port to listen on.
    #[arg(short, long, default_value_t = 5004)]
    port: u16,

    /// Output HEVC elementary stream path.
    #[arg(short, long, default_value = "stream.hevc")]
    output: String,
}

const SWEEP_INTERVAL: Duration = Duration::from_millis(500);
const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("binding UDP receiver on port {}", args.port);
    let mut source = UdpSource::bind(args.port, 1000).await?;
    let mut sink = FileSink::create(&args.output).await?;
    let mut depacketizer = Depacketizer::new(DepacketizerConfig::default());

    let mut last_sweep = Instant::now();
    let mut last_stats = Instant::now();

    info!("receiver started on port {}, writing to {}", args.port, args.output);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutting down: {:?}", depacketizer.counters());
                break;
            }
            datagram = source.recv() => {
                let Some(datagram) = datagram else {
                    info!("receive task ended");
                    break;
                };

                match hevc_rtp_depacketizer::rtp::parse(&datagram.bytes) {
                    Ok(header) => {
                        if let Ok(nals) = depacketizer.depacketize(&header, datagram.received_at) {
                            for nal in &nals {
                                let framed = hevc_rtp_depacketizer::depacketizer::frame(nal);
                                sink.write_nal(&framed).await?;
                            }
                        }
                    }
                    Err(e) => {
                        log::debug!("dropping malformed datagram: {e}");
                        depacketizer.record_malformed_header();
                    }
                }

                let now = Instant::now();
                if now.duration_since(last_sweep) >= SWEEP_INTERVAL {
                    depacketizer.sweep(now);
                    last_sweep = now;
                }
                if now.duration_since(last_stats) >= STATS_INTERVAL {
                    info!("counters: {:?}", depacketizer.counters());
                    last_stats = now;
                }
            }
        }
    }

    Ok(())
}

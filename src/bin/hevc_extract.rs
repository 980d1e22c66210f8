//! Offline extractor: reads captured RTP datagrams and writes an HEVC
//! Annex B elementary stream.
//!
//! PCAP parsing and UDP-port filtering are external collaborators per the
//! core's scope (see the crate root docs): this binary does not link a
//! PCAP library. It instead reads a simple raw-datagram dump — each
//! record is a 4-byte little-endian length prefix followed by that many
//! bytes of UDP payload — which a PCAP-to-raw-dump converter upstream of
//! this tool is expected to produce. This mirrors `extract_h265.py`'s CLI
//! surface (`<pcap> -o <output> -p <port>`) without vendoring a PCAP
//! parser this crate has no real use for.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use hevc_rtp_depacketizer::sink::{ElementaryStreamSink, FileSink};
use hevc_rtp_depacketizer::source::{Datagram, MemorySource, PacketSource};
use hevc_rtp_depacketizer::{Depacketizer, DepacketizerConfig};

/// Extract an HEVC elementary stream from a raw RTP datagram dump.
#[derive(Parser, Debug)]
#[command(name = "hevc-extract")]
struct Args {
    /// Raw datagram dump (see module docs for the record format).
    dump: String,

    /// Output HEVC elementary stream path.
    #[arg(short, long, default_value = "stream.hevc")]
    output: String,

    /// RTP port the dump was filtered to (informational only here;
    /// real PCAP filtering happens upstream of this tool).
    #[arg(short, long, default_value_t = 5004)]
    port: u16,
}

fn read_dump(path: &str) -> Result<Vec<Datagram>> {
    let raw = std::fs::read(path).with_context(|| format!("reading dump file {path}"))?;
    let mut datagrams = Vec::new();
    let mut offset = 0;
    let now = Instant::now();

    while offset + 4 <= raw.len() {
        let len = u32::from_le_bytes(raw[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        if offset + len > raw.len() {
            break;
        }
        datagrams.push(Datagram {
            bytes: raw[offset..offset + len].to_vec(),
            received_at: now,
        });
        offset += len;
    }

    Ok(datagrams)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args).await {
        Ok(count) if count > 0 => ExitCode::SUCCESS,
        Ok(_) => {
            eprintln!("No HEVC NAL units found!");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<usize> {
    info!("reading dump {} (port {})", args.dump, args.port);
    let datagrams = read_dump(&args.dump)?;
    info!("loaded {} datagrams", datagrams.len());
    let mut source = MemorySource::new(datagrams);

    let mut depacketizer = Depacketizer::new(DepacketizerConfig::default());
    let mut sink = FileSink::create(&args.output).await?;
    let mut nal_count = 0usize;

    while let Some(datagram) = source.next_datagram() {
        let header = match hevc_rtp_depacketizer::rtp::parse(&datagram.bytes) {
            Ok(header) => header,
            Err(e) => {
                log::debug!("dropping malformed datagram: {e}");
                depacketizer.record_malformed_header();
                continue;
            }
        };

        let nals = match depacketizer.depacketize(&header, datagram.received_at) {
            Ok(nals) => nals,
            Err(e) => {
                log::debug!("dropping datagram: {e}");
                continue;
            }
        };

        for nal in &nals {
            let framed = hevc_rtp_depacketizer::depacketizer::frame(nal);
            sink.write_nal(&framed).await?;
            nal_count += 1;
        }
    }

    let counters = depacketizer.counters();
    info!(
        "extracted {} NAL units from {} packets ({} orphan fragments, {} malformed headers)",
        nal_count, counters.packets_seen, counters.orphan_fragments, counters.malformed_headers
    );

    Ok(nal_count)
}

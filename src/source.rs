//! Datagram sources (spec §6, ambient collaborators).
//!
//! The depacketizer core only ever sees `(bytes, Instant)` pairs; how
//! those pairs are produced — from a PCAP file walk or a live UDP socket
//! — is this module's concern, kept deliberately thin and external to
//! the protocol state machine per spec §1's "out of scope" list.

use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// One received datagram plus the wall-clock instant it was observed.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    pub received_at: Instant,
}

/// External collaborator that reads raw UDP-carried bytes, filtered to
/// one RTP port, from some source.
///
/// PCAP parsing itself is explicitly out of scope (spec §1); this trait
/// is the seam a caller plugs a real PCAP reader into.
pub trait PacketSource {
    fn next_datagram(&mut self) -> Option<Datagram>;
}

/// Live UDP receiver: binds a socket, runs a background task that reads
/// datagrams and forwards them over a bounded channel, mirroring the
/// original receiver-thread/processor-thread split from the reference
/// Python implementation's `H265StreamReceiver` with a bounded queue in
/// place of the GIL-bound `queue.Queue`.
pub struct UdpSource {
    receiver: mpsc::Receiver<Datagram>,
    task: tokio::task::JoinHandle<()>,
}

impl UdpSource {
    /// Bind to `0.0.0.0:port` and start the background receive task.
    /// `channel_capacity` bounds how many datagrams may queue up before
    /// the receive loop starts applying backpressure (dropping the
    /// oldest-arriving packet in favor of keeping up, since RTP is
    /// best-effort anyway).
    pub async fn bind(port: u16, channel_capacity: usize) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding UDP socket on port {port}"))?;

        let (tx, rx) = mpsc::channel(channel_capacity);
        let task = tokio::spawn(receive_loop(socket, tx));

        Ok(UdpSource { receiver: rx, task })
    }

    /// Receive the next datagram, or `None` once the background task has
    /// exited (socket closed or fatal I/O error).
    pub async fn recv(&mut self) -> Option<Datagram> {
        self.receiver.recv().await
    }
}

impl Drop for UdpSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn receive_loop(socket: UdpSocket, tx: mpsc::Sender<Datagram>) {
    let mut buf = [0u8; 2048];
    loop {
        match socket.recv(&mut buf).await {
            Ok(len) => {
                let datagram = Datagram {
                    bytes: buf[..len].to_vec(),
                    received_at: Instant::now(),
                };
                debug!("received {len} bytes");
                if tx.send(datagram).await.is_err() {
                    // Receiving half dropped; nothing left to forward to.
                    break;
                }
            }
            Err(e) => {
                warn!("UDP receive error: {e}");
                break;
            }
        }
    }
}

/// A `PacketSource` over an in-memory list of datagrams, for tests and
/// for an offline extractor's PCAP-derived datagram list.
pub struct MemorySource {
    datagrams: std::vec::IntoIter<Datagram>,
}

impl MemorySource {
    pub fn new(datagrams: Vec<Datagram>) -> Self {
        MemorySource {
            datagrams: datagrams.into_iter(),
        }
    }
}

impl PacketSource for MemorySource {
    fn next_datagram(&mut self) -> Option<Datagram> {
        self.datagrams.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_yields_in_order() {
        let now = Instant::now();
        let mut source = MemorySource::new(vec![
            Datagram {
                bytes: vec![1],
                received_at: now,
            },
            Datagram {
                bytes: vec![2],
                received_at: now,
            },
        ]);

        assert_eq!(source.next_datagram().unwrap().bytes, vec![1]);
        assert_eq!(source.next_datagram().unwrap().bytes, vec![2]);
        assert!(source.next_datagram().is_none());
    }
}

//! HEVC Depacketizer — the central state machine (spec §4.3).
//!
//! Classifies each RTP payload's packing (Single NAL, Aggregation Packet,
//! Fragmentation Unit), drives the [`FragmentStore`], and emits zero or
//! more completed NAL units per input datagram.

use std::time::Instant;

use log::{debug, trace, warn};

use crate::annexb;
use crate::config::DepacketizerConfig;
use crate::counters::Counters;
use crate::error::DepacketizerError;
use crate::fragment_store::{FragmentKey, FragmentStore};
use crate::hevc::{NalHeader, NAL_TYPE_AP, NAL_TYPE_FU};
use crate::rtp::RtpHeader;

/// One completed HEVC NAL unit, not including its Annex B prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedNal {
    pub bytes: Vec<u8>,
}

/// The RTP -> HEVC bitstream depacketizer.
///
/// Owns its [`FragmentStore`] exclusively; per spec §5, multiple receiver
/// threads each own a separate `Depacketizer` rather than sharing one.
pub struct Depacketizer {
    store: FragmentStore,
    config: DepacketizerConfig,
    counters: Counters,
}

impl Depacketizer {
    pub fn new(config: DepacketizerConfig) -> Self {
        Depacketizer {
            store: FragmentStore::new(config.fragment_timeout),
            config,
            counters: Counters::default(),
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn fragment_store_len(&self) -> usize {
        self.store.len()
    }

    /// Record an RTP header that the [`crate::rtp`] parser rejected
    /// before the datagram ever reached `depacketize`. The parser itself
    /// has no `Depacketizer` to update; callers that drop a datagram on
    /// a `rtp::parse` error should report it here so `Counters` stays a
    /// complete picture of what the host saw.
    pub fn record_malformed_header(&mut self) {
        self.counters.malformed_headers += 1;
    }

    /// Evict fragmentation contexts idle longer than the configured
    /// timeout. The caller SHALL invoke this at least every 500 ms of
    /// processing activity (spec §4.3).
    pub fn sweep(&mut self, now: Instant) {
        let evicted = self.store.sweep(now);
        self.counters.fragments_timed_out += evicted as u64;
    }

    /// Process one RTP datagram, returning zero or more completed NAL
    /// units in emission order.
    pub fn depacketize(
        &mut self,
        header: &RtpHeader<'_>,
        now: Instant,
    ) -> Result<Vec<CompletedNal>, DepacketizerError> {
        self.counters.packets_seen += 1;

        if header.payload.len() < 2 {
            self.counters.truncated_payloads += 1;
            return Err(DepacketizerError::TruncatedPayload(
                "HEVC payload shorter than 2-byte NAL header",
            ));
        }

        let payload_hdr = NalHeader::from_bytes(header.payload[0], header.payload[1]);
        let nal_type = payload_hdr.nal_unit_type();

        match nal_type {
            NAL_TYPE_AP => self.handle_ap(header),
            NAL_TYPE_FU => Ok(self.handle_fu(header, payload_hdr, now)),
            _ => {
                trace!(
                    "single NAL unit: type={} ssrc={:08x} seq={}",
                    nal_type,
                    header.ssrc,
                    header.sequence
                );
                self.counters.nals_emitted += 1;
                Ok(vec![CompletedNal {
                    bytes: header.payload.to_vec(),
                }])
            }
        }
    }

    /// §4.3.1 Aggregation Packet handling.
    fn handle_ap(
        &mut self,
        header: &RtpHeader<'_>,
    ) -> Result<Vec<CompletedNal>, DepacketizerError> {
        let payload = header.payload;
        let mut offset = 2; // skip the 2-byte AP NAL header
        let mut nals = Vec::new();

        loop {
            if offset + 2 > payload.len() {
                break;
            }
            if self.config.donl {
                offset += 2;
                if offset + 2 > payload.len() {
                    break;
                }
            }

            let nal_size = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
            offset += 2;

            if offset + nal_size > payload.len() {
                debug!(
                    "AP truncated: need {} more bytes than remain, discarding tail",
                    offset + nal_size - payload.len()
                );
                break;
            }

            nals.push(CompletedNal {
                bytes: payload[offset..offset + nal_size].to_vec(),
            });
            offset += nal_size;
        }

        self.counters.nals_emitted += nals.len() as u64;
        Ok(nals)
    }

    /// §4.3.2 Fragmentation Unit handling.
    ///
    /// Middle fragments (`start=false, end=false`) are appended to the
    /// fragment whose last-known sequence number precedes them most
    /// closely; this reassembles correctly only when middle fragments for
    /// a given NAL arrive in their native sending order. Out-of-order
    /// middle fragments are still appended (to the same, only-matching
    /// entry) but in arrival order, corrupting the reassembled NAL rather
    /// than being rejected. See [`FragmentStore`]'s `find_matching_key`.
    fn handle_fu(
        &mut self,
        header: &RtpHeader<'_>,
        payload_hdr: NalHeader,
        now: Instant,
    ) -> Vec<CompletedNal> {
        let payload = header.payload;
        if payload.len() < 3 {
            self.counters.truncated_payloads += 1;
            return Vec::new();
        }

        let fu_header = payload[2];
        let start_bit = (fu_header & 0x80) != 0;
        let end_bit = (fu_header & 0x40) != 0;
        let fu_type = fu_header & 0x3F;

        let reconstructed = NalHeader::reconstruct_from_fu(payload_hdr, fu_type);
        let mut body_offset = 3;
        if self.config.donl && start_bit && payload.len() >= body_offset + 2 {
            body_offset += 2;
        }
        let fragment_body = &payload[body_offset..];

        let key = FragmentKey {
            ssrc: header.ssrc,
            timestamp: header.timestamp,
            start_sequence: header.sequence,
        };

        match (start_bit, end_bit) {
            (true, false) => {
                let mut initial = Vec::with_capacity(2 + fragment_body.len());
                initial.extend_from_slice(&reconstructed.to_bytes());
                initial.extend_from_slice(fragment_body);
                self.store.begin(key, initial, now);
                self.counters.fragments_started += 1;
                Vec::new()
            }
            (false, false) => {
                match self
                    .store
                    .append(header.ssrc, header.timestamp, header.sequence, fragment_body, now)
                {
                    Some(_) => Vec::new(),
                    None => {
                        warn!(
                            "orphan FU middle fragment: ssrc={:08x} ts={} seq={}",
                            header.ssrc, header.timestamp, header.sequence
                        );
                        self.counters.orphan_fragments += 1;
                        Vec::new()
                    }
                }
            }
            (false, true) => {
                match self.store.complete(
                    header.ssrc,
                    header.timestamp,
                    header.sequence,
                    fragment_body,
                    now,
                ) {
                    Some(bytes) => {
                        self.counters.fragments_completed += 1;
                        self.counters.nals_emitted += 1;
                        vec![CompletedNal { bytes }]
                    }
                    None => {
                        warn!(
                            "orphan FU end fragment: ssrc={:08x} ts={} seq={}",
                            header.ssrc, header.timestamp, header.sequence
                        );
                        self.counters.orphan_fragments += 1;
                        Vec::new()
                    }
                }
            }
            (true, true) => {
                // Degenerate single-fragment NAL: emit immediately, never
                // touching the Store.
                let mut bytes = Vec::with_capacity(2 + fragment_body.len());
                bytes.extend_from_slice(&reconstructed.to_bytes());
                bytes.extend_from_slice(fragment_body);
                self.counters.nals_emitted += 1;
                vec![CompletedNal { bytes }]
            }
        }
    }
}

/// Frame a completed NAL with its Annex B start code.
pub fn frame(nal: &CompletedNal) -> Vec<u8> {
    annexb::frame(&nal.bytes)
}

//! Fragment Store — indexed collection of in-progress FU reassembly
//! contexts, with timeout-based eviction (spec §4.2).

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Composite key identifying one fragmentation context.
///
/// Keying only on `timestamp` collides whenever two SSRCs share a
/// timestamp by coincidence, or when timestamps wrap within a long
/// session; keying on `(ssrc, timestamp, start_sequence)` keeps distinct
/// contexts separate and tolerates simultaneous streams sharing one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    pub ssrc: u32,
    pub timestamp: u32,
    pub start_sequence: u16,
}

struct Entry {
    buffer: Vec<u8>,
    last_sequence: u16,
    last_update_time: Instant,
}

/// Default fragment-reassembly timeout (spec §4.2, §9).
pub const DEFAULT_FRAGMENT_TIMEOUT: Duration = Duration::from_millis(500);

/// Indexed collection of in-progress fragmented NAL units.
///
/// Not internally synchronized: the depacketizer owns exclusive access
/// (spec §5).
#[derive(Default)]
pub struct FragmentStore {
    entries: HashMap<FragmentKey, Entry>,
    timeout: Duration,
}

impl FragmentStore {
    pub fn new(timeout: Duration) -> Self {
        FragmentStore {
            entries: HashMap::new(),
            timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new fragmentation context, evicting any prior entry under
    /// the same `(ssrc, timestamp)` prefix (a new start-bit always wins;
    /// the abandoned buffer is simply dropped, per spec §4.2/§4.3.2).
    pub fn begin(&mut self, key: FragmentKey, initial_bytes: Vec<u8>, now: Instant) {
        self.entries.retain(|existing, _| {
            !(existing.ssrc == key.ssrc && existing.timestamp == key.timestamp)
        });
        self.entries.insert(
            key,
            Entry {
                buffer: initial_bytes,
                last_sequence: key.start_sequence,
                last_update_time: now,
            },
        );
    }

    /// Find the entry scoped to `(ssrc, timestamp)` whose `last_sequence +
    /// 1` is numerically closest (mod 2^16) to `sequence`.
    ///
    /// This closest-predecessor match reassembles correctly only when
    /// middle fragments for a given NAL arrive in their native sending
    /// order. A middle fragment that arrives out of order against other
    /// middle fragments of the same NAL is still matched to the entry
    /// (it's the only one scoped to `(ssrc, timestamp)`), but gets
    /// appended in arrival order rather than sequence order, corrupting
    /// the reassembled buffer. Callers that need correctness under
    /// reordering must reorder datagrams before calling `append`; this
    /// store does not buffer or resequence on their behalf.
    fn find_matching_key(&self, ssrc: u32, timestamp: u32, sequence: u16) -> Option<FragmentKey> {
        self.entries
            .iter()
            .filter(|(key, _)| key.ssrc == ssrc && key.timestamp == timestamp)
            .min_by_key(|(_, entry)| {
                sequence_distance(entry.last_sequence.wrapping_add(1), sequence)
            })
            .map(|(key, _)| *key)
    }

    /// Append `bytes` to the matching in-progress entry, returning the
    /// matched key (for the caller's bookkeeping) if one existed.
    pub fn append(
        &mut self,
        ssrc: u32,
        timestamp: u32,
        sequence: u16,
        bytes: &[u8],
        now: Instant,
    ) -> Option<FragmentKey> {
        let key = self.find_matching_key(ssrc, timestamp, sequence)?;
        let entry = self.entries.get_mut(&key)?;
        entry.buffer.extend_from_slice(bytes);
        entry.last_sequence = sequence;
        entry.last_update_time = now;
        Some(key)
    }

    /// Like `append`, then remove the entry and return its accumulated
    /// buffer.
    pub fn complete(
        &mut self,
        ssrc: u32,
        timestamp: u32,
        sequence: u16,
        bytes: &[u8],
        now: Instant,
    ) -> Option<Vec<u8>> {
        let key = self.find_matching_key(ssrc, timestamp, sequence)?;
        let mut entry = self.entries.remove(&key)?;
        entry.buffer.extend_from_slice(bytes);
        entry.last_update_time = now;
        Some(entry.buffer)
    }

    /// Remove every entry whose `last_update_time` is older than `now -
    /// timeout`. Returns the number of entries evicted.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_update_time) <= timeout);
        before - self.entries.len()
    }
}

/// Distance between two 16-bit sequence numbers, accounting for
/// wraparound, taken as the shorter of the two directions.
fn sequence_distance(a: u16, b: u16) -> u16 {
    let forward = b.wrapping_sub(a);
    let backward = a.wrapping_sub(b);
    forward.min(backward)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ssrc: u32, ts: u32, seq: u16) -> FragmentKey {
        FragmentKey {
            ssrc,
            timestamp: ts,
            start_sequence: seq,
        }
    }

    #[test]
    fn begin_then_append_then_complete_reassembles_in_order() {
        let mut store = FragmentStore::new(DEFAULT_FRAGMENT_TIMEOUT);
        let now = Instant::now();

        store.begin(key(1, 1000, 100), vec![0x26, 0x01, 0xB0, 0xB1], now);
        store.append(1, 1000, 101, &[0xB2, 0xB3], now);
        let complete = store.complete(1, 1000, 102, &[0xB4, 0xB5], now).unwrap();

        assert_eq!(complete, vec![0x26, 0x01, 0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5]);
        assert!(store.is_empty());
    }

    #[test]
    fn append_with_no_matching_start_returns_none() {
        let mut store = FragmentStore::new(DEFAULT_FRAGMENT_TIMEOUT);
        let now = Instant::now();
        assert!(store.append(1, 1000, 101, &[0x00], now).is_none());
        assert!(store.complete(1, 1000, 102, &[0x00], now).is_none());
    }

    #[test]
    fn new_start_bit_replaces_prior_entry_at_same_ssrc_timestamp() {
        let mut store = FragmentStore::new(DEFAULT_FRAGMENT_TIMEOUT);
        let now = Instant::now();

        store.begin(key(1, 1000, 100), vec![0xAA], now);
        store.begin(key(1, 1000, 105), vec![0xBB], now);

        assert_eq!(store.len(), 1);
        let complete = store.complete(1, 1000, 106, &[0xCC], now).unwrap();
        assert_eq!(complete, vec![0xBB, 0xCC]);
    }

    #[test]
    fn two_ssrcs_at_same_timestamp_do_not_cross_contaminate() {
        let mut store = FragmentStore::new(DEFAULT_FRAGMENT_TIMEOUT);
        let now = Instant::now();

        store.begin(key(1, 1000, 10), vec![0x01], now);
        store.begin(key(2, 1000, 10), vec![0x02], now);
        assert_eq!(store.len(), 2);

        let a = store.complete(1, 1000, 11, &[0xAA], now).unwrap();
        let b = store.complete(2, 1000, 11, &[0xBB], now).unwrap();
        assert_eq!(a, vec![0x01, 0xAA]);
        assert_eq!(b, vec![0x02, 0xBB]);
    }

    #[test]
    fn sweep_evicts_stale_entries() {
        let mut store = FragmentStore::new(DEFAULT_FRAGMENT_TIMEOUT);
        let t0 = Instant::now();

        store.begin(key(1, 1000, 100), vec![0xAA], t0);
        let evicted = store.sweep(t0 + Duration::from_millis(600));
        assert_eq!(evicted, 1);
        assert!(store.is_empty());
    }

    /// Middle fragments are matched by closest-predecessor sequence
    /// distance, not queued and resorted; if they arrive out of their
    /// native sending order, `append` still appends them in arrival
    /// order, silently producing a corrupted buffer rather than an
    /// error. This is the permitted behavior, not a bug: correctness
    /// under reordering is the caller's responsibility, per spec.
    #[test]
    fn reordered_middle_fragments_append_in_arrival_not_sequence_order() {
        let mut store = FragmentStore::new(DEFAULT_FRAGMENT_TIMEOUT);
        let now = Instant::now();

        store.begin(key(1, 1000, 100), vec![0xAA], now);
        // Sequence 102 (the third fragment) arrives before 101 (the second).
        store.append(1, 1000, 102, &[0xCC], now);
        store.append(1, 1000, 101, &[0xBB], now);
        let complete = store.complete(1, 1000, 103, &[0xDD], now).unwrap();

        // Bytes land in arrival order (0xCC before 0xBB), not sequence
        // order (0xBB before 0xCC) — the reassembled NAL is corrupted.
        assert_eq!(complete, vec![0xAA, 0xCC, 0xBB, 0xDD]);
    }

    #[test]
    fn sweep_keeps_fresh_entries() {
        let mut store = FragmentStore::new(DEFAULT_FRAGMENT_TIMEOUT);
        let t0 = Instant::now();

        store.begin(key(1, 1000, 100), vec![0xAA], t0);
        let evicted = store.sweep(t0 + Duration::from_millis(400));
        assert_eq!(evicted, 0);
        assert_eq!(store.len(), 1);
    }
}

//! Depacketizer configuration (spec §3, §4.3).

use std::time::Duration;

use crate::fragment_store::DEFAULT_FRAGMENT_TIMEOUT;

/// Constructor-argument configuration for a [`crate::depacketizer::Depacketizer`].
///
/// There is no file format for this: the teacher crate's own "configuration"
/// is likewise a handful of constructor arguments, not a loaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepacketizerConfig {
    /// How long a fragmentation context may sit idle before `sweep` evicts
    /// it. Defaults to 500 ms per spec §4.2/§9.
    pub fragment_timeout: Duration,
    /// Whether the session negotiates `sprop-max-don-diff > 0`, in which
    /// case AP and FU payloads carry 2 extra DONL/DOND bytes per NAL that
    /// must be skipped. Off by default (spec §4.3: "the core assumes
    /// sprop-max-don-diff = 0").
    pub donl: bool,
}

impl Default for DepacketizerConfig {
    fn default() -> Self {
        DepacketizerConfig {
            fragment_timeout: DEFAULT_FRAGMENT_TIMEOUT,
            donl: false,
        }
    }
}

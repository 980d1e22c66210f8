//! RTP-over-UDP depacketizer for H.265/HEVC, reconstructing a byte-exact
//! Annex B elementary stream from RFC 7798 payloads.
//!
//! The core pipeline is: [`rtp::parse`] a datagram, hand it to a
//! [`depacketizer::Depacketizer`], frame whatever NAL units come back with
//! [`annexb::frame`], and write the framed bytes to a
//! [`sink::ElementaryStreamSink`]. [`source`] provides the offline/online
//! collaborators that produce datagrams in the first place.

pub mod annexb;
pub mod config;
pub mod counters;
pub mod depacketizer;
pub mod error;
pub mod fragment_store;
pub mod hevc;
pub mod rtp;
pub mod sink;
pub mod source;

pub use config::DepacketizerConfig;
pub use counters::Counters;
pub use depacketizer::{CompletedNal, Depacketizer};
pub use error::DepacketizerError;

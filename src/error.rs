use thiserror::Error;

/// Errors surfaced while parsing RTP headers or HEVC RTP payloads.
///
/// Nothing here is fatal to the depacketizer: the caller decides whether to
/// drop the datagram and bump a counter, or treat it as a hard failure.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DepacketizerError {
    #[error("RTP header malformed or truncated: {0}")]
    MalformedHeader(&'static str),

    #[error("HEVC payload too short for its declared packing: {0}")]
    TruncatedPayload(&'static str),
}

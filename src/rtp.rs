//! RTP header parsing (RFC 3550).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::error::DepacketizerError;

/// Minimum RTP header size in bytes (no CSRC, no extension).
pub const RTP_HEADER_SIZE: usize = 12;

/// A parsed RTP datagram, borrowing its payload from the caller's buffer.
///
/// This view does not validate `version` or `payload_type`; those are
/// policy choices the caller makes (see the crate-level docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader<'a> {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub cc: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: &'a [u8],
}

/// Parse a raw UDP datagram into an RTP header view.
///
/// Returns `MalformedHeader` when the datagram is shorter than 12 bytes,
/// when the declared CSRC count or extension header would run past the
/// end of the datagram, or when the computed payload offset exceeds the
/// datagram length.
pub fn parse(data: &[u8]) -> Result<RtpHeader<'_>, DepacketizerError> {
    if data.len() < RTP_HEADER_SIZE {
        return Err(DepacketizerError::MalformedHeader(
            "datagram shorter than 12-byte RTP header",
        ));
    }

    let byte0 = data[0];
    let version = (byte0 >> 6) & 0x03;
    let padding = (byte0 >> 5) & 0x01 != 0;
    let extension = (byte0 >> 4) & 0x01 != 0;
    let cc = byte0 & 0x0F;

    let byte1 = data[1];
    let marker = (byte1 >> 7) & 0x01 != 0;
    let payload_type = byte1 & 0x7F;

    let sequence = u16::from_be_bytes([data[2], data[3]]);
    let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

    let mut header_size = RTP_HEADER_SIZE + (cc as usize) * 4;
    if header_size > data.len() {
        return Err(DepacketizerError::MalformedHeader(
            "CSRC list runs past end of datagram",
        ));
    }

    if extension {
        if header_size + 4 > data.len() {
            return Err(DepacketizerError::MalformedHeader(
                "extension header signalled but truncated",
            ));
        }
        let ext_length = u16::from_be_bytes([data[header_size + 2], data[header_size + 3]]);
        header_size += 4 + (ext_length as usize) * 4;
        if header_size > data.len() {
            return Err(DepacketizerError::MalformedHeader(
                "extension header length runs past end of datagram",
            ));
        }
    }

    Ok(RtpHeader {
        version,
        padding,
        extension,
        cc,
        marker,
        payload_type,
        sequence,
        timestamp,
        ssrc,
        payload: &data[header_size..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_header(cc: u8, extension: bool) -> Vec<u8> {
        let mut buf = vec![0u8; RTP_HEADER_SIZE];
        buf[0] = 0x80 | cc; // V=2, P=0
        if extension {
            buf[0] |= 0x10;
        }
        buf[1] = 96; // arbitrary dynamic payload type
        buf[2..4].copy_from_slice(&42u16.to_be_bytes());
        buf[4..8].copy_from_slice(&1000u32.to_be_bytes());
        buf[8..12].copy_from_slice(&0xCAFEBABEu32.to_be_bytes());
        buf
    }

    #[test]
    fn parses_minimal_header() {
        let mut data = base_header(0, false);
        data.extend_from_slice(&[0xAA, 0xBB]);

        let header = parse(&data).unwrap();
        assert_eq!(header.version, 2);
        assert!(!header.padding);
        assert!(!header.extension);
        assert_eq!(header.cc, 0);
        assert_eq!(header.payload_type, 96);
        assert_eq!(header.sequence, 42);
        assert_eq!(header.timestamp, 1000);
        assert_eq!(header.ssrc, 0xCAFEBABE);
        assert_eq!(header.payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn rejects_short_datagram() {
        assert_eq!(
            parse(&[0u8; 11]),
            Err(DepacketizerError::MalformedHeader(
                "datagram shorter than 12-byte RTP header"
            ))
        );
    }

    #[test]
    fn accounts_for_csrc_list() {
        let mut data = base_header(2, false);
        data.extend_from_slice(&[0u8; 8]); // two CSRC entries
        data.extend_from_slice(&[0x01, 0x02, 0x03]);

        let header = parse(&data).unwrap();
        assert_eq!(header.cc, 2);
        assert_eq!(header.payload, &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn rejects_truncated_csrc_list() {
        let data = base_header(1, false); // declares 1 CSRC, provides none
        assert!(parse(&data).is_err());
    }

    #[test]
    fn accounts_for_extension_header() {
        let mut data = base_header(0, true);
        // profile-specific id (2 bytes) + ext_length (2 bytes, in 32-bit words)
        data.extend_from_slice(&[0x00, 0x01]);
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&[0u8; 4]); // one 32-bit extension word
        data.extend_from_slice(&[0x42]);

        let header = parse(&data).unwrap();
        assert!(header.extension);
        assert_eq!(header.payload, &[0x42]);
    }

    #[test]
    fn rejects_truncated_extension_header() {
        let mut data = base_header(0, true);
        data.extend_from_slice(&[0x00, 0x01]); // only 2 of 4 extension-header bytes
        assert!(parse(&data).is_err());
    }
}

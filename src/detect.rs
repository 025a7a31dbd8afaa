//! Datagram classification for transports that multiplex DTLS with other
//! protocols (STUN, RTP/RTCP) on the same 5-tuple.
//!
//! The first byte of a DTLS record is its content type. RFC 7983 reserves
//! the range 20..=63 for DTLS, which keeps it apart from STUN (0..=3),
//! ZRTP (16..=19), TURN channels (64..=79) and RTP/RTCP (128..=191).

/// Record header: content_type(1) + version(2) + epoch(2) + seq(6) + length(2)
const RECORD_HEADER_LEN: usize = 13;

/// Whether the datagram looks like DTLS.
///
/// Stateless and cheap; intended for the demultiplexer in front of
/// [`DtlsAgent::process_dtls_data`](crate::DtlsAgent::process_dtls_data).
pub fn is_dtls(data: &[u8]) -> bool {
    data.len() >= RECORD_HEADER_LEN && data[0] > 19 && data[0] < 64
}

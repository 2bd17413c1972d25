//! TCP dissection, TCP stage of [MODULE B] (spec.md §4.B).
//!
//! Adapted from the teacher's `core/src/protocols/packet/tcp.rs`, trimmed to the fields the
//! writer actually needs: source/destination port and sequence number. Flag bits, window,
//! checksum, and urgent pointer have no consumer in a reconstructor that does no TCP state
//! tracking (spec.md §1 Non-goals), so they are not exposed.

use byteorder::{BigEndian, ByteOrder};

use crate::error::DissectError;

const MIN_HEADER_LEN: usize = 20;

/// The fields of a TCP segment the writer needs to place its payload.
pub struct TcpSegment<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub payload: &'a [u8],
}

/// Parses a TCP header and returns its payload, dropping pure-ACK segments silently (spec.md
/// §4.B: "If `length <= header_len`, the segment has no payload (pure ACK) — drop silently").
pub fn dissect(data: &[u8]) -> Result<TcpSegment<'_>, DissectError> {
    if data.len() < MIN_HEADER_LEN {
        return Err(DissectError::TruncatedTcpHeader);
    }

    let data_offset = (data[12] >> 4) as usize;
    let header_len = data_offset * 4;
    if header_len < MIN_HEADER_LEN || header_len > data.len() {
        return Err(DissectError::BadTcpHeaderLen);
    }
    if data.len() <= header_len {
        return Err(DissectError::NoPayload);
    }

    let src_port = BigEndian::read_u16(&data[0..2]);
    let dst_port = BigEndian::read_u16(&data[2..4]);
    let seq = BigEndian::read_u32(&data[4..8]);
    let payload = &data[header_len..];

    Ok(TcpSegment {
        src_port,
        dst_port,
        seq,
        payload,
    })
}

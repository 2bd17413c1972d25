//! IPv4 dissection, IP stage of [MODULE B] (spec.md §4.B).
//!
//! Adapted from the teacher's `core/src/protocols/packet/ipv4.rs`: same header layout and
//! field names, but reading with `byteorder` over a borrowed slice instead of an `unsafe`
//! `repr(C, packed)` cast over a zero-copy `Mbuf` — pcap hands us a plain `&[u8]` with no
//! alignment guarantee to lean on.

use byteorder::{BigEndian, ByteOrder};
use std::net::Ipv4Addr;

use crate::error::DissectError;

/// IANA protocol number for TCP.
pub const TCP_PROTOCOL: u8 = 6;

const MIN_HEADER_LEN: usize = 20;

/// The fields of an IPv4 datagram that the TCP dissector and flow table need.
pub struct Ipv4Segment<'a> {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub protocol: u8,
    /// TCP segment bytes, bounded by the header's own `total_length` (spec.md §4.B: "if
    /// captured < total length, warn but continue using the captured length bounded by the
    /// total").
    pub payload: &'a [u8],
}

/// Parses the IPv4 header fields needed to hand a segment to the TCP stage.
///
/// Returns `Err` for anything spec.md §4.B says to drop: too-short capture, non-zero fragment
/// offset, or a header length that exceeds the datagram's own total length.
pub fn dissect(data: &[u8]) -> Result<Ipv4Segment<'_>, DissectError> {
    if data.len() < MIN_HEADER_LEN {
        return Err(DissectError::TruncatedIpHeader);
    }

    let version_ihl = data[0];
    let version = version_ihl >> 4;
    if version != 4 {
        return Err(DissectError::NotIpv4);
    }
    let header_len = usize::from(version_ihl & 0x0f) * 4;
    if header_len < MIN_HEADER_LEN {
        return Err(DissectError::BadIpHeaderLen);
    }

    let total_length_field = usize::from(BigEndian::read_u16(&data[2..4]));
    // Trust the captured length when the wire length looks wrong, as long as it's no larger
    // than what's actually present; never index past `data`.
    let total_length = total_length_field.min(data.len());
    if total_length_field > data.len() {
        log::debug!(
            "captured {} bytes < total length {}, truncating",
            data.len(),
            total_length_field
        );
    }

    if header_len > total_length {
        return Err(DissectError::BadIpHeaderLen);
    }

    let flags_frag = BigEndian::read_u16(&data[6..8]);
    let fragment_offset = flags_frag & 0x1FFF;
    if fragment_offset != 0 {
        return Err(DissectError::Fragment);
    }

    let protocol = data[9];
    if protocol != TCP_PROTOCOL {
        return Err(DissectError::NotTcp);
    }

    let src_addr = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
    let dst_addr = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

    let payload = &data[header_len..total_length];

    Ok(Ipv4Segment {
        src_addr,
        dst_addr,
        protocol,
        payload,
    })
}

//! Packet dissection: link dispatch ([MODULE A]) and the IP/TCP dissector ([MODULE B]).
//!
//! Mirrors the module layout of the teacher's `core/src/protocols/packet`, one file per
//! protocol layer, but flattened to a single straight-line pipeline: flowtap has exactly one
//! encapsulation chain to walk (link → IPv4 → TCP), not the teacher's general
//! parse-to-any-layer `Packet` trait built for an extensible set of link/network protocols.

pub mod ipv4;
pub mod link;
pub mod tcp;

use pcap::Linktype;

use crate::error::DissectError;

/// A fully dissected TCP/IPv4 segment, ready for the flow table.
pub struct Segment<'a> {
    pub src_addr: std::net::Ipv4Addr,
    pub dst_addr: std::net::Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub payload: &'a [u8],
}

/// Runs the full link → IP → TCP pipeline over one captured frame.
pub fn dissect<'a>(linktype: Linktype, captured: &'a [u8]) -> Result<Segment<'a>, DissectError> {
    let ip_payload = link::dispatch(linktype, captured)?;
    let ip = ipv4::dissect(ip_payload)?;
    let tcp = tcp::dissect(ip.payload)?;
    Ok(Segment {
        src_addr: ip.src_addr,
        dst_addr: ip.dst_addr,
        src_port: tcp.src_port,
        dst_port: tcp.dst_port,
        seq: tcp.seq,
        payload: tcp.payload,
    })
}

/// Replaces any byte outside printable ASCII ∪ {CR, LF} with `.` (spec.md §4.B, the `-s`
/// flag).
pub fn filter_non_printable(payload: &[u8]) -> Vec<u8> {
    payload
        .iter()
        .map(|&b| {
            if b == b'\r' || b == b'\n' || (0x20..=0x7e).contains(&b) {
                b
            } else {
                b'.'
            }
        })
        .collect()
}

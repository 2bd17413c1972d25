//! Link-layer dispatch (spec.md §4.A, [MODULE A]).
//!
//! Strips the fixed-size link header for a handful of datalink types and hands the remainder
//! up as the IP payload. Adapted from the teacher's per-protocol dissector style in
//! `core/src/protocols/packet/ethernet.rs`, but working directly over pcap's borrowed byte
//! slices instead of a zero-copy `Mbuf`, since there is no DPDK memory pool here.

use byteorder::{BigEndian, ByteOrder};
use pcap::Linktype;

use crate::error::DissectError;

/// IPv4 address family as carried in a BSD "null/loopback" link header.
const AF_INET_BSD: u32 = 2;
/// EtherType for IPv4.
const ETHERTYPE_IPV4: u16 = 0x0800;

const NULL_HDR_LEN: usize = 4;
const RAW_HDR_LEN: usize = 0;
const ETHERNET_HDR_LEN: usize = 14;
const PPP_HDR_LEN: usize = 4;

/// Strips the link-layer header for `linktype` and returns the IP payload.
///
/// `captured` is the number of bytes actually available in `data` (which may be shorter than
/// the frame's original wire length); spec.md §4.A requires dropping with a warning when it is
/// shorter than the fixed header for the datalink type.
pub fn dispatch(linktype: Linktype, data: &[u8]) -> Result<&[u8], DissectError> {
    match linktype {
        Linktype::NULL | Linktype::LOOP => {
            if data.len() < NULL_HDR_LEN {
                return Err(DissectError::TruncatedLinkHeader);
            }
            let family = BigEndian::read_u32(&data[0..4]);
            if family != AF_INET_BSD {
                return Err(DissectError::NotIp);
            }
            Ok(&data[NULL_HDR_LEN..])
        }
        Linktype::RAW | Linktype::IPV4 => Ok(&data[RAW_HDR_LEN..]),
        Linktype::ETHERNET => {
            if data.len() < ETHERNET_HDR_LEN {
                return Err(DissectError::TruncatedLinkHeader);
            }
            let ether_type = BigEndian::read_u16(&data[12..14]);
            if ether_type != ETHERTYPE_IPV4 {
                return Err(DissectError::NotIp);
            }
            Ok(&data[ETHERNET_HDR_LEN..])
        }
        Linktype::PPP => {
            if data.len() < PPP_HDR_LEN {
                return Err(DissectError::TruncatedLinkHeader);
            }
            Ok(&data[PPP_HDR_LEN..])
        }
        other => {
            // Unknown datalink type is a fatal startup error (spec.md §7 band 1); by the time
            // packets are flowing we have already validated the capture's linktype once in
            // `capture::require_supported_linktype`, so reaching this arm per-packet can't
            // happen in practice. Treat it as a drop rather than panicking mid-loop.
            log::error!("unreachable: unsupported datalink type {:?}", other);
            Err(DissectError::NotIp)
        }
    }
}

/// Fails fast at startup if `linktype` isn't one flowtap knows how to strip.
pub fn is_supported(linktype: Linktype) -> bool {
    matches!(
        linktype,
        Linktype::NULL | Linktype::LOOP | Linktype::RAW | Linktype::IPV4 | Linktype::ETHERNET | Linktype::PPP
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_header_checks_address_family() {
        let mut good = vec![0, 0, 0, 2];
        good.extend_from_slice(b"payload");
        assert_eq!(dispatch(Linktype::NULL, &good).unwrap(), b"payload");

        let bad = vec![0, 0, 0, 30];
        assert!(matches!(dispatch(Linktype::NULL, &bad), Err(DissectError::NotIp)));
    }

    #[test]
    fn ethernet_checks_ethertype_and_length() {
        let too_short = vec![0u8; 10];
        assert!(matches!(
            dispatch(Linktype::ETHERNET, &too_short),
            Err(DissectError::TruncatedLinkHeader)
        ));

        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&0x86DDu16.to_be_bytes()); // IPv6, unsupported here
        frame.extend_from_slice(b"x");
        assert!(matches!(dispatch(Linktype::ETHERNET, &frame), Err(DissectError::NotIp)));
    }

    #[test]
    fn raw_has_no_header_to_strip() {
        assert_eq!(dispatch(Linktype::RAW, b"abc").unwrap(), b"abc");
    }

    #[test]
    fn unsupported_linktypes_are_rejected_at_startup() {
        assert!(!is_supported(Linktype::IEEE802_11));
    }
}

//! End-to-end tests against synthetic Ethernet/IPv4/TCP frames, built in memory rather than
//! loaded from a bundled trace — there is no pcap fixture file in this repository to load, so
//! frames are hand-assembled byte-for-byte the way a unit test for a wire-format dissector
//! normally is.
//!
//! Tests that touch `ArtifactCache::open` write real files into the process's current working
//! directory (spec.md §6: artifacts live in the cwd, not a caller-supplied path), so each such
//! test chdirs into its own `tempfile::TempDir` and is marked `#[serial]` to keep that global
//! mutation from racing another test thread.

use std::io::Read;
use std::net::Ipv4Addr;

use serial_test::serial;

use flowtap::cache::ArtifactCache;
use flowtap::clock::LogicalClock;
use flowtap::flow::{FlowKey, FlowTable};
use flowtap::writer::{ArtifactWriter, Outcome};
use flowtap::{filename, packet};

const ETHERTYPE_IPV4: u16 = 0x0800;
const TCP_PROTOCOL: u8 = 6;

/// Builds one Ethernet II frame carrying an IPv4/TCP segment with no options on either header.
fn frame(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    seq: u32,
    frag_offset: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::new();

    // Ethernet header: dst mac, src mac, ethertype.
    buf.extend_from_slice(&[0u8; 6]);
    buf.extend_from_slice(&[0u8; 6]);
    buf.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

    // IPv4 header, 20 bytes, no options.
    let total_length = 20 + 20 + payload.len();
    buf.push(0x45); // version 4, IHL 5
    buf.push(0x00); // DSCP/ECN
    buf.extend_from_slice(&(total_length as u16).to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x00]); // identification
    buf.extend_from_slice(&frag_offset.to_be_bytes()); // flags + fragment offset
    buf.push(64); // TTL
    buf.push(TCP_PROTOCOL);
    buf.extend_from_slice(&[0x00, 0x00]); // checksum, unverified
    buf.extend_from_slice(&src_ip.octets());
    buf.extend_from_slice(&dst_ip.octets());

    // TCP header, 20 bytes, no options.
    buf.extend_from_slice(&src_port.to_be_bytes());
    buf.extend_from_slice(&dst_port.to_be_bytes());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&[0u8; 4]); // ack number, unused
    buf.push(0x50); // data offset 5, reserved bits 0
    buf.push(0x10); // flags: ACK
    buf.extend_from_slice(&[0xff, 0xff]); // window
    buf.extend_from_slice(&[0x00, 0x00]); // checksum, unverified
    buf.extend_from_slice(&[0x00, 0x00]); // urgent pointer

    buf.extend_from_slice(payload);
    buf
}

fn client() -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, 1)
}

fn server() -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, 2)
}

fn read_artifact(key: &FlowKey) -> Vec<u8> {
    let mut contents = Vec::new();
    std::fs::File::open(filename::format(key))
        .expect("artifact should exist")
        .read_to_end(&mut contents)
        .unwrap();
    contents
}

/// Scenario 1 (spec.md §8): single frame, payload "hello" at seq 1000, no prior ISN.
#[test]
#[serial]
fn single_frame_lands_at_offset_zero() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let data = frame(client(), server(), 4000, 80, 1000, 0, b"hello");
    let seg = packet::dissect(pcap::Linktype::ETHERNET, &data).expect("well-formed segment");
    assert_eq!(seg.seq, 1000);
    assert_eq!(seg.payload, b"hello");

    let mut table = FlowTable::new();
    let mut clock = LogicalClock::new();
    let mut writer = ArtifactWriter::new(ArtifactCache::new(8), None, false);

    let key = FlowKey::new(seg.src_addr, seg.dst_addr, seg.src_port, seg.dst_port);
    let outcome = writer.handle(&mut table, &mut clock, seg);
    assert!(matches!(outcome, Outcome::Written { bytes: 5 }));

    let record = table.get(&key).unwrap();
    assert_eq!(record.isn, 1000);

    assert_eq!(read_artifact(&key), b"hello");
}

/// Scenario 2: two in-order segments with a gap leave filesystem-zero bytes in between.
#[test]
#[serial]
fn gap_between_segments_is_left_as_zero() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let mut table = FlowTable::new();
    let mut clock = LogicalClock::new();
    let mut writer = ArtifactWriter::new(ArtifactCache::new(8), None, false);

    let first = frame(client(), server(), 4001, 80, 1000, 0, b"AAAA");
    let second = frame(client(), server(), 4001, 80, 1008, 0, b"CCCC");

    let seg1 = packet::dissect(pcap::Linktype::ETHERNET, &first).unwrap();
    let key = FlowKey::new(seg1.src_addr, seg1.dst_addr, seg1.src_port, seg1.dst_port);
    writer.handle(&mut table, &mut clock, seg1);

    let seg2 = packet::dissect(pcap::Linktype::ETHERNET, &second).unwrap();
    writer.handle(&mut table, &mut clock, seg2);

    let contents = read_artifact(&key);
    assert_eq!(contents.len(), 12);
    assert_eq!(&contents[0..4], b"AAAA");
    assert_eq!(&contents[4..8], [0, 0, 0, 0]);
    assert_eq!(&contents[8..12], b"CCCC");
}

/// Scenario 3: the same two segments delivered in reverse order. The second segment's ISN
/// anchor is now 1008; the first segment's offset wraps into the pre-ISN guard window and is
/// dropped, matching the specification's documented limitation.
#[test]
#[serial]
fn reversed_segments_drop_the_earlier_one_as_pre_isn() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let mut table = FlowTable::new();
    let mut clock = LogicalClock::new();
    let mut writer = ArtifactWriter::new(ArtifactCache::new(8), None, false);

    let first = frame(client(), server(), 4002, 80, 1008, 0, b"CCCC");
    let second = frame(client(), server(), 4002, 80, 1000, 0, b"AAAA");

    let seg1 = packet::dissect(pcap::Linktype::ETHERNET, &first).unwrap();
    let key = FlowKey::new(seg1.src_addr, seg1.dst_addr, seg1.src_port, seg1.dst_port);
    let outcome1 = writer.handle(&mut table, &mut clock, seg1);
    assert!(matches!(outcome1, Outcome::Written { bytes: 4 }));

    let seg2 = packet::dissect(pcap::Linktype::ETHERNET, &second).unwrap();
    let outcome2 = writer.handle(&mut table, &mut clock, seg2);
    assert!(matches!(outcome2, Outcome::Dropped("pre_isn_wrap")));

    assert_eq!(table.get(&key).unwrap().isn, 1008);
    assert_eq!(read_artifact(&key), b"CCCC");
}

/// Scenario 4: a pure ACK (no payload) is dropped before it ever reaches the flow table.
#[test]
fn pure_ack_is_dropped_without_creating_a_flow() {
    let data = frame(client(), server(), 4003, 80, 1000, 0, b"");
    let result = packet::dissect(pcap::Linktype::ETHERNET, &data);
    assert!(matches!(result, Err(flowtap::error::DissectError::NoPayload)));
}

/// Scenario 5: an IPv4 fragment with a non-zero fragment offset is dropped.
#[test]
fn fragment_with_nonzero_offset_is_dropped() {
    let data = frame(client(), server(), 4004, 80, 1000, 5, b"hello");
    let result = packet::dissect(pcap::Linktype::ETHERNET, &data);
    assert!(matches!(result, Err(flowtap::error::DissectError::Fragment)));
}

/// Scenario 6: with a 6-byte cap, an 11-byte payload at seq 1 is truncated to 6 bytes and the
/// flow becomes FINISHED; anything further is silently dropped.
#[test]
#[serial]
fn byte_cap_truncates_and_finishes_the_flow() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let mut table = FlowTable::new();
    let mut clock = LogicalClock::new();
    let mut writer = ArtifactWriter::new(ArtifactCache::new(8), Some(6), false);

    let data = frame(client(), server(), 4005, 80, 1, 0, b"HELLO_WORLD");
    let seg = packet::dissect(pcap::Linktype::ETHERNET, &data).unwrap();
    let key = FlowKey::new(seg.src_addr, seg.dst_addr, seg.src_port, seg.dst_port);
    let outcome = writer.handle(&mut table, &mut clock, seg);
    assert!(matches!(outcome, Outcome::Written { bytes: 6 }));
    assert!(table.get(&key).unwrap().finished);
    assert_eq!(read_artifact(&key), b"HELLO_");

    let later = frame(client(), server(), 4005, 80, 20, 0, b"more");
    let seg2 = packet::dissect(pcap::Linktype::ETHERNET, &later).unwrap();
    let outcome2 = writer.handle(&mut table, &mut clock, seg2);
    assert!(matches!(outcome2, Outcome::Dropped("finished")));
}

/// Wrap property (spec.md §8): a flow whose ISN sits near the top of the sequence space wraps
/// cleanly into a small, contiguous artifact.
#[test]
#[serial]
fn sequence_wrap_places_bytes_contiguously() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let mut table = FlowTable::new();
    let mut clock = LogicalClock::new();
    let mut writer = ArtifactWriter::new(ArtifactCache::new(8), None, false);

    let isn: u32 = 0xFFFFFF00;
    let payload: Vec<u8> = (0..=255u16).map(|b| (b % 256) as u8).collect();
    let data = frame(client(), server(), 4006, 80, isn, 0, &payload);
    let seg = packet::dissect(pcap::Linktype::ETHERNET, &data).unwrap();
    let key = FlowKey::new(seg.src_addr, seg.dst_addr, seg.src_port, seg.dst_port);
    writer.handle(&mut table, &mut clock, seg);

    let contents = read_artifact(&key);
    assert_eq!(contents.len(), 256);
    assert_eq!(contents, payload);
}

/// Eviction property: with `M = 2` and three flows each sending one segment round-robin, the
/// cache never holds more than two open handles, and every artifact still contains exactly the
/// bytes sent on its own flow (re-opening on later access overlays, it never loses data).
#[test]
#[serial]
fn eviction_bounds_open_handles_without_losing_bytes() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let mut table = FlowTable::new();
    let mut clock = LogicalClock::new();
    let mut writer = ArtifactWriter::new(ArtifactCache::new(2), None, false);

    let flows = [
        (5001u16, b"A"),
        (5002u16, b"B"),
        (5003u16, b"C"),
    ];

    for round in 0..2u32 {
        for (port, label) in flows.iter() {
            let data = frame(client(), server(), *port, 80, 1000 + round, 0, *label);
            let seg = packet::dissect(pcap::Linktype::ETHERNET, &data).unwrap();
            writer.handle(&mut table, &mut clock, seg);
            assert!(writer.cache().open_count() <= 2);
        }
    }

    for (port, label) in flows.iter() {
        let key = FlowKey::new(client(), server(), *port, 80);
        assert_eq!(&read_artifact(&key)[0..1], *label);
    }
}

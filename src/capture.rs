//! Packet capture parsing and epoch grouping
//!
//! Reads legacy pcap files (all four magics: micro/nanosecond timestamps,
//! either endianness), extracts one flow key per IPv4 packet, and groups
//! the resulting records into fixed-duration epochs. Packets without an
//! IPv4 layer, and packets whose extracted key is the null sentinel, are
//! skipped.

use std::fs::File;
use std::path::Path;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::data::{get_packetdata, PacketData};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, Linktype, PcapBlockOwned, PcapError};
use tracing::{debug, info, warn};

use crate::flow::FlowKey;

/// Nanosecond-precision legacy pcap magics (little/big endian).
const MAGIC_NANOSECONDS_LE: u32 = 0xa1b23c4d;
const MAGIC_NANOSECONDS_BE: u32 = 0x4d3cb2a1;

const READER_BUFFER_BYTES: usize = 1 << 20;

/// One parsed packet: its flow key and capture timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketRecord<K: FlowKey> {
    pub flow: K,
    pub timestamp_ns: u64,
}

/// Error reading or interpreting a capture file.
#[derive(Debug)]
pub enum CaptureError {
    Io(std::io::Error),
    Malformed(String),
}

impl core::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CaptureError::Io(err) => write!(f, "capture i/o error: {}", err),
            CaptureError::Malformed(msg) => write!(f, "malformed capture: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Io(err) => Some(err),
            CaptureError::Malformed(_) => None,
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

/// Read every IPv4 packet of a legacy pcap file, sorted by timestamp.
pub fn read_packets<K: FlowKey>(path: &Path) -> Result<Vec<PacketRecord<K>>, CaptureError> {
    let file = File::open(path)?;
    let mut reader = LegacyPcapReader::new(READER_BUFFER_BYTES, file)
        .map_err(|e| CaptureError::Malformed(format!("not a legacy pcap file: {:?}", e)))?;

    let mut packets = Vec::new();
    let mut linktype = Linktype::ETHERNET;
    let mut nanosecond_timestamps = false;
    let mut skipped = 0u64;

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        linktype = header.network;
                        nanosecond_timestamps = matches!(
                            header.magic_number,
                            MAGIC_NANOSECONDS_LE | MAGIC_NANOSECONDS_BE
                        );
                        debug!(
                            linktype = linktype.0,
                            nanosecond_timestamps, "read capture header"
                        );
                    }
                    PcapBlockOwned::Legacy(packet) => {
                        let timestamp_ns = u64::from(packet.ts_sec) * 1_000_000_000
                            + if nanosecond_timestamps {
                                u64::from(packet.ts_usec)
                            } else {
                                u64::from(packet.ts_usec) * 1_000
                            };
                        match extract_flow::<K>(packet.data, linktype, packet.caplen as usize) {
                            Some(flow) => packets.push(PacketRecord { flow, timestamp_ns }),
                            None => skipped += 1,
                        }
                    }
                    PcapBlockOwned::NG(_) => {
                        return Err(CaptureError::Malformed(
                            "pcapng block in a legacy capture".into(),
                        ));
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| CaptureError::Malformed(format!("truncated capture: {:?}", e)))?;
            }
            Err(e) => {
                return Err(CaptureError::Malformed(format!("{:?}", e)));
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "packets without a usable flow key were skipped");
    }

    packets.sort_by_key(|p| p.timestamp_ns);
    info!(packets = packets.len(), "parsed capture");
    Ok(packets)
}

/// Pull the flow key out of one captured frame. `None` for anything that
/// is not an IPv4 packet with a non-null key.
fn extract_flow<K: FlowKey>(data: &[u8], linktype: Linktype, caplen: usize) -> Option<K> {
    let sliced = match get_packetdata(data, linktype, caplen)? {
        PacketData::L2(bytes) => SlicedPacket::from_ethernet(bytes).ok()?,
        PacketData::L3(_, bytes) => SlicedPacket::from_ip(bytes).ok()?,
        _ => return None,
    };

    let ipv4 = match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => ipv4,
        _ => return None,
    };
    let header = ipv4.header();
    let src_ip = u32::from(header.source_addr());
    let dst_ip = u32::from(header.destination_addr());
    let protocol = header.protocol().0;

    let (src_port, dst_port) = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => (tcp.source_port(), tcp.destination_port()),
        Some(TransportSlice::Udp(udp)) => (udp.source_port(), udp.destination_port()),
        _ => (0, 0),
    };

    let key = K::from_parts(src_ip, dst_ip, src_port, dst_port, protocol);
    if key.is_null() {
        None
    } else {
        Some(key)
    }
}

/// Split timestamp-sorted packets into fixed-duration epochs.
///
/// The first epoch starts at the first packet's timestamp and subsequent
/// starts advance by `epoch_duration_ns`. A duration of 0 yields a single
/// epoch holding everything. Windows that received no packets are omitted.
pub fn group_into_epochs<K: FlowKey>(
    packets: Vec<PacketRecord<K>>,
    epoch_duration_ns: u64,
) -> Vec<Vec<PacketRecord<K>>> {
    if packets.is_empty() {
        return Vec::new();
    }
    if epoch_duration_ns == 0 {
        return vec![packets];
    }

    let mut epochs: Vec<Vec<PacketRecord<K>>> = vec![Vec::new()];
    let mut epoch_start = packets[0].timestamp_ns;

    for packet in packets {
        while packet.timestamp_ns - epoch_start >= epoch_duration_ns {
            epoch_start += epoch_duration_ns;
            epochs.push(Vec::new());
        }
        if let Some(current) = epochs.last_mut() {
            current.push(packet);
        }
    }

    epochs.retain(|epoch| !epoch.is_empty());
    epochs
}

//! Bounded packet ingestion from capture files.
//!
//! `CaptureReader` streams records out of a pcap or pcapng file and yields
//! only frames that carry an IPv4/IPv6 header. Reading stops as soon as the
//! packet or wall-clock budget is exhausted. A structural failure of the
//! streaming parser triggers a single fallback to an in-memory parse of the
//! whole file, which resumes after the records already consumed.

use std::fs::{self, File};
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use etherparse::{NetSlice, SlicedPacket};
use log::{debug, info, warn};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{create_reader, Block, Linktype, PcapBlockOwned, PcapCapture, PcapError};
use serde::Serialize;
use thiserror::Error;

use crate::models::CaptureConfig;

const READER_CAPACITY: usize = 1 << 20;
const MAX_STALLED_REFILLS: u8 = 3;
const SLL_HEADER_LEN: usize = 16;

/// Errors that can occur while reading a capture file
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture file not found: {0}")]
    NotFound(PathBuf),
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unreadable capture {path}: {reason}")]
    Structural { path: PathBuf, reason: String },
}

/// Resource budget for one pass over a capture
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    pub max_packets: u64,
    pub max_duration: Duration,
    pub progress_every: u64,
}

impl From<&CaptureConfig> for CaptureLimits {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            max_packets: config.max_packets,
            max_duration: Duration::from_secs(config.max_duration_secs),
            progress_every: config.progress_every,
        }
    }
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_packets: 200_000,
            max_duration: Duration::from_secs(20),
            progress_every: 50_000,
        }
    }
}

/// Why a pass ended before the end of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    PacketLimit,
    TimeLimit,
}

/// Counters describing a (possibly unfinished) pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub records_read: u64,
    pub frames_yielded: u64,
    pub skipped_non_ip: u64,
    pub skipped_malformed: u64,
    pub fallback_used: bool,
    pub stop_reason: Option<StopReason>,
}

/// A captured frame together with its decoded network-layer source
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub linktype: Linktype,
    source: Option<IpAddr>,
}

impl CapturedFrame {
    pub fn has_network_layer(&self) -> bool {
        self.source.is_some()
    }

    pub fn source_address(&self) -> Option<IpAddr> {
        self.source
    }
}

struct RawRecord {
    linktype: Linktype,
    data: Vec<u8>,
}

enum Source {
    Streaming {
        reader: Box<dyn PcapReaderIterator>,
        linktype: Linktype,
        stalls: u8,
    },
    Buffered(std::vec::IntoIter<RawRecord>),
    Done,
}

enum Step {
    Block(usize, Option<RawRecord>),
    Refill,
    Eof,
    Failed(String),
}

enum Decoded {
    Network(IpAddr),
    NoNetworkLayer,
    Malformed,
}

/// Lazy, finite, non-restartable sequence of network-layer frames
pub struct CaptureReader {
    path: PathBuf,
    limits: CaptureLimits,
    source: Source,
    started: Instant,
    stats: CaptureStats,
}

impl CaptureReader {
    /// Open `path` for a bounded pass
    ///
    /// Fails with `CaptureError::NotFound` when the file is absent. An empty
    /// file is an empty capture.
    pub fn open(path: impl AsRef<Path>, limits: CaptureLimits) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let metadata = fs::metadata(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CaptureError::NotFound(path.clone())
            } else {
                CaptureError::Io { path: path.clone(), source }
            }
        })?;

        let mut capture = Self {
            path,
            limits,
            source: Source::Done,
            started: Instant::now(),
            stats: CaptureStats::default(),
        };

        if metadata.len() == 0 {
            debug!("Capture {} is empty", capture.path.display());
            return Ok(capture);
        }

        let file = File::open(&capture.path).map_err(|source| CaptureError::Io {
            path: capture.path.clone(),
            source,
        })?;

        match create_reader(READER_CAPACITY, file) {
            Ok(reader) => {
                capture.source = Source::Streaming {
                    reader,
                    linktype: Linktype::ETHERNET,
                    stalls: 0,
                };
            }
            Err(e) => {
                let cause = format!("streaming reader rejected file: {:?}", e);
                capture.source = capture.fallback(cause)?;
            }
        }

        Ok(capture)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stats.stop_reason
    }

    /// Parse the whole file in memory, skipping records already consumed
    fn fallback(&mut self, cause: String) -> Result<Source, CaptureError> {
        if self.stats.fallback_used {
            return Err(CaptureError::Structural {
                path: self.path.clone(),
                reason: cause,
            });
        }
        self.stats.fallback_used = true;
        warn!(
            "Streaming read of {} failed ({}); retrying with a full-file parse",
            self.path.display(),
            cause
        );

        let data = fs::read(&self.path).map_err(|source| CaptureError::Io {
            path: self.path.clone(),
            source,
        })?;
        let capture = match PcapCapture::from_file(&data) {
            Ok(capture) => capture,
            Err(e) => {
                return Err(CaptureError::Structural {
                    path: self.path.clone(),
                    reason: format!("{}; full-file parse failed: {:?}", cause, e),
                })
            }
        };

        let linktype = capture.header.network;
        let records: Vec<RawRecord> = capture
            .blocks
            .iter()
            .skip(self.stats.records_read as usize)
            .map(|block| RawRecord {
                linktype,
                data: block.data.to_vec(),
            })
            .collect();
        debug!("Full-file parse recovered {} remaining records", records.len());

        Ok(Source::Buffered(records.into_iter()))
    }

    fn next_record(&mut self) -> Option<Result<RawRecord, CaptureError>> {
        loop {
            let cause = match &mut self.source {
                Source::Done => return None,
                Source::Buffered(records) => match records.next() {
                    Some(record) => {
                        self.stats.records_read += 1;
                        return Some(Ok(record));
                    }
                    None => {
                        self.source = Source::Done;
                        return None;
                    }
                },
                Source::Streaming { reader, linktype, stalls } => {
                    let step = match reader.next() {
                        Ok((offset, block)) => {
                            let record = match block {
                                PcapBlockOwned::LegacyHeader(header) => {
                                    *linktype = header.network;
                                    None
                                }
                                PcapBlockOwned::Legacy(packet) => Some(RawRecord {
                                    linktype: *linktype,
                                    data: packet.data.to_vec(),
                                }),
                                PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                                    *linktype = idb.linktype;
                                    None
                                }
                                PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                                    let len = (epb.caplen as usize).min(epb.data.len());
                                    Some(RawRecord {
                                        linktype: *linktype,
                                        data: epb.data[..len].to_vec(),
                                    })
                                }
                                PcapBlockOwned::NG(Block::SimplePacket(spb)) => Some(RawRecord {
                                    linktype: *linktype,
                                    data: spb.data.to_vec(),
                                }),
                                PcapBlockOwned::NG(_) => None,
                            };
                            Step::Block(offset, record)
                        }
                        Err(PcapError::Eof) => Step::Eof,
                        Err(PcapError::Incomplete { .. }) => Step::Refill,
                        Err(e) => Step::Failed(format!("{:?}", e)),
                    };

                    match step {
                        Step::Block(offset, record) => {
                            reader.consume(offset);
                            *stalls = 0;
                            if let Some(record) = record {
                                self.stats.records_read += 1;
                                return Some(Ok(record));
                            }
                            continue;
                        }
                        Step::Eof => {
                            self.source = Source::Done;
                            return None;
                        }
                        Step::Refill => {
                            *stalls += 1;
                            if *stalls > MAX_STALLED_REFILLS {
                                format!("truncated record after {} records", self.stats.records_read)
                            } else {
                                match reader.refill() {
                                    Ok(()) => continue,
                                    Err(e) => format!("refill failed: {:?}", e),
                                }
                            }
                        }
                        Step::Failed(cause) => cause,
                    }
                }
            };

            match self.fallback(cause) {
                Ok(source) => self.source = source,
                Err(e) => {
                    self.source = Source::Done;
                    return Some(Err(e));
                }
            }
        }
    }

    fn stop(&mut self, reason: StopReason) {
        match reason {
            StopReason::TimeLimit => warn!(
                "Stopping early: exceeded {:?}, {} frames scanned",
                self.limits.max_duration, self.stats.frames_yielded
            ),
            StopReason::PacketLimit => warn!(
                "Stopping early: reached {} frames",
                self.limits.max_packets
            ),
        }
        self.stats.stop_reason = Some(reason);
        self.source = Source::Done;
    }
}

impl Iterator for CaptureReader {
    type Item = Result<CapturedFrame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.next_record()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };

            if self.started.elapsed() >= self.limits.max_duration {
                self.stop(StopReason::TimeLimit);
                return None;
            }
            if self.stats.frames_yielded >= self.limits.max_packets {
                self.stop(StopReason::PacketLimit);
                return None;
            }

            match decode_source(record.linktype, &record.data) {
                Decoded::Network(source) => {
                    self.stats.frames_yielded += 1;
                    let every = self.limits.progress_every;
                    if every > 0 && self.stats.frames_yielded % every == 0 {
                        info!(
                            "Processed {} frames in {:.1}s",
                            self.stats.frames_yielded,
                            self.started.elapsed().as_secs_f64()
                        );
                    }
                    return Some(Ok(CapturedFrame {
                        data: record.data,
                        linktype: record.linktype,
                        source: Some(source),
                    }));
                }
                Decoded::NoNetworkLayer => self.stats.skipped_non_ip += 1,
                Decoded::Malformed => {
                    self.stats.skipped_malformed += 1;
                    debug!("Skipping malformed frame #{}", self.stats.records_read);
                }
            }
        }
    }
}

fn decode_source(linktype: Linktype, data: &[u8]) -> Decoded {
    let sliced = if linktype == Linktype::RAW
        || linktype == Linktype::IPV4
        || linktype == Linktype::IPV6
    {
        SlicedPacket::from_ip(data).map_err(|_| ())
    } else if linktype == Linktype::LINUX_SLL {
        if data.len() < SLL_HEADER_LEN {
            return Decoded::Malformed;
        }
        match u16::from_be_bytes([data[14], data[15]]) {
            0x0800 | 0x86dd => SlicedPacket::from_ip(&data[SLL_HEADER_LEN..]).map_err(|_| ()),
            _ => return Decoded::NoNetworkLayer,
        }
    } else {
        SlicedPacket::from_ethernet(data).map_err(|_| ())
    };

    match sliced {
        Ok(packet) => match packet.net {
            Some(NetSlice::Ipv4(ipv4)) => Decoded::Network(IpAddr::V4(ipv4.header().source_addr())),
            Some(NetSlice::Ipv6(ipv6)) => Decoded::Network(IpAddr::V6(ipv6.header().source_addr())),
            #[allow(unreachable_patterns)]
            _ => Decoded::NoNetworkLayer,
        },
        Err(()) => Decoded::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn global_header(network: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&network.to_le_bytes());
        out
    }

    fn record(out: &mut Vec<u8>, frame: &[u8]) {
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(frame);
    }

    fn ipv4_udp(src: Ipv4Addr) -> Vec<u8> {
        let mut ip = vec![0x45, 0, 0, 28, 0, 0, 0, 0, 64, 17, 0, 0];
        ip.extend_from_slice(&src.octets());
        ip.extend_from_slice(&[192, 168, 1, 1]);
        ip.extend_from_slice(&[0x30, 0x39, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00]);
        ip
    }

    fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]);
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    fn ipv6_udp(src: Ipv6Addr) -> Vec<u8> {
        let mut ip = vec![0x60, 0, 0, 0, 0x00, 0x08, 17, 64];
        ip.extend_from_slice(&src.octets());
        ip.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        ip.extend_from_slice(&[0x30, 0x39, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00]);
        ip
    }

    fn linux_sll(protocol: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0, 0, 0, 1, 0, 6, 0x02, 0, 0, 0, 0, 1, 0, 0];
        frame.extend_from_slice(&protocol.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    fn ng_block(out: &mut Vec<u8>, block_type: u32, body: &[u8]) {
        let mut padded = body.to_vec();
        while padded.len() % 4 != 0 {
            padded.push(0);
        }
        let total = (padded.len() + 12) as u32;
        out.extend_from_slice(&block_type.to_le_bytes());
        out.extend_from_slice(&total.to_le_bytes());
        out.extend_from_slice(&padded);
        out.extend_from_slice(&total.to_le_bytes());
    }

    fn pcapng(linktype: u16, frames: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut shb = Vec::new();
        shb.extend_from_slice(&0x1a2b_3c4du32.to_le_bytes());
        shb.extend_from_slice(&1u16.to_le_bytes());
        shb.extend_from_slice(&0u16.to_le_bytes());
        shb.extend_from_slice(&(-1i64).to_le_bytes());
        ng_block(&mut out, 0x0a0d_0d0a, &shb);

        let mut idb = Vec::new();
        idb.extend_from_slice(&linktype.to_le_bytes());
        idb.extend_from_slice(&0u16.to_le_bytes());
        idb.extend_from_slice(&65535u32.to_le_bytes());
        ng_block(&mut out, 1, &idb);

        for frame in frames {
            let mut epb = Vec::new();
            epb.extend_from_slice(&0u32.to_le_bytes());
            epb.extend_from_slice(&0u32.to_le_bytes());
            epb.extend_from_slice(&1u32.to_le_bytes());
            epb.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            epb.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            epb.extend_from_slice(frame);
            ng_block(&mut out, 6, &epb);
        }
        out
    }

    fn write_capture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    fn limits(max_packets: u64) -> CaptureLimits {
        CaptureLimits {
            max_packets,
            max_duration: Duration::from_secs(60),
            progress_every: 0,
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = CaptureReader::open(dir.path().join("absent.pcap"), limits(10));
        assert!(matches!(result, Err(CaptureError::NotFound(_))));
    }

    #[test]
    fn test_empty_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "empty.pcap", &[]);
        let mut reader = CaptureReader::open(&path, limits(10)).unwrap();
        assert!(reader.next().is_none());
        assert_eq!(reader.stats().frames_yielded, 0);
        assert_eq!(reader.stop_reason(), None);
    }

    #[test]
    fn test_filters_non_ip_and_skips_malformed() {
        let mut bytes = global_header(1);
        record(&mut bytes, &ethernet(0x0800, &ipv4_udp(Ipv4Addr::new(10, 0, 0, 5))));
        record(&mut bytes, &ethernet(0x88b5, &[1, 2, 3, 4]));
        record(&mut bytes, &ethernet(0x0800, &[0x45, 0, 0]));
        record(&mut bytes, &ethernet(0x0800, &ipv4_udp(Ipv4Addr::new(10, 0, 0, 9))));

        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "mixed.pcap", &bytes);
        let mut reader = CaptureReader::open(&path, limits(100)).unwrap();
        let sources: Vec<IpAddr> = reader
            .by_ref()
            .map(|frame| frame.unwrap().source_address().unwrap())
            .collect();

        assert_eq!(
            sources,
            vec![
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            ]
        );
        let stats = reader.stats();
        assert_eq!(stats.records_read, 4);
        assert_eq!(stats.skipped_non_ip, 1);
        assert_eq!(stats.skipped_malformed, 1);
        assert!(!stats.fallback_used);
    }

    #[test]
    fn test_packet_limit_stops_early() {
        let mut bytes = global_header(1);
        for _ in 0..10 {
            record(&mut bytes, &ethernet(0x0800, &ipv4_udp(Ipv4Addr::new(10, 0, 0, 5))));
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "ten.pcap", &bytes);

        let mut reader = CaptureReader::open(&path, limits(3)).unwrap();
        let count = reader.by_ref().filter(|f| f.is_ok()).count();
        assert_eq!(count, 3);
        assert_eq!(reader.stop_reason(), Some(StopReason::PacketLimit));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_exact_packet_budget_is_not_an_early_stop() {
        let mut bytes = global_header(1);
        for _ in 0..3 {
            record(&mut bytes, &ethernet(0x0800, &ipv4_udp(Ipv4Addr::new(10, 0, 0, 5))));
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "three.pcap", &bytes);

        let mut reader = CaptureReader::open(&path, limits(3)).unwrap();
        assert_eq!(reader.by_ref().count(), 3);
        assert_eq!(reader.stop_reason(), None);
    }

    #[test]
    fn test_time_limit_stops_early() {
        let mut bytes = global_header(1);
        record(&mut bytes, &ethernet(0x0800, &ipv4_udp(Ipv4Addr::new(10, 0, 0, 5))));
        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "one.pcap", &bytes);

        let budget = CaptureLimits {
            max_packets: 100,
            max_duration: Duration::ZERO,
            progress_every: 0,
        };
        let mut reader = CaptureReader::open(&path, budget).unwrap();
        assert!(reader.next().is_none());
        assert_eq!(reader.stop_reason(), Some(StopReason::TimeLimit));
    }

    #[test]
    fn test_raw_ip_linktype() {
        let mut bytes = global_header(101);
        record(&mut bytes, &ipv4_udp(Ipv4Addr::new(172, 16, 0, 2)));
        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "raw.pcap", &bytes);

        let frames: Vec<CapturedFrame> = CaptureReader::open(&path, limits(10))
            .unwrap()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].has_network_layer());
        assert_eq!(frames[0].source_address(), Some(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 2))));
    }

    #[test]
    fn test_garbage_file_fails_after_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "junk.pcap", b"this is definitely not a capture file");
        match CaptureReader::open(&path, limits(10)) {
            Err(CaptureError::Structural { reason, .. }) => {
                assert!(reason.contains("full-file parse failed"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("garbage accepted as capture"),
        }
    }

    #[test]
    fn test_truncated_final_record_recovers_via_full_parse() {
        let mut bytes = global_header(1);
        for last in [1, 2, 3] {
            record(&mut bytes, &ethernet(0x0800, &ipv4_udp(Ipv4Addr::new(10, 0, 0, last))));
        }
        // Record header promising 60 bytes followed by only 10
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&60u32.to_le_bytes());
        bytes.extend_from_slice(&60u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 10]);

        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "truncated.pcap", &bytes);
        let mut reader = CaptureReader::open(&path, limits(100)).unwrap();
        let frames: Vec<Result<CapturedFrame, CaptureError>> = reader.by_ref().collect();

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.is_ok()));
        let stats = reader.stats();
        assert!(stats.fallback_used);
        assert_eq!(stats.frames_yielded, 3);
        assert_eq!(stats.records_read, 3);
    }

    #[test]
    fn test_pcapng_enhanced_packets() {
        let frames = vec![
            ethernet(0x0800, &ipv4_udp(Ipv4Addr::new(10, 0, 0, 5))),
            ethernet(0x0806, &[0u8; 28]),
            // Odd length exercises block padding
            ethernet(0x0800, &{
                let mut ip = ipv4_udp(Ipv4Addr::new(10, 0, 0, 9));
                ip[3] = 29;
                ip.push(0xaa);
                ip
            }),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "trace.pcapng", &pcapng(1, &frames));

        let mut reader = CaptureReader::open(&path, limits(100)).unwrap();
        let sources: Vec<IpAddr> = reader
            .by_ref()
            .map(|frame| frame.unwrap().source_address().unwrap())
            .collect();

        assert_eq!(
            sources,
            vec![
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            ]
        );
        assert_eq!(reader.stats().skipped_non_ip, 1);
        assert!(!reader.stats().fallback_used);
    }

    #[test]
    fn test_pcapng_interface_linktype_applies() {
        let frames = vec![ipv4_udp(Ipv4Addr::new(172, 16, 0, 2))];
        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "raw.pcapng", &pcapng(101, &frames));

        let frames: Vec<CapturedFrame> = CaptureReader::open(&path, limits(10))
            .unwrap()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].linktype, Linktype::RAW);
        assert_eq!(frames[0].source_address(), Some(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 2))));
    }

    #[test]
    fn test_linux_cooked_capture() {
        let src6: Ipv6Addr = "2001:db8::7".parse().unwrap();
        let mut bytes = global_header(113);
        record(&mut bytes, &linux_sll(0x0800, &ipv4_udp(Ipv4Addr::new(10, 1, 1, 1))));
        record(&mut bytes, &linux_sll(0x86dd, &ipv6_udp(src6)));
        record(&mut bytes, &linux_sll(0x0806, &[0u8; 28]));
        record(&mut bytes, &[0u8; 8]);

        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "cooked.pcap", &bytes);
        let mut reader = CaptureReader::open(&path, limits(100)).unwrap();
        let sources: Vec<IpAddr> = reader
            .by_ref()
            .map(|frame| frame.unwrap().source_address().unwrap())
            .collect();

        assert_eq!(sources, vec![IpAddr::V4(Ipv4Addr::new(10, 1, 1, 1)), IpAddr::V6(src6)]);
        assert_eq!(reader.stats().skipped_non_ip, 1);
        assert_eq!(reader.stats().skipped_malformed, 1);
    }

    #[test]
    fn test_ipv6_sources_over_ethernet() {
        let src6: Ipv6Addr = "fe80::1".parse().unwrap();
        let mut bytes = global_header(1);
        record(&mut bytes, &ethernet(0x86dd, &ipv6_udp(src6)));
        record(&mut bytes, &ethernet(0x86dd, &ipv6_udp(src6)));

        let dir = tempfile::tempdir().unwrap();
        let path = write_capture(dir.path(), "v6.pcap", &bytes);
        let frames: Vec<CapturedFrame> = CaptureReader::open(&path, limits(10))
            .unwrap()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.source_address() == Some(IpAddr::V6(src6))));
    }
}

//! Helpers building small legacy pcap files for integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub const LINKTYPE_ETHERNET: u32 = 1;

/// Little-endian pcap builder with microsecond timestamps
pub struct PcapBuilder {
    bytes: Vec<u8>,
}

impl PcapBuilder {
    pub fn new(network: u32) -> Self {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&65535u32.to_le_bytes());
        bytes.extend_from_slice(&network.to_le_bytes());
        Self { bytes }
    }

    pub fn frame(mut self, frame: &[u8]) -> Self {
        self.bytes.extend_from_slice(&1u32.to_le_bytes());
        self.bytes.extend_from_slice(&0u32.to_le_bytes());
        self.bytes.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(frame);
        self
    }

    /// Append `count` Ethernet/IPv4/UDP frames from `src`
    pub fn udp_from(mut self, src: Ipv4Addr, count: usize) -> Self {
        let frame = ethernet_ipv4_udp(src);
        for _ in 0..count {
            self = self.frame(&frame);
        }
        self
    }

    pub fn write(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, &self.bytes).unwrap();
        path
    }
}

pub fn ethernet_ipv4_udp(src: Ipv4Addr) -> Vec<u8> {
    let mut frame = vec![0xff; 6];
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]);
    frame.extend_from_slice(&0x0800u16.to_be_bytes());
    frame.extend_from_slice(&[0x45, 0, 0, 28, 0, 0, 0, 0, 64, 17, 0, 0]);
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&[192, 168, 1, 1]);
    frame.extend_from_slice(&[0x30, 0x39, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00]);
    frame
}

/// Two-class tree: more than `split` packets scores 0.9, otherwise 0.1
pub fn write_threshold_model(dir: &Path, split: u64) -> PathBuf {
    let path = dir.join("model.json");
    let document = serde_json::json!({
        "kind": "decision_tree",
        "splits": [split as f64],
        "leaves": [[0.9, 0.1], [0.1, 0.9]],
    });
    fs::write(&path, document.to_string()).unwrap();
    path
}

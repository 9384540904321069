//! Per-source frame counting over a bounded capture pass.

use std::collections::HashMap;
use std::net::IpAddr;

use log::debug;

use crate::core::capture::{CaptureError, CapturedFrame};
use crate::models::SourceTraffic;

/// Count table owned by a single run
#[derive(Debug, Default)]
pub struct TrafficAggregator {
    counts: HashMap<IpAddr, u64>,
    frames: u64,
}

impl TrafficAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one frame; frames without a network-layer source are ignored
    pub fn observe(&mut self, frame: &CapturedFrame) {
        if let Some(source) = frame.source_address() {
            self.record(source);
        }
    }

    pub fn record(&mut self, source: IpAddr) {
        *self.counts.entry(source).or_insert(0) += 1;
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn distinct_sources(&self) -> usize {
        self.counts.len()
    }

    /// Consume `frames` to exhaustion and return the table
    ///
    /// A stage-level capture failure aborts the pass.
    pub fn aggregate<I>(frames: I) -> Result<Vec<SourceTraffic>, CaptureError>
    where
        I: IntoIterator<Item = Result<CapturedFrame, CaptureError>>,
    {
        let mut aggregator = Self::new();
        for frame in frames {
            aggregator.observe(&frame?);
        }
        debug!(
            "Aggregated {} frames from {} sources",
            aggregator.frames(),
            aggregator.distinct_sources()
        );
        Ok(aggregator.into_table())
    }

    /// Table ordered by descending count, then address
    pub fn into_table(self) -> Vec<SourceTraffic> {
        let mut table: Vec<SourceTraffic> = self
            .counts
            .into_iter()
            .map(|(source_address, packet_count)| SourceTraffic {
                source_address,
                packet_count,
            })
            .collect();
        table.sort_by(|a, b| {
            b.packet_count
                .cmp(&a.packet_count)
                .then_with(|| a.source_address.cmp(&b.source_address))
        });
        table
    }
}

//! Statistics reported by the simulation.

use std::collections::HashMap;

use bytes::Bytes;
use uuid::{uuid, Uuid};

use super::{IncomingMessage, SideChannel};
use crate::error::Result;

const CHANNEL_ID: Uuid = uuid!("a1d8f7b7-cec8-50f9-b78b-d3e165a78520");

/// How a reported statistic should be summarised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsAggregationMethod {
    /// Mean over the summary period
    Average,
    /// Only the latest value matters
    MostRecent,
    /// Total over the summary period
    Sum,
    /// Distribution over the summary period
    Histogram,
}

impl StatsAggregationMethod {
    fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Average),
            1 => Some(Self::MostRecent),
            2 => Some(Self::Sum),
            3 => Some(Self::Histogram),
            _ => None,
        }
    }
}

/// Receive-only channel collecting `key, value, aggregation` records
#[derive(Debug, Default)]
pub struct StatsSideChannel {
    stats: HashMap<String, Vec<(f32, StatsAggregationMethod)>>,
}

impl StatsSideChannel {
    /// Create the channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Well-known channel id
    pub fn id() -> Uuid {
        CHANNEL_ID
    }

    /// Statistics collected since the last call
    pub fn get_and_reset_stats(&mut self) -> HashMap<String, Vec<(f32, StatsAggregationMethod)>> {
        std::mem::take(&mut self.stats)
    }
}

impl SideChannel for StatsSideChannel {
    fn channel_id(&self) -> Uuid {
        CHANNEL_ID
    }

    fn on_message_received(&mut self, mut msg: IncomingMessage) -> Result<()> {
        let key = msg.read_string("");
        let value = msg.read_f32(0.0);
        let raw = msg.read_i32(0);
        let method = StatsAggregationMethod::from_wire(raw).unwrap_or_else(|| {
            tracing::warn!("Unknown stats aggregation method {raw} for {key}, using average");
            StatsAggregationMethod::Average
        });
        self.stats.entry(key).or_default().push((value, method));
        Ok(())
    }

    fn take_outgoing(&mut self) -> Vec<Bytes> {
        Vec::new()
    }
}

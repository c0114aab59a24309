//! Per-port channel control block.
//!
//! Mutable state shared by the receive pipeline and the transmit
//! scheduler for one radio port: the DC-offset tracker that centers the
//! raw ADC stream, the carrier-detect level, duplex/timing parameters,
//! and the packet counters surfaced through `get_status`.

/// Depth of the block-mean window used for DC offset tracking.
const DC_WINDOW_DEPTH: usize = 8;

/// Running DC average over the last `DC_WINDOW_DEPTH` block means, kept
/// as a circular window plus running sum so updates are O(1).
#[derive(Debug, Clone)]
pub struct DcTracker {
    window: [f32; DC_WINDOW_DEPTH],
    next: usize,
    filled: usize,
    sum: f32,
}

impl DcTracker {
    pub fn new() -> Self {
        Self {
            window: [0.0; DC_WINDOW_DEPTH],
            next: 0,
            filled: 0,
            sum: 0.0,
        }
    }

    /// Push one block's mean sample value (in ADC counts).
    pub fn push_block_mean(&mut self, mean: f32) {
        self.sum -= self.window[self.next];
        self.window[self.next] = mean;
        self.sum += mean;
        self.next = (self.next + 1) % DC_WINDOW_DEPTH;
        if self.filled < DC_WINDOW_DEPTH {
            self.filled += 1;
        }
    }

    /// Current average, in ADC counts.
    pub fn average(&self) -> f32 {
        if self.filled == 0 {
            0.0
        } else {
            self.sum / self.filled as f32
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for DcTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Packet and sample counters for one port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortCounters {
    /// CRC-valid frames delivered upward.
    pub rx_frames: u64,
    /// Subset of `rx_frames` that arrived through FX.25 correction.
    pub rx_fx25: u64,
    /// Captures rejected by the FCS check.
    pub crc_errors: u64,
    /// FX.25 blocks that could not be corrected.
    pub fec_failures: u64,
    /// Frames keyed out.
    pub tx_frames: u64,
}

/// Channel control block: one per radio port.
#[derive(Debug, Clone)]
pub struct ChannelControlBlock {
    pub dc: DcTracker,
    /// Last carrier-detect RMS estimate in millivolts.
    pub cd_level_mv: f32,
    /// Mirror of the carrier-detect hysteresis counter.
    pub cd_counter: i32,
    pub full_duplex: bool,
    /// Slot time in 10 ms units.
    pub slot_time: u32,
    /// TX delay in 10 ms units.
    pub tx_delay: u32,
    pub persist: u8,
    pub counters: PortCounters,
}

impl ChannelControlBlock {
    pub fn new(full_duplex: bool, slot_time: u32, tx_delay: u32, persist: u8) -> Self {
        Self {
            dc: DcTracker::new(),
            cd_level_mv: 0.0,
            cd_counter: 0,
            full_duplex,
            slot_time,
            tx_delay,
            persist,
            counters: PortCounters::default(),
        }
    }

    /// Remove the running DC average from a raw ADC block and feed the
    /// tracker with the block's mean. Returns normalized samples in
    /// [-1, 1].
    pub fn center_block(&mut self, raw: &[i16]) -> Vec<f32> {
        let offset = self.dc.average();
        let mean = raw.iter().map(|&s| s as f32).sum::<f32>() / raw.len().max(1) as f32;
        let out = raw
            .iter()
            .map(|&s| (s as f32 - offset) / 32768.0)
            .collect();
        self.dc.push_block_mean(mean);
        out
    }

    /// DC offset in ADC counts, as reported by `get_status`.
    pub fn dc_offset(&self) -> f32 {
        self.dc.average()
    }
}

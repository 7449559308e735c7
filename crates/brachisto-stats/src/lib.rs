//! Economy statistics for the Brachisto engine.
//!
//! Keeps lifetime totals of every flow the tick pipeline records
//! ([`CumulativeStats`]) and a bounded history of headline quantities sampled
//! every N ticks ([`StatsHistory`]) for trend display.
//!
//! # Usage
//!
//! ```ignore
//! let mut stats = StatsTracker::new(StatsConfig::default());
//! // After the systems ran:
//! stats.record_flows(&flows);
//! for event in &events { stats.process_event(event); }
//! stats.end_tick(&state, delta_days);
//! ```

use brachisto_core::context::FlowTotals;
use brachisto_core::event::EconomyEvent;
use brachisto_core::numeric::non_negative;
use brachisto_core::state::GameState;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Samples retained per series.
    pub history_capacity: usize,
    /// Ticks between two history samples.
    pub sample_interval_ticks: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            history_capacity: 256,
            sample_interval_ticks: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity ring buffer. When full the oldest entry is overwritten.
/// Iterates oldest to newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn latest(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let idx = if self.head == 0 { self.capacity() - 1 } else { self.head - 1 };
        Some(self.data[idx])
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = T> + '_ {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        let cap = self.capacity();
        (0..self.len).map(move |i| self.data[(start + i) % cap])
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.data.fill(T::default());
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Cumulative totals
// ---------------------------------------------------------------------------

/// Lifetime totals since the game started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CumulativeStats {
    pub days_simulated: f64,
    pub ticks: u64,
    pub mined_kg: f64,
    pub metal_kg: f64,
    pub slag_kg: f64,
    pub probes_built: f64,
    pub probes_recycled: f64,
    pub construction_kg: f64,
    pub dyson_kg: f64,
    pub recycled_metal_kg: f64,
    pub methalox_kg: f64,
    pub research_flop_days: f64,
    pub structures_completed: u64,
    pub zones_depleted: u64,
    pub shipments_delivered: u64,
    pub brownout_ticks: u64,
}

impl CumulativeStats {
    pub fn add_flows(&mut self, flows: &FlowTotals) {
        self.mined_kg += flows.mined_kg;
        self.metal_kg += flows.metal_kg;
        self.slag_kg += flows.slag_kg;
        self.probes_built += flows.probes_built;
        self.probes_recycled += flows.probes_recycled;
        self.construction_kg += flows.construction_kg;
        self.dyson_kg += flows.dyson_kg;
        self.recycled_metal_kg += flows.recycled_metal_kg;
        self.methalox_kg += flows.methalox_kg;
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One sampled point of the economy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    pub time_days: f64,
    pub total_probes: f64,
    pub stored_metal_kg: f64,
    pub dyson_mass_kg: f64,
    pub energy_net_w: f64,
    pub energy_throttle: f64,
    pub energy_stored_wd: f64,
    pub intelligence_flops: f64,
}

impl StatsSample {
    pub fn of_state(state: &GameState) -> Self {
        Self {
            time_days: state.time_days,
            total_probes: state.total_probes(),
            stored_metal_kg: state.zones.values().map(|z| z.stored_metal).sum(),
            dyson_mass_kg: state.dyson.mass_kg,
            energy_net_w: state.energy.net_w,
            energy_throttle: state.energy.throttle,
            energy_stored_wd: state.energy_storage.stored_wd,
            intelligence_flops: state.intelligence_flops,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsHistory {
    samples: RingBuffer<StatsSample>,
}

impl StatsHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
        }
    }

    pub fn push(&mut self, sample: StatsSample) {
        self.samples.push(sample);
    }

    pub fn latest(&self) -> Option<StatsSample> {
        self.samples.latest()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> Vec<StatsSample> {
        self.samples.to_vec()
    }

    /// One field of every sample, oldest first.
    pub fn series(&self, pick: impl Fn(&StatsSample) -> f64) -> Vec<f64> {
        self.samples.iter().map(|s| pick(&s)).collect()
    }
}

// ---------------------------------------------------------------------------
// StatsTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTracker {
    config: StatsConfig,
    cumulative: CumulativeStats,
    history: StatsHistory,
    ticks_since_sample: u64,
}

impl StatsTracker {
    pub fn new(config: StatsConfig) -> Self {
        let history = StatsHistory::new(config.history_capacity);
        Self {
            config,
            cumulative: CumulativeStats::default(),
            history,
            ticks_since_sample: 0,
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn cumulative(&self) -> &CumulativeStats {
        &self.cumulative
    }

    pub fn history(&self) -> &StatsHistory {
        &self.history
    }

    pub fn record_flows(&mut self, flows: &FlowTotals) {
        self.cumulative.add_flows(flows);
    }

    pub fn record_research(&mut self, flop_days: f64) {
        self.cumulative.research_flop_days += non_negative(flop_days);
    }

    pub fn process_event(&mut self, event: &EconomyEvent) {
        match event {
            EconomyEvent::ZoneDepleted { .. } => self.cumulative.zones_depleted += 1,
            EconomyEvent::StructureCompleted { .. } => self.cumulative.structures_completed += 1,
            EconomyEvent::ShipmentDelivered { .. } => self.cumulative.shipments_delivered += 1,
            EconomyEvent::ConstructionStopped { .. } => {}
        }
    }

    /// Close the tick: advance the clocks and sample the history when due.
    pub fn end_tick(&mut self, state: &GameState, delta_days: f64) {
        self.cumulative.ticks += 1;
        self.cumulative.days_simulated += non_negative(delta_days);
        if state.energy.throttle < 1.0 {
            self.cumulative.brownout_ticks += 1;
        }
        self.ticks_since_sample += 1;
        if self.ticks_since_sample >= self.config.sample_interval_ticks.max(1) {
            self.ticks_since_sample = 0;
            self.history.push(StatsSample::of_state(state));
        }
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

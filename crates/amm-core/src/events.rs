//! Event types delivered by the simulation middleware.
//!
//! Every event a module can receive is one variant of [`SimEvent`].  The
//! matching [`EventKind`] is the key used by the handler table, so a module
//! registers exactly one handler per kind and the compiler keeps the set of
//! kinds closed.

// ── Simulation control ────────────────────────────────────────────────────────

/// The four simulation-control commands a facilitator can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    /// Start or resume the simulation.
    Run,
    /// Pause the simulation.
    Halt,
    /// Return the simulation to its initial state.
    Reset,
    /// Persist the current simulation state.
    Save,
}

/// A simulation-control event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationControl {
    /// Which command was issued.
    pub control: ControlType,
    /// Wall-clock timestamp in milliseconds, when the publisher supplied one.
    pub timestamp_ms: Option<u64>,
}

impl SimulationControl {
    /// Creates a control event without a timestamp.
    pub fn new(control: ControlType) -> Self {
        Self {
            control,
            timestamp_ms: None,
        }
    }
}

// ── Ticks ─────────────────────────────────────────────────────────────────────

/// Heartbeat of the simulation clock, published once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Frame counter.  Starts at zero after a reset and increases while the
    /// simulation runs.
    pub frame: i64,
    /// Simulated seconds since start, when supplied.
    pub time: f64,
}

impl Tick {
    /// Creates a tick for `frame` with no simulated time.
    pub fn at_frame(frame: i64) -> Self {
        Self { frame, time: 0.0 }
    }
}

// ── Physiology data ───────────────────────────────────────────────────────────

/// A low-rate physiology channel update (heart rate, SpO2, sim time, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct PhysiologyValue {
    /// Channel name, e.g. `Cardiovascular_HeartRate`.
    pub name: String,
    /// Latest value.  The physiology engine publishes NaN for channels it has
    /// not computed yet.
    pub value: f64,
}

impl PhysiologyValue {
    /// Creates a value update for the named channel.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A high-rate waveform sample (ECG, pleth, capnogram, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct PhysiologyWaveform {
    /// Waveform channel name.
    pub name: String,
    /// Sample value.
    pub value: f64,
}

// ── Modifications ─────────────────────────────────────────────────────────────

/// A change in how the patient should be rendered (manikin, monitor, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderModification {
    /// Render state identifier, e.g. `PATIENT_STATE_TACHYCARDIA`.
    pub kind: String,
    /// Free-form payload, usually an XML document.
    pub data: String,
}

/// An instruction to change the patient's physiology.
///
/// `data` carries an XML document such as
/// `<PhysiologyModification type="AirwayObstruction"><Severity>0.5</Severity></PhysiologyModification>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysiologyModification {
    /// Modification type as labelled by the publisher.
    pub kind: String,
    /// XML instruction document.
    pub data: String,
}

// ── Closed event set ──────────────────────────────────────────────────────────

/// Discriminant of [`SimEvent`], used as the handler-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// [`SimEvent::Control`]
    SimulationControl,
    /// [`SimEvent::Tick`]
    Tick,
    /// [`SimEvent::Value`]
    PhysiologyValue,
    /// [`SimEvent::Waveform`]
    PhysiologyWaveform,
    /// [`SimEvent::RenderModification`]
    RenderModification,
    /// [`SimEvent::PhysiologyModification`]
    PhysiologyModification,
}

impl EventKind {
    /// Every kind, in registration order.
    pub const ALL: [EventKind; 6] = [
        EventKind::SimulationControl,
        EventKind::Tick,
        EventKind::PhysiologyValue,
        EventKind::PhysiologyWaveform,
        EventKind::RenderModification,
        EventKind::PhysiologyModification,
    ];
}

/// One event delivered by the middleware.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Simulation run/halt/reset/save.
    Control(SimulationControl),
    /// Simulation clock tick.
    Tick(Tick),
    /// Physiology channel value.
    Value(PhysiologyValue),
    /// Physiology waveform sample.
    Waveform(PhysiologyWaveform),
    /// Render modification.
    RenderModification(RenderModification),
    /// Physiology modification.
    PhysiologyModification(PhysiologyModification),
}

impl SimEvent {
    /// Returns the handler-table key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::Control(_) => EventKind::SimulationControl,
            SimEvent::Tick(_) => EventKind::Tick,
            SimEvent::Value(_) => EventKind::PhysiologyValue,
            SimEvent::Waveform(_) => EventKind::PhysiologyWaveform,
            SimEvent::RenderModification(_) => EventKind::RenderModification,
            SimEvent::PhysiologyModification(_) => EventKind::PhysiologyModification,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

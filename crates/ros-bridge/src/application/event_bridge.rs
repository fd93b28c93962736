//! The event bridge: middleware events in, rosbridge messages out.
//!
//! # Outbound pacing
//!
//! Physiology channels update several times per simulation tick.  Sending a
//! message per update would flood the peer, so the bridge only caches them.
//! One report goes out each time the `SIM_TIME` channel updates (once per
//! tick), carrying the latest cached heart rate.
//!
//! # Link
//!
//! The bridge only emits while it holds a link (the current connection
//! attempt's write queue).  The link is handed over when the websocket
//! handshake succeeds, at which point a greeting is sent, and taken away
//! when the attempt ends.
//!
//! # Shared state
//!
//! All mutable state sits behind one mutex.  Middleware handlers and the
//! connection's callbacks run on different tasks, and this lock is the only
//! place they meet.  Outbound text is formatted under the lock but handed to
//! the sink after it is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use amm_core::{
    ControlType, EventKind, HandlerTable, MiddlewareError, PhysiologyModification,
    PhysiologyValue, PhysiologyWaveform, RenderModification, SimEvent, SimulationControl, Tick,
};
use tracing::{debug, error, info, warn};

use crate::application::inbound::interpret_inbound;
use crate::application::physmod::{parse_physiology_modification, PhysmodAction, PhysmodError};
use crate::application::MessageSink;
use crate::domain::messages;
use crate::domain::simulation::{SimulationState, SimulationStatus};
use crate::domain::telemetry::{channels, TelemetryCache};

/// Number of waveform samples echoed to the log in verbose mode.
const WAVEFORM_SAMPLES_LOGGED: u32 = 10;

/// Render state that marks the patient as tachycardic.
const TACHYCARDIA_STATE: &str = "PATIENT_STATE_TACHYCARDIA";

struct BridgeState {
    telemetry: TelemetryCache,
    simulation: SimulationState,
    link: Option<Arc<dyn MessageSink>>,
    respiration_logged: bool,
    waveform_samples_left: u32,
}

/// Translates between the middleware and the peer.
pub struct EventBridge {
    state: Mutex<BridgeState>,
    verbose: bool,
}

impl EventBridge {
    /// Creates a bridge with a seeded telemetry cache, status Reset, and no
    /// link.
    pub fn new(verbose: bool) -> Self {
        Self {
            state: Mutex::new(BridgeState {
                telemetry: TelemetryCache::seeded(),
                simulation: SimulationState::default(),
                link: None,
                respiration_logged: false,
                waveform_samples_left: WAVEFORM_SAMPLES_LOGGED,
            }),
            verbose,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Link lifecycle ────────────────────────────────────────────────────────

    /// Adopts `link` as the active outbound path and greets the peer.
    pub fn on_link_established(&self, link: Arc<dyn MessageSink>) {
        self.lock().link = Some(Arc::clone(&link));
        match messages::greeting() {
            Ok(text) => {
                debug!("Writing message to ROS: {text}");
                link.send_text(text);
            }
            Err(e) => error!("failed to serialise greeting: {e}"),
        }
    }

    /// Drops the active link.  Reports stop until the next handshake.
    pub fn on_link_lost(&self) {
        self.lock().link = None;
    }

    /// Returns `true` while a link is held.
    pub fn is_linked(&self) -> bool {
        self.lock().link.is_some()
    }

    // ── Middleware events ─────────────────────────────────────────────────────

    /// Registers one handler per event kind, all routed to this bridge.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareError::DuplicateHandler`] if `table` already has a
    /// handler for any kind.
    pub fn register_handlers(
        self: &Arc<Self>,
        table: &mut HandlerTable,
    ) -> Result<(), MiddlewareError> {
        for kind in EventKind::ALL {
            let bridge = Arc::clone(self);
            table.register(kind, move |event| bridge.handle_event(event))?;
        }
        Ok(())
    }

    /// Routes `event` to its handler.
    pub fn handle_event(&self, event: SimEvent) {
        match event {
            SimEvent::Control(control) => self.on_simulation_control(&control),
            SimEvent::Tick(tick) => self.on_tick(&tick),
            SimEvent::Value(value) => self.on_physiology_value(&value),
            SimEvent::Waveform(sample) => self.on_physiology_waveform(&sample),
            SimEvent::RenderModification(m) => self.on_render_modification(&m),
            SimEvent::PhysiologyModification(m) => {
                self.on_physiology_modification(&m);
            }
        }
    }

    /// Applies a run/halt/reset/save command.  Reset also empties the
    /// telemetry cache.
    pub fn on_simulation_control(&self, control: &SimulationControl) {
        let mut state = self.lock();
        if control.control == ControlType::Reset {
            state.telemetry.clear();
        }
        match state.simulation.apply_control(control.control) {
            Some(SimulationStatus::Running) => info!("SimControl Message received; Run sim."),
            Some(SimulationStatus::Paused) => info!("SimControl Message received; Halt sim."),
            Some(SimulationStatus::Reset) => info!("SimControl Message received; Reset sim."),
            None => {}
        }
    }

    /// Records a tick and applies the auto-start rule.
    pub fn on_tick(&self, tick: &Tick) {
        let mut state = self.lock();
        let previous = state.simulation.watermark();
        if state.simulation.observe_tick(tick.frame) {
            debug!(
                "Tick received! sim_status: Reset->Running lastTick: {previous} tick.frame: {}",
                tick.frame
            );
        }
    }

    /// Caches a physiology value.  A `SIM_TIME` update also sends the
    /// heart-rate report when linked.
    pub fn on_physiology_value(&self, value: &PhysiologyValue) {
        let report = {
            let mut state = self.lock();

            if self.verbose
                && value.name == channels::RESPIRATION_RATE
                && !state.respiration_logged
            {
                debug!("[AMM_Node_Data] {}={}", value.name, value.value);
                state.respiration_logged = true;
            }

            if state.telemetry.update(&value.name, value.value).is_none()
                || value.name != channels::SIM_TIME
            {
                return;
            }

            let Some(link) = state.link.clone() else {
                return;
            };
            let heart_rate = state.telemetry.get(channels::HEART_RATE).unwrap_or_default();
            match messages::heart_rate_report(heart_rate) {
                Ok(text) => (link, text),
                Err(e) => {
                    error!("failed to serialise telemetry report: {e}");
                    return;
                }
            }
        };

        let (link, text) = report;
        debug!("Writing message to ROS: {text}");
        link.send_text(text);
    }

    /// Logs the first few waveform samples in verbose mode.
    pub fn on_physiology_waveform(&self, sample: &PhysiologyWaveform) {
        if !self.verbose {
            return;
        }
        let mut state = self.lock();
        if state.waveform_samples_left > 0 {
            debug!("[AMM_Node_Data](HF) {}={}", sample.name, sample.value);
            state.waveform_samples_left -= 1;
        }
    }

    /// Logs render modifications.
    pub fn on_render_modification(&self, modification: &RenderModification) {
        if modification.kind == TACHYCARDIA_STATE {
            debug!("Patient entered state: Tachycardia");
        } else {
            debug!("Render Modification received: {}", modification.kind);
        }
    }

    /// Interprets a physiology-modification instruction.
    ///
    /// Returns the recognised action, or `None` if the document was dropped.
    /// Unreadable XML is dropped silently; readable but incomplete documents
    /// are logged as anomalies.
    pub fn on_physiology_modification(
        &self,
        modification: &PhysiologyModification,
    ) -> Option<PhysmodAction> {
        match parse_physiology_modification(&modification.data) {
            Ok(action) => {
                match &action {
                    PhysmodAction::AirwayObstruction { severity } => info!(
                        "Physiology Modification received: AirwayObstruction. Severity: {severity}"
                    ),
                    PhysmodAction::Unhandled { kind } => debug!(
                        "Physiology Modification received: Type: {kind} Data: {}",
                        modification.data
                    ),
                }
                Some(action)
            }
            Err(PhysmodError::Xml(_)) => None,
            Err(e) => {
                warn!("Physiology Modification ignored ({e}): {}", modification.data);
                None
            }
        }
    }

    // ── Peer messages ─────────────────────────────────────────────────────────

    /// Handles one message body received from the peer.  Inbound traffic is
    /// only logged; it never changes bridge state or triggers a reply.
    pub fn on_wire_message(&self, body: &str) {
        interpret_inbound(body);
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    /// Current simulation status.
    pub fn status(&self) -> SimulationStatus {
        self.lock().simulation.status()
    }

    /// Frame number of the most recent tick.
    pub fn watermark(&self) -> i64 {
        self.lock().simulation.watermark()
    }

    /// Cached text for `channel`.
    pub fn telemetry_value(&self, channel: &str) -> Option<String> {
        self.lock().telemetry.get(channel).map(str::to_string)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

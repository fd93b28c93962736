//! Simulation status as observed from the middleware.
//!
//! ```text
//!            Run, or tick with frame > watermark
//!   Reset ─────────────────────────────────────────► Running
//!     ▲                                              │   ▲
//!     │ Reset (from any state)                  Halt │   │ Run
//!     │                                              ▼   │
//!     └────────────────────────────────────────────  Paused
//! ```
//!
//! The tick rule only applies while in `Reset`: the first live tick after a
//! reset (or after startup) means the simulation is running even if the Run
//! command was missed.  Paused is left only by an explicit Run.

use amm_core::ControlType;

/// Coarse simulation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationStatus {
    /// Initial state, and the state after a reset.
    #[default]
    Reset,
    /// Simulation clock is running.
    Running,
    /// Simulation clock is halted.
    Paused,
}

/// Status plus the tick watermark guarding the auto-start rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimulationState {
    status: SimulationStatus,
    watermark: i64,
}

impl SimulationState {
    /// Current status.
    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    /// Frame number of the most recent tick.
    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Applies a control command.
    ///
    /// Returns the new status, or `None` for commands that do not affect the
    /// status (Save).
    pub fn apply_control(&mut self, control: ControlType) -> Option<SimulationStatus> {
        let next = match control {
            ControlType::Run => SimulationStatus::Running,
            ControlType::Halt => SimulationStatus::Paused,
            ControlType::Reset => SimulationStatus::Reset,
            ControlType::Save => return None,
        };
        self.status = next;
        Some(next)
    }

    /// Records a tick.  The watermark always follows the tick's frame, so a
    /// frame counter restarted by a reset starts the simulation again on its
    /// second tick.
    ///
    /// Returns `true` if this tick moved the status from Reset to Running.
    pub fn observe_tick(&mut self, frame: i64) -> bool {
        let starts = self.status == SimulationStatus::Reset && frame > self.watermark;
        if starts {
            self.status = SimulationStatus::Running;
        }
        self.watermark = frame;
        starts
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

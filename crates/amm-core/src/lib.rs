//! # amm-core
//!
//! Shared types for modules that sit on the simulation-middleware bus.
//!
//! The middleware itself (transport, discovery, QoS) lives outside this
//! workspace.  This crate describes the boundary a module sees:
//!
//! - **`events`** – The closed set of event kinds a module can subscribe to
//!   (simulation control, ticks, physiology values and waveforms, render and
//!   physiology modifications), wrapped in the [`SimEvent`] enum.
//!
//! - **`module`** – The two documents every module publishes once at startup:
//!   its [`OperationalDescription`] and its [`ModuleConfiguration`].
//!
//! - **`bus`** – The [`Middleware`] trait, the one-handler-per-kind
//!   [`HandlerTable`], and [`LocalBus`], an in-process implementation that
//!   delivers events from a channel in arrival order.

pub mod bus;
pub mod events;
pub mod module;

pub use bus::{EventPublisher, HandlerTable, LocalBus, Middleware, MiddlewareError};
pub use events::{
    ControlType, EventKind, PhysiologyModification, PhysiologyValue, PhysiologyWaveform,
    RenderModification, SimEvent, SimulationControl, Tick,
};
pub use module::{ModuleConfiguration, ModuleId, OperationalDescription};

//! Zenoh bridge for RH-USB temperature/humidity sensors.
//!
//! This bridge polls a serial-attached sensor at a fixed cadence and
//! publishes each reading to Zenoh as a JSON document.
//!
//! # Data flow
//!
//! ```text
//! PollScheduler -> DeviceReader ("PA\r\n") -> DeviceReader (frame) -> Publisher -> Sink
//!                                                                        ^
//!                                                     ConnectionStateMachine
//! ```
//!
//! # Key Expressions
//!
//! ```text
//! <topic>            readings, e.g. nuc/temperature
//! <topic>/@/status   bridge status (running / offline / error)
//! ```

pub mod bridge;
pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod publisher;
pub mod scheduler;
pub mod sink;
pub mod status;

pub use bridge::{Bridge, BridgeStats};
pub use connection::{ConnectionState, ConnectionStateMachine, SinkEvent};
pub use device::{DeviceError, DeviceReader, FrameParser, ParseError};
pub use error::{BridgeError, Result};
pub use publisher::{PublishError, Publisher};
pub use scheduler::PollScheduler;
pub use sink::{MemorySink, PublishMessage, Sink, SinkError, ZenohSink};

//! MAKCU driver library - host-side control of the MAKCU USB-serial
//! mouse controller.
//!
//! The device speaks a line-oriented text protocol over a CDC-ACM link
//! whose speed is upgraded from 115200 to 4,000,000 baud at connect time.
//! This crate translates typed mouse-control intents into protocol
//! frames, correlates responses, surfaces asynchronous button events,
//! and supervises connection liveness.
//!
//! # Modules
//!
//! - `device`: Typed facade, batching, and connection supervision
//! - `engine`: Command emission and FIFO response correlation
//! - `transport`: Port enumeration, serial channel, mock endpoint
//! - `commands`: Pre-computed protocol command strings
//! - `protocol`: Wire constants and byte classification
//! - `error`: Error types with connection/validation classification
//!
//! # Example
//!
//! ```rust,no_run
//! use makcu::{Device, MouseButton};
//!
//! let device = Device::new();
//! if device.connect(None) {
//!     device.mouse_move(50, 0);
//!     device.click(MouseButton::Left);
//!     device.disconnect();
//! }
//! ```
#![forbid(unsafe_code)]

pub mod commands;
pub mod device;
pub mod engine;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod state;
pub mod transport;

pub use device::{
    mouse_button_to_string, string_to_mouse_button, BatchBuilder, ConnectionOptions,
    ConnectionStatus, Device, DeviceInfo, LockTarget, MouseButton, MouseButtonStates,
};
pub use error::{MakcuError, Result};

//! `checkin` - Event attendance by QR code scan or roster selection
//!
//! This library provides the roster store, the attendance ledger, the QR
//! decoder adapter, the check-in workflow that ties them together, and the
//! batch QR code generator.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod qrgen;
pub mod roster;
pub mod scanner;
pub mod workflow;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{AttendanceRecord, Ledger};
pub use logging::init_logging;
pub use qrgen::{GenerationReport, QrGenerator};
pub use roster::Roster;
pub use scanner::{FrameDecoder, FrameDirectory, QrDecoder, ScanResult};
pub use workflow::{CheckInWorkflow, Notice, ScanPhase};

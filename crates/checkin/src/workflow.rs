//! The check-in workflow.
//!
//! [`CheckInWorkflow`] owns the roster, the ledger and the scanner
//! collaborators, and drives the scan state machine:
//!
//! ```text
//!  Idle ──start──▶ Scanning ──decode(known)──▶ Idle (+ check-in)
//!   ▲                │  │
//!   └──────stop──────┘  └──decode(unknown)──▶ AwaitingManualResolution
//!   ▲                                            │
//!   └───────────────confirm / abandon────────────┘
//! ```
//!
//! The camera handle only exists inside the `Scanning` state, so leaving that
//! state for any reason drops and releases it. Every operator command returns
//! a [`Notice`]; errors never escape the workflow.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ledger::{AttendanceRecord, Ledger};
use crate::roster::{normalize_name, Roster};
use crate::scanner::{Camera, CameraProvider, FrameDecoder};

/// Observable scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Not scanning; no camera held.
    Idle,
    /// Camera held, frames being decoded.
    Scanning,
    /// A decoded payload did not match the roster and awaits the operator.
    AwaitingManualResolution,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Scanning => write!(f, "scanning"),
            Self::AwaitingManualResolution => write!(f, "awaiting manual resolution"),
        }
    }
}

#[derive(Debug)]
enum ScanState {
    Idle,
    Scanning(Box<dyn Camera>),
    AwaitingManualResolution { payload: String },
}

/// Operator-facing outcome of a workflow command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The camera was opened and scanning began.
    ScannerStarted,
    /// Scanning stopped without a decode.
    ScannerStopped,
    /// A new attendance record was written.
    CheckedIn(AttendanceRecord),
    /// The name already has a check-in today; nothing was written.
    AlreadyCheckedIn {
        /// The name that was rejected.
        name: String,
    },
    /// A scanned payload is not in the roster; confirm or abandon it.
    UnknownCode {
        /// The decoded text, suggested as the new name.
        payload: String,
    },
    /// A pending payload was discarded without side effects.
    Dismissed {
        /// The discarded payload.
        payload: String,
    },
    /// The command failed.
    Failed {
        /// What went wrong.
        message: String,
        /// Storage failures block further work until the operator intervenes.
        blocking: bool,
    },
}

impl Notice {
    /// Check if this notice reports a new check-in.
    #[must_use]
    pub fn is_checked_in(&self) -> bool {
        matches!(self, Self::CheckedIn(_))
    }

    /// Check if this notice reports a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl From<Error> for Notice {
    fn from(err: Error) -> Self {
        match err {
            Error::DuplicateCheckIn { name, .. } => Self::AlreadyCheckedIn { name },
            other => Self::Failed {
                blocking: other.is_storage_error(),
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScannerStarted => write!(f, "Scanning QR code..."),
            Self::ScannerStopped => write!(f, "Scanner stopped"),
            Self::CheckedIn(record) => {
                write!(f, "{} has been registered successfully!", record.name)
            }
            Self::AlreadyCheckedIn { name } => {
                write!(f, "{name} is already registered for today.")
            }
            Self::UnknownCode { payload } => write!(
                f,
                "QR code scanned: {payload}\nThis name is not in the list."
            ),
            Self::Dismissed { payload } => write!(f, "Discarded scanned code: {payload}"),
            Self::Failed { message, .. } => write!(f, "Error: {message}"),
        }
    }
}

/// Check-in session state and its collaborators.
#[derive(Debug)]
pub struct CheckInWorkflow {
    roster: Roster,
    ledger: Ledger,
    decoder: Box<dyn FrameDecoder>,
    cameras: Box<dyn CameraProvider>,
    state: ScanState,
}

impl CheckInWorkflow {
    /// Create a workflow in the `Idle` state.
    #[must_use]
    pub fn new(
        roster: Roster,
        ledger: Ledger,
        decoder: Box<dyn FrameDecoder>,
        cameras: Box<dyn CameraProvider>,
    ) -> Self {
        Self {
            roster,
            ledger,
            decoder,
            cameras,
            state: ScanState::Idle,
        }
    }

    /// Current scanner phase.
    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        match self.state {
            ScanState::Idle => ScanPhase::Idle,
            ScanState::Scanning(_) => ScanPhase::Scanning,
            ScanState::AwaitingManualResolution { .. } => ScanPhase::AwaitingManualResolution,
        }
    }

    /// The payload waiting for confirmation, if any.
    #[must_use]
    pub fn pending_payload(&self) -> Option<&str> {
        match &self.state {
            ScanState::AwaitingManualResolution { payload } => Some(payload),
            _ => None,
        }
    }

    /// The roster of known names.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The attendance ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Recent check-ins, newest first, re-read from the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be queried.
    pub fn recent_check_ins(&self, limit: usize) -> Result<Vec<AttendanceRecord>> {
        self.ledger.history(Some(limit))
    }

    /// Open the camera and begin scanning.
    pub fn start_scanning(&mut self) -> Notice {
        match self.state {
            ScanState::Idle => {}
            ScanState::Scanning(_) => {
                return Error::invalid_state("scanner is already running").into();
            }
            ScanState::AwaitingManualResolution { .. } => {
                return Error::invalid_state("confirm or discard the scanned code first").into();
            }
        }

        match self.cameras.open() {
            Ok(camera) => {
                info!("Scanner started");
                self.state = ScanState::Scanning(camera);
                Notice::ScannerStarted
            }
            Err(e) => {
                warn!(error = %e, "Could not open camera");
                e.into()
            }
        }
    }

    /// Stop scanning and release the camera.
    ///
    /// Outside the `Scanning` state this changes nothing.
    pub fn stop_scanning(&mut self) -> Notice {
        if matches!(self.state, ScanState::Scanning(_)) {
            self.state = ScanState::Idle;
            info!("Scanner stopped");
        }
        Notice::ScannerStopped
    }

    /// Process one camera frame.
    ///
    /// Returns `None` while scanning should continue. Scanning halts on the
    /// first frame that decodes; only the first payload of that frame is acted
    /// upon.
    pub fn poll_frame(&mut self) -> Option<Notice> {
        let ScanState::Scanning(camera) = &mut self.state else {
            return Some(Error::invalid_state("scanner is not running").into());
        };

        let frame = match camera.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Frame capture failed, stopping scanner");
                self.state = ScanState::Idle;
                return Some(e.into());
            }
        };

        let first = self.decoder.decode(&frame).into_iter().next()?;
        self.state = ScanState::Idle;
        debug!(payload = %first.text, "Scanner stopped after decode");

        Some(self.resolve_payload(first.text))
    }

    /// Run the scanner until a frame decodes or `cancel` completes.
    ///
    /// Each cycle processes one frame and then yields for `frame_interval`.
    pub async fn scan_until_decoded<F>(&mut self, frame_interval: Duration, cancel: F) -> Notice
    where
        F: Future<Output = ()>,
    {
        let started = self.start_scanning();
        if self.phase() != ScanPhase::Scanning {
            return started;
        }

        let mut ticker = tokio::time::interval(frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                biased;
                () = &mut cancel => return self.stop_scanning(),
                _ = ticker.tick() => {
                    if let Some(notice) = self.poll_frame() {
                        return notice;
                    }
                }
            }
        }
    }

    fn resolve_payload(&mut self, payload: String) -> Notice {
        if self.roster.contains(&payload) {
            return self.register_with_code(&payload, Some(&payload));
        }

        info!(%payload, "Scanned code not in roster");
        self.state = ScanState::AwaitingManualResolution {
            payload: payload.clone(),
        };
        Notice::UnknownCode { payload }
    }

    /// Add the pending payload to the roster and register it.
    pub fn confirm_pending(&mut self) -> Notice {
        self.confirm_pending_as(None)
    }

    /// Register the pending scan under `name`, or under the payload itself.
    ///
    /// A blank name is rejected and the payload stays pending.
    pub fn confirm_pending_as(&mut self, name: Option<&str>) -> Notice {
        let ScanState::AwaitingManualResolution { payload } = &self.state else {
            return Error::invalid_state("no scanned code is waiting for confirmation").into();
        };
        let payload = payload.clone();
        let name = name.unwrap_or(payload.as_str());

        let result = self.register(name, Some(&payload));
        if !matches!(&result, Err(e) if e.is_validation_error()) {
            self.state = ScanState::Idle;
        }
        result.map_or_else(Notice::from, Notice::CheckedIn)
    }

    /// Discard the pending payload with no side effects.
    pub fn abandon_pending(&mut self) -> Notice {
        match std::mem::replace(&mut self.state, ScanState::Idle) {
            ScanState::AwaitingManualResolution { payload } => {
                debug!(%payload, "Discarded scanned code");
                Notice::Dismissed { payload }
            }
            other => {
                self.state = other;
                Error::invalid_state("no scanned code is waiting for confirmation").into()
            }
        }
    }

    /// Register a name chosen from the roster or typed by the operator.
    ///
    /// Names not yet in the roster are added first.
    pub fn register_name(&mut self, name: &str) -> Notice {
        self.register_with_code(name, None)
    }

    fn register_with_code(&mut self, name: &str, qr_code: Option<&str>) -> Notice {
        self.register(name, qr_code)
            .map_or_else(Notice::from, Notice::CheckedIn)
    }

    fn register(&mut self, name: &str, qr_code: Option<&str>) -> Result<AttendanceRecord> {
        let name = normalize_name(name)?;

        if !self.roster.contains(name) {
            self.roster.add(name)?;
        }

        match self.ledger.check_in_with_code(name, qr_code) {
            Ok(record) => Ok(record),
            Err(e) if e.is_duplicate_check_in() => {
                info!(name, "Already registered today");
                Err(e)
            }
            Err(e) => {
                warn!(name, error = %e, "Check-in failed");
                Err(e)
            }
        }
    }
}

//! Status-word and fault-code decoding for the drive.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw drive status word (register 40051).
///
/// Only the bits the tooling consumes are modeled; the rest stay available
/// in the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusWord(pub u16);

impl StatusWord {
    /// Bit 2: the drive is running (modulating).
    pub const RUNNING: u16 = 0x0004;

    /// Bit 3: a fault is latched.
    pub const FAULT: u16 = 0x0008;

    /// Bit 7: an alarm (warning) is active.
    pub const ALARM: u16 = 0x0080;

    pub fn is_running(self) -> bool {
        self.0 & Self::RUNNING != 0
    }

    pub fn is_faulted(self) -> bool {
        self.0 & Self::FAULT != 0
    }

    pub fn is_alarmed(self) -> bool {
        self.0 & Self::ALARM != 0
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Drive fault code (register 40103).
///
/// Zero means the drive flagged a fault but no code is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultCode(pub u16);

impl FaultCode {
    /// Placeholder the drive reports when no code is available.
    pub const UNAVAILABLE: FaultCode = FaultCode(0);

    /// True when the drive provided an actual code.
    pub fn is_available(self) -> bool {
        self.0 != 0
    }

    /// Name for the codes documented for this drive family.
    pub fn description(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("overcurrent"),
            2 => Some("DC overvoltage"),
            9 => Some("motor overtemperature"),
            _ => None,
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None if self.is_available() => write!(f, "{}", self.0),
            None => write!(f, "code unavailable"),
        }
    }
}

/// Operating state shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingState {
    /// Powered and idle.
    Ready,
    /// Modulating.
    Running,
    /// A fault is latched and the drive is not running.
    Faulted,
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperatingState::Ready => "READY",
            OperatingState::Running => "RUNNING",
            OperatingState::Faulted => "FAULT",
        };
        write!(f, "{label}")
    }
}

/// Decoded drive state.
///
/// Kept composite on purpose: the running and fault bits are not mutually
/// exclusive in the status word, and collapsing them into a single enum
/// would lose that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveStatus {
    /// Running bit (bit 2) of the status word.
    pub running: bool,

    /// Fault bit (bit 3) of the status word.
    pub faulted: bool,

    /// Last fault code; meaningful when `faulted` is set.
    pub fault_code: FaultCode,

    /// Alarm bit (bit 7), orthogonal to the running/faulted state.
    pub alarmed: bool,
}

impl DriveStatus {
    /// Decode a status word and fault code pair. Total over all inputs.
    pub fn decode(status_word: StatusWord, fault_code: FaultCode) -> Self {
        Self {
            running: status_word.is_running(),
            faulted: status_word.is_faulted(),
            fault_code,
            alarmed: status_word.is_alarmed(),
        }
    }

    /// The state label an operator sees for this status.
    ///
    /// When both the running and fault bits are set the label is `Running`
    /// and `faulted` keeps recording the bit.
    pub fn operating_state(&self) -> OperatingState {
        // TODO: confirm with a drive specialist whether a latched fault
        // should outrank the running bit here.
        if self.running {
            OperatingState::Running
        } else if self.faulted {
            OperatingState::Faulted
        } else {
            OperatingState::Ready
        }
    }
}

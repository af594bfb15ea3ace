use serde::{Deserialize, Serialize};

/// Out-of-band instruction carried by a [`crate::Payload::Control`] payload.
///
/// Any strictly negative value is a member of the "stop" family; [`ControlSignal::is_stop`]
/// captures that convention so callers never need to hardcode the sign check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum ControlSignal {
    /// Forward the control message to every destination, then stop self.
    StopPropagate = -2,
    /// Stop self; do not propagate.
    Stop = -1,
    /// Start self.
    Start = 0,
    /// Forward the control message to every destination, then start self.
    StartPropagate = 1,
    /// Run user-defined pre-start preparation.
    Warmup = 2,
    /// Bypass the buffer: forward inbound messages straight to destinations.
    Suspend = 3,
    /// Resume buffered processing.
    Resume = 4,
}

impl ControlSignal {
    /// The signed integer code, matching the specification's numbering.
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Whether this signal belongs to the stop family (any strictly negative code).
    pub fn is_stop(self) -> bool {
        self.code() < 0
    }
}

use percept_hw::FacingMode;
use serde::{Deserialize, Serialize};

/// Permission gate state, derived solely from capture outcomes.
///
/// `Unknown` before the first acquisition attempt completes, `Granted`
/// after a successful open, `Denied` after a failed one. Drives view
/// selection in presentation and gates whether a fusion tick does
/// useful work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum GateState {
    Unknown,
    Granted { facing: FacingMode },
    Denied,
}

impl GateState {
    pub fn is_granted(self) -> bool {
        matches!(self, GateState::Granted { .. })
    }
}

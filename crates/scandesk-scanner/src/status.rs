//! Resolution of raw status codes into a single device state.

use scandesk_core::models::{DeviceState, StatusId};

use crate::transport::RawStatus;

/// Paper-jam indicator value that means a jam is present.
const PAPER_JAM_ACTIVE: &str = "1";

/// Combine the raw status values into one state.
///
/// An active paper-jam indicator wins. Otherwise a device-level `ERROR` or `OFFLINE`
/// wins, then the scanner status, then the device status. Nothing reported reads as
/// `OFFLINE`.
pub fn resolve_state(raw: &RawStatus) -> DeviceState {
    let value = |id: StatusId| raw.get(id.as_str()).map(|v| v.trim());

    if value(StatusId::PaperJam) == Some(PAPER_JAM_ACTIVE) {
        return DeviceState::PaperJam;
    }

    let device = value(StatusId::Device).map(DeviceState::from_code);
    let scanner = value(StatusId::Scanner).map(DeviceState::from_code);

    match (device, scanner) {
        (Some(state @ (DeviceState::Error | DeviceState::Offline)), _) => state,
        (_, Some(state)) => state,
        (Some(state), None) => state,
        (None, None) => DeviceState::Offline,
    }
}

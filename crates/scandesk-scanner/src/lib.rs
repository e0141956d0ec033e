//! Scandesk Scanner
//!
//! Everything that talks to the physical scanner or its drop folder: the device
//! status monitor and its transports, the ingestion watcher, and the session
//! coordinator that ties one of each together.

pub mod coordinator;
pub mod monitor;
pub mod session;
pub mod stability;
pub mod status;
pub mod transport;
pub mod watcher;

pub use coordinator::{ScanAcceptance, ScanCoordinator, ScanOutcome, REFUSED_NOT_READY};
pub use monitor::{DeviceMonitor, MonitorConfig};
pub use session::{EffectiveConfig, ScanSession, SessionConfig, SessionTemplate};
pub use stability::{FileFingerprint, StabilityTracker};
pub use status::resolve_state;
pub use transport::{
    DeviceTransport, DeviceTransportFactory, HttpDeviceTransport, HttpTransportFactory, RawStatus,
    TransportError,
};
pub use watcher::{IngestionEvent, IngestionWatcher, WatcherConfig};

pub mod browser;
pub mod config;
pub mod error;
pub mod session;

//  Re-export commonly used items
pub use browser::{
    ChromeSession, ConnectionMode, ElementHandle, SessionDriver, SimulatedCommand,
    SimulatedSession,
};
pub use config::{build_registry, launch_registry, CapabilityProfile, SuiteConfig};
pub use error::{Result, SessionError};
pub use session::{
    current, inherit, parallel, parallel_report, parallel_settled, run_as, run_as_sync,
    try_current, AmbientGlobals, Binding, FlowOutcome, FlowStatus, GlobalSlot, Installation,
    MultiremoteContext, ParallelReport, Rebinder, RebinderOptions, RebinderWarning, RemoteMode,
    SessionDescriptor, SessionName, SessionRegistry, Settled, DRIVER_A, DRIVER_B, DRIVER_C,
    DRIVER_D,
};

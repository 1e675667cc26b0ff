//! Multi-session orchestration
//!
//! - `registry`: named driver sessions for one test context
//! - `tracker`: which session the calling flow is bound to
//! - `globals` / `rebinder`: ambient slots and their session-routed replacements
//! - `parallel`: run one flow per session, settle all, then report
//! - `context`: setup/teardown of the above for one suite

pub mod ambient;
pub mod context;
pub mod globals;
pub mod parallel;
pub mod rebinder;
pub mod registry;
pub mod report;
pub mod tracker;

pub use context::MultiremoteContext;
pub use globals::{AmbientGlobals, Binding, GlobalSlot};
pub use parallel::{parallel, parallel_report, parallel_settled, Settled};
pub use rebinder::{Installation, Rebinder, RebinderOptions, RebinderWarning, RoutedDriver};
pub use registry::{
    RemoteMode, SessionDescriptor, SessionName, SessionRegistry, DRIVER_A, DRIVER_B, DRIVER_C,
    DRIVER_D, DRIVER_NAMES,
};
pub use report::{FlowOutcome, FlowStatus, ParallelReport};
pub use tracker::{current, inherit, run_as, run_as_sync, try_current};

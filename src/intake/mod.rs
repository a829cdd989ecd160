//! HTTP intake for edits made on the published page.
//!
//! Enabled with `run --intake` or `intake.enabled: true`.

mod server;

pub use server::{
    IntakeHandle, IntakeServer, IntakeStatus, NewTaskRequest, PostponeRequest, ToggleRequest,
    build_router, start_server, start_server_with_retry,
};

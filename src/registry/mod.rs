//! Process registry and supervisor
//!
//! Every pipeline launched on behalf of a request is tracked here under the
//! publisher name handed to the peer, so the shutdown path can find it.
//!
//! # Architecture
//!
//! ```text
//!   [stream handler]   [stream handler]   [startup: relay]
//!          │                  │                  │
//!          └──── ProcessSupervisor::spawn_tracked() ─┘
//!                             │
//!                             ▼
//!                   Arc<ProcessRegistry>
//!              ┌──────────────────────────┐
//!              │ Mutex<HashMap<key,       │
//!              │   ManagedProcess {       │
//!              │     stages: [Child..],   │
//!              │   }>>                    │
//!              └────────────┬─────────────┘
//!                           │
//!                           ▼
//!            ShutdownCoordinator → terminate_all()
//! ```

pub mod entry;
pub mod error;
pub mod store;
pub mod supervisor;

pub use entry::{ManagedProcess, RunningStage};
pub use error::{LaunchError, TerminationError};
pub use store::{ProcessRegistry, TerminationReport};
pub use supervisor::ProcessSupervisor;

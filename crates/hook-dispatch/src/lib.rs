//! Hook routing for the plugin runtime.
//!
//! A [`HookRegistry`] maps each event type to an ordered list of
//! `(name, matcher, handler)` entries. The [`Dispatcher`] runs the matching
//! handlers synchronously, isolates their failures and merges their
//! verdicts into one [`Decision`](hook_types::Decision). Slow work is handed
//! to a [`Spawn`] implementation and finished by a detached worker.
//!
//! # Example
//!
//! ```no_run
//! use hook_dispatch::{builtin_registry, Dispatcher, HookContext};
//! use hook_types::{Event, EventType, ProjectPaths, Settings};
//!
//! let settings = Settings::default();
//! let registry = builtin_registry(&settings).unwrap();
//! let ctx = HookContext::new(ProjectPaths::new("/work/project", ".claude"), settings);
//! let dispatcher = Dispatcher::new(registry, ctx);
//!
//! let event = Event::new(EventType::PreToolUse, "session-1")
//!     .with_tool("Bash", serde_json::json!({ "command": "rm -rf /" }));
//! assert!(!dispatcher.dispatch(&event).proceed);
//! ```

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod matcher;
pub mod registry;
pub mod spawner;
pub mod worker;

pub use dispatcher::{Dispatcher, Outcome};
pub use error::{DispatchError, HandlerError};
pub use handler::{handler_fn, FnHandler, Handler, HookContext};
pub use handlers::{builtin_handlers, builtin_registry};
pub use matcher::Matcher;
pub use registry::{HookRegistry, RegistryEntry};
pub use spawner::{worker_program, InlineSpawner, ProcessSpawner, RecordingSpawner, Spawn};
pub use worker::{bookkeeping_payload, run_contained, run_job, WorkerKind};

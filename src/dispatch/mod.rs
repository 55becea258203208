//! Request dispatch: mounted applications, hooks and the controller.
//!
//! # Data Flow
//! ```text
//! Controller (tower::Service, owns registrations)
//!     → dispatcher.rs (immutable snapshot, one per registration change)
//!         → hooks.rs (parent request/response hooks)
//!         → application.rs (native child | gateway app | parent handler)
//!         → reply.rs (full, streamed or deferred outcome)
//! ```

pub mod application;
pub mod controller;
pub mod dispatcher;
pub mod hooks;
pub mod reply;

pub use application::{AppCatalog, AppId, AppKind, NativeApp, ParentApp, RegisteredApp, ServiceApp, Target};
pub use controller::{Controller, ControllerSettings, MountInfo, MountOptions};
pub use dispatcher::Dispatcher;
pub use hooks::{HookStage, RequestHook, ResponseHook};
pub use reply::Reply;

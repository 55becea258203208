//! Request dispatcher library.
//!
//! Routes requests for a parent application to independently mounted child
//! applications by path prefix and host, hosting both native async
//! applications and synchronous gateway applications.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::DispatcherConfig;
pub use dispatch::{
    AppCatalog, Controller, ControllerSettings, MountOptions, NativeApp, ParentApp, Reply,
    RequestHook, ResponseHook, ServiceApp,
};
pub use error::{BoxError, DispatchError, RegistrationError};
pub use gateway::{gateway_fn, GatewayApp};
pub use http::HttpServer;
pub use lifecycle::Shutdown;

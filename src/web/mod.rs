//! Transport boundary.
//!
//! Nothing in here depends on a web framework. An integration converts its
//! native request into a [`RequestAdapter`], passes it to
//! [`Dispatcher::handle`], and writes the returned [`Response`] back out.
//!
//! ```text
//! native request
//!   -> RequestAdapter          (path, verb, headers, raw body)
//!   -> ExtractCredentials      (Authorization: Basic ...)
//!   -> RequestGate::run        (authenticate, bind, role check, audit)
//!   -> ResourceService         (validate Tainted body, ownership, store)
//!   -> Response                (resource, Bundle or OperationOutcome)
//! ```
//!
//! Request bodies stay [`Tainted`](crate::Tainted) until the service's
//! validator has accepted them.

mod adapter;
mod dispatch;
mod extract;
mod response;

pub use adapter::{Method, RequestAdapter};
pub use dispatch::Dispatcher;
pub use extract::{BasicCredentials, ExtractCredentials};
pub use response::Response;

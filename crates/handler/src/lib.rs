//! Sequential middleware dispatch over [`micro_message`] server requests
//!
//! A [`Dispatcher`] holds a queue of [`Middleware`]s and an optional fallback
//! [`RequestHandler`]. Each middleware sees the request and the rest of the queue, and
//! decides whether to answer or to pass the request on.
//!
//! # Example
//!
//! ```
//! use micro_handler::{Dispatcher, RequestHandler, handler_fn, middleware_fn};
//! use micro_message::{HttpMessage, Response, ServerRequest};
//!
//! let dispatcher = Dispatcher::builder()
//!     .add_last(middleware_fn(|request: ServerRequest, next: &dyn RequestHandler| {
//!         next.handle(request.with_attribute("user", "terry".to_owned()))
//!     }))
//!     .fallback(handler_fn(|request: ServerRequest| {
//!         let user = request.attribute::<String>("user").cloned().unwrap_or_default();
//!         Response::new().with_header("X-User", user)
//!     }))
//!     .build();
//!
//! let response = dispatcher.handle(ServerRequest::default()).unwrap();
//! assert_eq!(response.header_line("x-user"), "terry");
//! ```
//!
//! Errors are never recovered by the dispatcher: an `Err` returned by any middleware or
//! by the fallback handler is returned to the caller as-is.

mod dispatcher;
mod handler;
mod middleware;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use handler::{BoxError, HandlerFn, HandlerResult, RequestHandler, handler_fn};
pub use middleware::{Middleware, MiddlewareFn, middleware_fn};

//! Request handlers: the end of a middleware chain.

use micro_message::{Response, ServerRequest};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

pub type BoxError = Box<dyn Error + Send + Sync>;

pub type HandlerResult = Result<Response, BoxError>;

/// Produces a [`Response`] for a [`ServerRequest`].
///
/// Errors are not recovered anywhere in this crate: whatever a handler returns as `Err`
/// reaches the caller of the outermost handler unchanged.
#[cfg_attr(test, mockall::automock)]
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: ServerRequest) -> HandlerResult;
}

impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    fn handle(&self, request: ServerRequest) -> HandlerResult {
        (**self).handle(request)
    }
}

impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    fn handle(&self, request: ServerRequest) -> HandlerResult {
        (**self).handle(request)
    }
}

/// A [`RequestHandler`] backed by a closure, see [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

impl<F, E> RequestHandler for HandlerFn<F>
where
    F: Fn(ServerRequest) -> Result<Response, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn handle(&self, request: ServerRequest) -> HandlerResult {
        (self.f)(request).map_err(Into::into)
    }
}

pub fn handler_fn<F, E>(f: F) -> HandlerFn<F>
where
    F: Fn(ServerRequest) -> Result<Response, E> + Send + Sync,
    E: Into<BoxError>,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micro_message::{HttpMessage, MessageError};

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    #[test]
    fn test_handler_fn() {
        let handler = handler_fn(|request: ServerRequest| {
            let name = request.query_params().get("name").cloned().unwrap_or_default();
            Response::new().with_header("X-Name", name)
        });
        assert_is_handler(&handler);

        let request = ServerRequest::builder()
            .uri("/?name=micro")
            .query_params([("name".to_owned(), "micro".to_owned())].into())
            .build()
            .unwrap();
        let response = handler.handle(request).unwrap();
        assert_eq!(response.header_line("x-name"), "micro");
    }

    #[test]
    fn test_handler_fn_error_is_boxed() {
        let handler = handler_fn(|_request: ServerRequest| Response::new().with_status(42, ""));

        let error = handler.handle(ServerRequest::default()).unwrap_err();
        assert!(matches!(error.downcast_ref::<MessageError>(), Some(MessageError::InvalidStatus { code: 42 })));
    }

    #[test]
    fn test_shared_handler() {
        let handler: Arc<dyn RequestHandler> = Arc::new(handler_fn(|_request: ServerRequest| Response::new().with_status(204, "")));
        assert_is_handler(&handler);
        assert_eq!(handler.handle(ServerRequest::default()).unwrap().status_code(), 204);
    }
}

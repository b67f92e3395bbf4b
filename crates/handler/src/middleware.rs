//! The [`Middleware`] trait and its closure adapter.

use crate::handler::{BoxError, HandlerResult, RequestHandler};
use micro_message::{Response, ServerRequest};
use std::fmt;

/// A processing unit of a [`Dispatcher`](crate::Dispatcher).
///
/// A middleware either answers the request itself (short-circuit) or hands a possibly
/// derived request to `next`, the remaining chain.
pub trait Middleware: Send + Sync {
    fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> HandlerResult;
}

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> HandlerResult {
        (**self).process(request, next)
    }
}

/// A [`Middleware`] backed by a closure, see [`middleware_fn`].
pub struct MiddlewareFn<F> {
    f: F,
}

impl<F> fmt::Debug for MiddlewareFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareFn").finish_non_exhaustive()
    }
}

impl<F, E> Middleware for MiddlewareFn<F>
where
    F: Fn(ServerRequest, &dyn RequestHandler) -> Result<Response, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> HandlerResult {
        (self.f)(request, next).map_err(Into::into)
    }
}

pub fn middleware_fn<F, E>(f: F) -> MiddlewareFn<F>
where
    F: Fn(ServerRequest, &dyn RequestHandler) -> Result<Response, E> + Send + Sync,
    E: Into<BoxError>,
{
    MiddlewareFn { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use micro_message::{HttpMessage, RequestMessage};

    fn echo_attribute() -> impl RequestHandler {
        handler_fn(|request: ServerRequest| {
            let tag = request.attribute_or::<&str>("tag", &"none");
            Response::new().with_header("X-Tag", *tag)
        })
    }

    fn tagging() -> impl Middleware {
        middleware_fn(|request: ServerRequest, next: &dyn RequestHandler| next.handle(request.with_attribute("tag", "tagged")))
    }

    #[test]
    fn test_middleware_fn_delegates() {
        let response = tagging().process(ServerRequest::default(), &echo_attribute()).unwrap();
        assert_eq!(response.header_line("x-tag"), "tagged");
    }

    #[test]
    fn test_middleware_fn_short_circuits() {
        let reject = middleware_fn(|request: ServerRequest, next: &dyn RequestHandler| -> HandlerResult {
            if request.method() == http::Method::DELETE {
                return Response::new().with_status(405, "").map_err(Into::into);
            }
            next.handle(request)
        });

        let request = ServerRequest::new("DELETE", "/").unwrap();
        assert_eq!(reject.process(request, &echo_attribute()).unwrap().status_code(), 405);

        let request = ServerRequest::new("GET", "/").unwrap();
        assert_eq!(reject.process(request, &echo_attribute()).unwrap().status_code(), 200);
    }
}

//! Sequential middleware dispatch.
//!
//! A [`Dispatcher`] runs its middlewares in insertion order. Each middleware receives the
//! request together with the rest of the queue, and either answers on its own or passes
//! a (possibly derived) request on. When the queue is exhausted the fallback handler
//! answers, or an empty `200 OK` when there is none.
//!
//! The queue is never consumed: every [`handle`](RequestHandler::handle) call walks it
//! through a borrowed cursor, so one dispatcher can serve any number of requests.

use crate::handler::{HandlerResult, RequestHandler};
use crate::middleware::Middleware;
use micro_message::{Response, ServerRequest};
use std::fmt;
use tracing::{debug, trace};

pub struct Dispatcher {
    queue: Vec<Box<dyn Middleware>>,
    fallback: Option<Box<dyn RequestHandler>>,
}

impl Dispatcher {
    /// An empty dispatcher without fallback handler.
    pub fn new() -> Self {
        Self { queue: vec![], fallback: None }
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Appends a middleware to the queue.
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.queue.push(Box::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn cursor(&self) -> Next<'_> {
        Next { queue: &self.queue, fallback: self.fallback.as_deref() }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("middlewares", &self.queue.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl RequestHandler for Dispatcher {
    fn handle(&self, request: ServerRequest) -> HandlerResult {
        debug!(middlewares = self.queue.len(), fallback = self.fallback.is_some(), "dispatch request");
        self.cursor().handle(request)
    }
}

/// The part of the queue that has not run yet.
struct Next<'a> {
    queue: &'a [Box<dyn Middleware>],
    fallback: Option<&'a dyn RequestHandler>,
}

impl RequestHandler for Next<'_> {
    fn handle(&self, request: ServerRequest) -> HandlerResult {
        let Some((middleware, rest)) = self.queue.split_first() else {
            return match self.fallback {
                Some(fallback) => {
                    trace!("queue exhausted, delegate to fallback handler");
                    fallback.handle(request)
                }
                None => {
                    trace!("queue exhausted without fallback handler, respond with default response");
                    Ok(Response::default())
                }
            };
        };

        trace!(remaining = rest.len(), "invoke middleware");
        middleware.process(request, &Next { queue: rest, fallback: self.fallback })
    }
}

#[derive(Default)]
pub struct DispatcherBuilder {
    queue: Vec<Box<dyn Middleware>>,
    fallback: Option<Box<dyn RequestHandler>>,
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn add_last<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.queue.push(Box::new(middleware));
        self
    }

    pub fn add_first<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.queue.insert(0, Box::new(middleware));
        self
    }

    /// The handler answering requests that every middleware passed on.
    pub fn fallback<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher { queue: self.queue, fallback: self.fallback }
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("middlewares", &self.queue.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

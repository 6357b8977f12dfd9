//! Transport over an in-process message channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use querybridge_core::result::ResultSet;
use querybridge_core::TransportError;

use super::{RequestTracker, ResponseData, Transport, TransportRequest, TransportResponse};

/// Sends [`TransportRequest`]s over an unbounded channel and waits for the
/// matching [`TransportResponse`], which the other end hands to a
/// [`Responder`]. Responses may come back in any order.
#[derive(Debug)]
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<TransportRequest>,
    tracker: Arc<RequestTracker>,
}

/// Receiving end for responses of a [`ChannelTransport`].
#[derive(Debug, Clone)]
pub struct Responder {
    tracker: Arc<RequestTracker>,
}

impl ChannelTransport {
    /// Creates a transport, the receiver its requests arrive on and the
    /// responder to deliver responses through.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportRequest>, Responder) {
        Self::with_tracker(RequestTracker::new())
    }

    /// Like [`ChannelTransport::new`], with at most `capacity` requests in
    /// flight.
    #[must_use]
    pub fn with_capacity(
        capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<TransportRequest>, Responder) {
        Self::with_tracker(RequestTracker::with_capacity(capacity))
    }

    fn with_tracker(
        tracker: RequestTracker,
    ) -> (Self, mpsc::UnboundedReceiver<TransportRequest>, Responder) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let tracker = Arc::new(tracker);
        let responder = Responder {
            tracker: Arc::clone(&tracker),
        };
        (Self { sender, tracker }, receiver, responder)
    }

    /// Number of requests waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tracker.pending_count()
    }

    async fn send(
        &self,
        build: impl FnOnce(u64) -> TransportRequest + Send,
    ) -> Result<ResponseData, TransportError> {
        let (id, receiver) = self.tracker.register();
        let request = build(id);
        debug!(id, kind = request.kind(), "Sending request");
        if self.sender.send(request).is_err() {
            self.tracker.forget(id);
            return Err(TransportError::Closed);
        }
        receiver.await.map_err(|_| TransportError::Closed)?
    }
}

fn unexpected(expected: &str) -> TransportError {
    TransportError::Remote(format!("expected a {expected} response"))
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn query(&self, statement: &str) -> Result<ResultSet, TransportError> {
        let statement = statement.to_string();
        match self
            .send(|id| TransportRequest::Query { id, statement })
            .await?
        {
            ResponseData::Query(result) => Ok(result),
            ResponseData::Transaction(_) => Err(unexpected("query")),
        }
    }

    async fn transaction(&self, statements: &[String]) -> Result<Vec<ResultSet>, TransportError> {
        let statements = statements.to_vec();
        let expected = statements.len();
        match self
            .send(|id| TransportRequest::Transaction { id, statements })
            .await?
        {
            ResponseData::Transaction(results) if results.len() == expected => Ok(results),
            ResponseData::Transaction(results) => Err(TransportError::Remote(format!(
                "expected {expected} results, received {}",
                results.len()
            ))),
            ResponseData::Query(_) => Err(unexpected("transaction")),
        }
    }
}

impl Responder {
    /// Routes `response` to the request it answers. Returns `false` when
    /// no request with that id is pending.
    pub fn deliver(&self, response: TransportResponse) -> bool {
        let id = response.id;
        self.tracker.resolve(id, response.into_result())
    }

    /// Fails every pending request with [`TransportError::Closed`].
    pub fn close(&self) {
        self.tracker.fail_all(&TransportError::Closed);
    }
}

//! Stream combinators shared by the router and the merge layer.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::warn;

use graffiti_remote::RemoteStore;
use graffiti_types::stream::exhausted;
use graffiti_types::{GraffitiResult, GraffitiStream, Step, StreamEntry};

/// Opens one origin's stream, resuming from `cursor` when given.
pub type LegOpener<T, R> = Box<
    dyn Fn(Arc<RemoteStore>, Option<String>) -> BoxFuture<'static, GraffitiResult<Box<dyn GraffitiStream<T, R>>>>
        + Send
        + Sync,
>;

/// Per-origin terminal values, in drain order. `None` marks an origin that
/// failed.
pub type Outcomes<R> = Vec<(String, Option<R>)>;

/// One origin still to be drained.
pub struct PendingLeg {
    pub origin: String,
    pub store: Arc<RemoteStore>,
    pub cursor: Option<String>,
}

/// Drains one origin at a time, in order.
///
/// An origin that fails to open, or fails part way through, contributes a
/// single error entry tagged with its origin and a `None` outcome; the drain
/// then moves on. The terminal value lists every origin's outcome in drain
/// order.
pub struct Sequential<T, R> {
    pending: VecDeque<PendingLeg>,
    open: LegOpener<T, R>,
    current: Option<(String, Box<dyn GraffitiStream<T, R>>)>,
    outcomes: Outcomes<R>,
    finished: bool,
}

impl<T, R> Sequential<T, R> {
    pub fn new(legs: impl IntoIterator<Item = PendingLeg>, open: LegOpener<T, R>) -> Self {
        Self {
            pending: legs.into_iter().collect(),
            open,
            current: None,
            outcomes: Vec::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl<T, R> GraffitiStream<T, Outcomes<R>> for Sequential<T, R>
where
    T: Send,
    R: Send,
{
    async fn next(&mut self) -> GraffitiResult<Step<T, Outcomes<R>>> {
        loop {
            if self.finished {
                return Err(exhausted());
            }
            if let Some((origin, mut stream)) = self.current.take() {
                match stream.next().await {
                    Ok(Step::Yield(entry)) => {
                        self.current = Some((origin, stream));
                        return Ok(Step::Yield(entry));
                    }
                    Ok(Step::Return(terminal)) => {
                        self.outcomes.push((origin, Some(terminal)));
                    }
                    Err(error) => {
                        warn!(%origin, %error, "origin failed mid-stream, skipping it");
                        stream.close().await;
                        self.outcomes.push((origin.clone(), None));
                        return Ok(Step::Yield(StreamEntry::error(error, origin)));
                    }
                }
                continue;
            }
            let Some(leg) = self.pending.pop_front() else {
                self.finished = true;
                return Ok(Step::Return(std::mem::take(&mut self.outcomes)));
            };
            match (self.open)(leg.store, leg.cursor).await {
                Ok(stream) => self.current = Some((leg.origin, stream)),
                Err(error) => {
                    warn!(origin = %leg.origin, %error, "origin failed to open, skipping it");
                    self.outcomes.push((leg.origin.clone(), None));
                    return Ok(Step::Yield(StreamEntry::error(error, leg.origin)));
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some((_, mut stream)) = self.current.take() {
            stream.close().await;
        }
        self.pending.clear();
        self.finished = true;
    }
}

/// Converts a stream's terminal value once it arrives.
pub struct MapReturn<T, R, R2> {
    inner: Box<dyn GraffitiStream<T, R>>,
    map: Option<Box<dyn FnOnce(R) -> GraffitiResult<R2> + Send>>,
}

impl<T, R, R2> MapReturn<T, R, R2> {
    pub fn new(
        inner: Box<dyn GraffitiStream<T, R>>,
        map: impl FnOnce(R) -> GraffitiResult<R2> + Send + 'static,
    ) -> Self {
        Self {
            inner,
            map: Some(Box::new(map)),
        }
    }
}

#[async_trait]
impl<T, R, R2> GraffitiStream<T, R2> for MapReturn<T, R, R2>
where
    T: Send,
    R: Send,
    R2: Send,
{
    async fn next(&mut self) -> GraffitiResult<Step<T, R2>> {
        match self.inner.next().await? {
            Step::Yield(entry) => Ok(Step::Yield(entry)),
            Step::Return(terminal) => {
                let map = self.map.take().ok_or_else(exhausted)?;
                map(terminal).map(Step::Return)
            }
        }
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

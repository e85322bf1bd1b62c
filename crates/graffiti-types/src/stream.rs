use std::collections::VecDeque;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GraffitiError, GraffitiResult};
use crate::object::{ChannelStats, GraffitiObject};

/// One entry of a stream: an element, or a per-entry fault that does not
/// terminate enumeration.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEntry<T> {
    Element(T),
    Error { error: GraffitiError, origin: String },
}

impl<T> StreamEntry<T> {
    pub fn error(error: GraffitiError, origin: impl Into<String>) -> Self {
        Self::Error {
            error,
            origin: origin.into(),
        }
    }

    pub fn element(&self) -> Option<&T> {
        match self {
            Self::Element(t) => Some(t),
            Self::Error { .. } => None,
        }
    }

    pub fn into_element(self) -> Option<T> {
        match self {
            Self::Element(t) => Some(t),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// The result of pulling a stream once.
#[derive(Debug)]
pub enum Step<T, R> {
    Yield(StreamEntry<T>),
    /// The stream is exhausted; `R` is its terminal value.
    Return(R),
}

/// A pull-based stream of entries ending in exactly one terminal value.
///
/// Pulling after the terminal value has been returned is an error. Dropping
/// a stream, or calling [`GraffitiStream::close`], releases any underlying
/// connection.
#[async_trait]
pub trait GraffitiStream<T, R>: Send {
    async fn next(&mut self) -> GraffitiResult<Step<T, R>>;

    /// Abandon the stream early, releasing its resources.
    async fn close(&mut self) {}
}

/// Terminal value of an object stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStreamReturn {
    /// Opaque resumption token; pass it to `continue_object_stream` on the
    /// same store to receive everything that changed since.
    pub cursor: String,
}

pub type ObjectStream = Box<dyn GraffitiStream<GraffitiObject, ObjectStreamReturn>>;
pub type ChannelStatsStream = Box<dyn GraffitiStream<ChannelStats, ()>>;

/// The error for pulling a stream past its terminal value.
pub fn exhausted() -> GraffitiError {
    GraffitiError::InvalidResponse("stream already returned its terminal value".into())
}

/// Drain a stream, returning every entry and the terminal value.
pub async fn collect<T, R>(
    stream: &mut (dyn GraffitiStream<T, R> + '_),
) -> GraffitiResult<(Vec<StreamEntry<T>>, R)> {
    let mut entries = Vec::new();
    loop {
        match stream.next().await? {
            Step::Yield(entry) => entries.push(entry),
            Step::Return(r) => return Ok((entries, r)),
        }
    }
}

/// A stream over entries that are already materialized.
pub struct VecStream<T, R> {
    entries: VecDeque<StreamEntry<T>>,
    terminal: Option<R>,
}

impl<T, R> VecStream<T, R> {
    pub fn new(entries: impl IntoIterator<Item = StreamEntry<T>>, terminal: R) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            terminal: Some(terminal),
        }
    }

    pub fn of_elements(elements: impl IntoIterator<Item = T>, terminal: R) -> Self {
        Self::new(elements.into_iter().map(StreamEntry::Element), terminal)
    }
}

#[async_trait]
impl<T: Send, R: Send> GraffitiStream<T, R> for VecStream<T, R> {
    async fn next(&mut self) -> GraffitiResult<Step<T, R>> {
        if let Some(entry) = self.entries.pop_front() {
            return Ok(Step::Yield(entry));
        }
        self.terminal.take().map(Step::Return).ok_or_else(exhausted)
    }

    async fn close(&mut self) {
        self.entries.clear();
        self.terminal = None;
    }
}

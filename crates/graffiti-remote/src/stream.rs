use async_trait::async_trait;

use graffiti_types::{
    GraffitiObject, GraffitiResult, GraffitiStream, ObjectStream, ObjectStreamReturn, Step,
    StreamEntry,
};

/// Drops tombstone elements from an object stream. Error entries and the
/// terminal value pass through untouched.
pub struct LiveObjects {
    inner: ObjectStream,
}

impl LiveObjects {
    pub fn new(inner: ObjectStream) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl GraffitiStream<GraffitiObject, ObjectStreamReturn> for LiveObjects {
    async fn next(&mut self) -> GraffitiResult<Step<GraffitiObject, ObjectStreamReturn>> {
        loop {
            match self.inner.next().await? {
                Step::Yield(StreamEntry::Element(object)) if object.tombstone => continue,
                step => return Ok(step),
            }
        }
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

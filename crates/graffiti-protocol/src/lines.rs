//! Incremental decoder for streamed JSON-lines bodies.
//!
//! The body is a sequence of newline-separated JSON values. Every line but
//! the last is an element; the last line is the stream's terminal value.
//! Since the last line cannot be recognized until the body ends, a complete
//! line is only yielded once a further line (or the end of the body) has
//! been seen.
//!
//! A body ending in `\n` does not gain an extra empty line. An empty final
//! line decodes to an absent terminal value, and a body with no lines at all
//! is a fatal error.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use graffiti_types::stream::exhausted;
use graffiti_types::{BodyReader, GraffitiError, GraffitiResult, GraffitiStream, Step, StreamEntry};

/// Turns one decoded element line into an element. A failure becomes a
/// [`StreamEntry::Error`] and enumeration continues.
pub type EntryTransform<T> = Box<dyn Fn(Value) -> GraffitiResult<T> + Send + Sync>;

/// Turns the terminal line (`None` when empty) into the terminal value. A
/// failure aborts the stream.
pub type ReturnTransform<R> = Box<dyn Fn(Option<Value>) -> GraffitiResult<R> + Send + Sync>;

pub struct JsonLinesDecoder<T, R> {
    body: Option<Box<dyn BodyReader>>,
    origin: String,
    to_entry: EntryTransform<T>,
    to_return: ReturnTransform<R>,
    /// Complete lines not yet yielded. Only the front is ever yielded as an
    /// element, and only while a successor exists.
    lines: VecDeque<Vec<u8>>,
    /// Bytes after the last newline seen so far.
    partial: Vec<u8>,
    eof: bool,
    finished: bool,
}

impl<T, R> JsonLinesDecoder<T, R> {
    /// `origin` labels every per-entry error this decoder produces.
    pub fn new(
        body: Box<dyn BodyReader>,
        origin: impl Into<String>,
        to_entry: EntryTransform<T>,
        to_return: ReturnTransform<R>,
    ) -> Self {
        Self {
            body: Some(body),
            origin: origin.into(),
            to_entry,
            to_return,
            lines: VecDeque::new(),
            partial: Vec::new(),
            eof: false,
            finished: false,
        }
    }

    fn push_chunk(&mut self, chunk: &Bytes) {
        let mut start = 0;
        for (i, byte) in chunk.iter().enumerate() {
            if *byte == b'\n' {
                let mut line = std::mem::take(&mut self.partial);
                line.extend_from_slice(&chunk[start..i]);
                self.lines.push_back(line);
                start = i + 1;
            }
        }
        self.partial.extend_from_slice(&chunk[start..]);
    }

    fn entry(&self, line: &[u8]) -> StreamEntry<T> {
        let decoded = serde_json::from_slice::<Value>(trim_cr(line))
            .map_err(|e| GraffitiError::InvalidResponse(format!("malformed stream entry: {e}")))
            .and_then(|json| (self.to_entry)(json));
        match decoded {
            Ok(element) => StreamEntry::Element(element),
            Err(error) => {
                debug!(origin = %self.origin, %error, "stream entry rejected");
                StreamEntry::error(error, self.origin.clone())
            }
        }
    }

    fn terminal(&self, line: &[u8]) -> GraffitiResult<R> {
        let line = trim_cr(line);
        let json = if line.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(serde_json::from_slice::<Value>(line).map_err(|e| {
                GraffitiError::InvalidResponse(format!("malformed stream return value: {e}"))
            })?)
        };
        (self.to_return)(json)
    }

    fn release(&mut self) {
        if let Some(mut body) = self.body.take() {
            body.release();
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.release();
        self.lines.clear();
        self.partial = Vec::new();
    }

    async fn read(&mut self) -> GraffitiResult<()> {
        let Some(body) = self.body.as_mut() else {
            self.eof = true;
            return Ok(());
        };
        match body.read_chunk().await {
            Ok(Some(chunk)) => self.push_chunk(&chunk),
            Ok(None) => {
                self.eof = true;
                self.release();
            }
            Err(e) => {
                self.finish();
                return Err(e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T, R> GraffitiStream<T, R> for JsonLinesDecoder<T, R>
where
    T: Send,
    R: Send,
{
    async fn next(&mut self) -> GraffitiResult<Step<T, R>> {
        loop {
            if self.finished {
                return Err(exhausted());
            }
            if self.lines.len() >= 2 {
                if let Some(line) = self.lines.pop_front() {
                    return Ok(Step::Yield(self.entry(&line)));
                }
            }
            if self.eof {
                if !self.partial.is_empty() {
                    let last = std::mem::take(&mut self.partial);
                    self.lines.push_back(last);
                    continue;
                }
                let last = self.lines.pop_front();
                self.finish();
                return match last {
                    Some(line) => self.terminal(&line).map(Step::Return),
                    None => Err(GraffitiError::InvalidResponse(
                        "received empty response from server".into(),
                    )),
                };
            }
            self.read().await?;
        }
    }

    async fn close(&mut self) {
        self.finish();
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graffiti_types::{collect, ChunkedBody};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn decoder(body: impl Into<Bytes>, chunk: usize) -> JsonLinesDecoder<Value, Option<Value>> {
        JsonLinesDecoder::new(
            Box::new(ChunkedBody::split(body, chunk)),
            "test-origin",
            Box::new(Ok),
            Box::new(Ok),
        )
    }

    fn elements(entries: &[StreamEntry<Value>]) -> Vec<Value> {
        entries.iter().filter_map(|e| e.element().cloned()).collect()
    }

    #[tokio::test]
    async fn elements_then_return() {
        for body in ["1\n{\"a\":2}\n\"x\"\n{\"cursor\":\"c\"}", "1\n{\"a\":2}\n\"x\"\n{\"cursor\":\"c\"}\n"] {
            for chunk in [1, 3, 1024] {
                let mut d = decoder(body, chunk);
                let (entries, ret) = collect(&mut d).await.unwrap();
                assert_eq!(elements(&entries), vec![json!(1), json!({"a": 2}), json!("x")]);
                assert_eq!(ret, Some(json!({"cursor": "c"})));
            }
        }
    }

    #[tokio::test]
    async fn single_line_is_the_return_value() {
        let mut d = decoder("{\"cursor\":\"c\"}", 4);
        let (entries, ret) = collect(&mut d).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(ret, Some(json!({"cursor": "c"})));
    }

    #[tokio::test]
    async fn empty_terminal_line_is_absent() {
        let mut d = decoder("1\n2\n\n", 2);
        let (entries, ret) = collect(&mut d).await.unwrap();
        assert_eq!(elements(&entries), vec![json!(1), json!(2)]);
        assert_eq!(ret, None);

        let mut d = decoder("\n", 2);
        let (entries, ret) = collect(&mut d).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(ret, None);
    }

    #[tokio::test]
    async fn empty_body_is_fatal() {
        let mut d = decoder("", 1);
        let err = collect(&mut d).await.unwrap_err();
        assert!(matches!(err, GraffitiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn corrupted_middle_line_is_isolated() {
        let mut d = decoder("1\n{oops\n3\n{}", 5);
        let (entries, ret) = collect(&mut d).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].element(), Some(&json!(1)));
        match &entries[1] {
            StreamEntry::Error { origin, error } => {
                assert_eq!(origin, "test-origin");
                assert!(matches!(error, GraffitiError::InvalidResponse(_)));
            }
            other => panic!("expected error entry, got {other:?}"),
        }
        assert_eq!(entries[2].element(), Some(&json!(3)));
        assert_eq!(ret, Some(json!({})));
    }

    #[tokio::test]
    async fn corrupted_terminal_line_is_fatal() {
        let mut d = decoder("1\n2\n{oops", 3);
        assert!(matches!(d.next().await.unwrap(), Step::Yield(StreamEntry::Element(_))));
        assert!(matches!(d.next().await.unwrap(), Step::Yield(StreamEntry::Element(_))));
        assert!(matches!(d.next().await, Err(GraffitiError::InvalidResponse(_))));
        assert!(d.next().await.is_err());
    }

    #[tokio::test]
    async fn transform_failures_become_entries() {
        let mut d: JsonLinesDecoder<u64, ()> = JsonLinesDecoder::new(
            Box::new(ChunkedBody::split("1\n\"two\"\n3\n", 64)),
            "o",
            Box::new(|v| {
                v.as_u64()
                    .ok_or_else(|| GraffitiError::ProtocolViolation("not a number".into()))
            }),
            Box::new(|_| Ok(())),
        );
        let (entries, ()) = collect(&mut d).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].element(), Some(&1));
        assert!(matches!(
            entries[1],
            StreamEntry::Error { error: GraffitiError::ProtocolViolation(_), .. }
        ));
    }

    #[tokio::test]
    async fn return_transform_failure_is_fatal() {
        let mut d: JsonLinesDecoder<Value, ()> = JsonLinesDecoder::new(
            Box::new(ChunkedBody::split("1\n{\"unexpected\":true}", 64)),
            "o",
            Box::new(Ok),
            Box::new(|v| match v {
                None => Ok(()),
                Some(_) => Err(GraffitiError::ProtocolViolation("unexpected return".into())),
            }),
        );
        assert!(d.next().await.is_ok());
        assert!(matches!(d.next().await, Err(GraffitiError::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn many_lines_in_order() {
        let n = 50_000u64;
        let mut body = String::new();
        for i in 0..n {
            body.push_str(&i.to_string());
            body.push('\n');
        }
        body.push_str("\"end\"");
        let mut d = decoder(body, 7);
        let mut expected = 0u64;
        loop {
            match d.next().await.unwrap() {
                Step::Yield(entry) => {
                    assert_eq!(entry.element(), Some(&json!(expected)));
                    expected += 1;
                }
                Step::Return(ret) => {
                    assert_eq!(ret, Some(json!("end")));
                    break;
                }
            }
        }
        assert_eq!(expected, n);
    }

    #[tokio::test]
    async fn value_spanning_many_reads() {
        let big = "x".repeat(100_000);
        let body = format!("{}\n{}\n{{}}", json!({"big": big}), json!([1, 2, 3]));
        let mut d = decoder(body, 333);
        let (entries, ret) = collect(&mut d).await.unwrap();
        assert_eq!(elements(&entries), vec![json!({"big": big}), json!([1, 2, 3])]);
        assert_eq!(ret, Some(json!({})));
    }

    struct CountingBody {
        inner: ChunkedBody,
        reads: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BodyReader for CountingBody {
        async fn read_chunk(&mut self) -> GraffitiResult<Option<Bytes>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_chunk().await
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn reads_only_on_demand_and_releases_on_close() {
        let reads = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let body = CountingBody {
            inner: ChunkedBody::new(vec![
                Bytes::from_static(b"1\n2\n3\n"),
                Bytes::from_static(b"4\n5\n"),
                Bytes::from_static(b"{}"),
            ]),
            reads: reads.clone(),
            released: released.clone(),
        };
        let mut d: JsonLinesDecoder<Value, Value> =
            JsonLinesDecoder::new(Box::new(body), "o", Box::new(Ok), Box::new(|v| Ok(v.unwrap_or_default())));

        assert!(matches!(d.next().await.unwrap(), Step::Yield(_)));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(matches!(d.next().await.unwrap(), Step::Yield(_)));
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        d.close().await;
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(d.next().await.is_err());
    }
}

//! Accumulates streamed deltas into a complete answer while passing deltas through.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::types::{Delta, Usage};
use crate::Result;

/// Everything a drained stream contributed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Accumulated {
    /// The concatenation of every delta's content, in arrival order.
    pub content: String,
    /// The reason the provider gave for finishing, if it gave one.
    pub finish_reason: Option<String>,
    /// Usage, if the provider reported it in-band.
    pub usage: Option<Usage>,
}

/// A stream wrapper that accumulates [`Delta`]s into an [`Accumulated`] answer.
///
/// This allows rendering text to the user while simultaneously building the final answer.  The
/// wrapper ends right after the first delta carrying a finish reason, even if the inner stream
/// would keep going.  Errors pass through untouched; the caller decides whether the answer
/// survives them.
pub struct AccumulatingStream {
    inner: Pin<Box<dyn Stream<Item = Result<Delta>> + Send>>,
    answer: Accumulated,
    finished: bool,
}

impl AccumulatingStream {
    /// Wraps a delta stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Delta>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            answer: Accumulated::default(),
            finished: false,
        }
    }

    /// The content accumulated so far.
    pub fn content(&self) -> &str {
        &self.answer.content
    }

    /// True once a finish delta was seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the wrapper and return what it accumulated so far.
    pub fn into_parts(self) -> Accumulated {
        self.answer
    }

    fn accumulate(&mut self, delta: &Delta) {
        if let Some(content) = delta.content.as_deref() {
            self.answer.content.push_str(content);
        }
        if let Some(usage) = delta.usage {
            self.answer.usage = Some(usage);
        }
        if let Some(reason) = delta.finish_reason.as_deref() {
            self.answer.finish_reason = Some(reason.to_string());
            self.finished = true;
        }
    }
}

impl Stream for AccumulatingStream {
    type Item = Result<Delta>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let polled = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(Some(Ok(delta))) = &polled {
            self.accumulate(delta);
        }
        polled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use futures::{StreamExt, stream};

    #[tokio::test]
    async fn concatenates_in_arrival_order() {
        let deltas = vec![
            Ok(Delta::content("ab")),
            Ok(Delta::content("cd")),
            Ok(Delta::content("")),
            Ok(Delta::finish("stop")),
        ];
        let mut stream = AccumulatingStream::new(stream::iter(deltas));
        let mut seen = 0;
        while let Some(delta) = stream.next().await {
            delta.unwrap();
            seen += 1;
        }
        assert_eq!(seen, 4);
        let answer = stream.into_parts();
        assert_eq!(answer.content, "abcd");
        assert_eq!(answer.finish_reason.as_deref(), Some("stop"));
        assert!(answer.usage.is_none());
    }

    #[tokio::test]
    async fn stops_after_first_finish() {
        let deltas = vec![
            Ok(Delta::content("ab")),
            Ok(Delta::finish("stop")),
            Ok(Delta::content("ignored")),
        ];
        let mut stream = AccumulatingStream::new(stream::iter(deltas));
        while stream.next().await.is_some() {}
        assert!(stream.is_finished());
        assert_eq!(stream.content(), "ab");
    }

    #[tokio::test]
    async fn keeps_reported_usage() {
        let deltas = vec![
            Ok(Delta::content("hi")),
            Ok(Delta::finish("stop").with_usage(Usage::new(7, 1))),
        ];
        let mut stream = AccumulatingStream::new(stream::iter(deltas));
        while stream.next().await.is_some() {}
        let answer = stream.into_parts();
        assert_eq!(answer.usage, Some(Usage::new(7, 1)));
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let deltas = vec![
            Ok(Delta::content("ab")),
            Err(Error::streaming("connection reset", None)),
        ];
        let mut stream = AccumulatingStream::new(stream::iter(deltas));
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert!(!stream.is_finished());
        assert_eq!(stream.content(), "ab");
    }
}

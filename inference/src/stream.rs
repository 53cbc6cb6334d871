//! Streamed image descriptions.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::backend::BoxError;
use crate::error::{InferenceError, Result};
use crate::handle::CapabilityKind;
use crate::request::DescribeChunk;

enum Step {
    Cancelled,
    Chunk(Option<DescribeChunk>),
}

/// A lazy, finite, non-restartable sequence of description fragments.
///
/// The stream keeps a read lease on the model that produced it, so the model
/// cannot be unloaded until the stream is finished or dropped. An error
/// fragment from the model ends the stream with [`InferenceError::Upstream`];
/// a fired cancellation token ends it with [`InferenceError::Cancelled`].
/// After either, or after natural completion, the stream yields `None`.
pub struct DescriptionStream {
    inner: BoxStream<'static, Result<String>>,
}

impl DescriptionStream {
    pub(crate) fn new<L>(
        kind: CapabilityKind,
        mut chunks: BoxStream<'static, DescribeChunk>,
        lease: L,
        cancel: CancellationToken,
    ) -> Self
    where
        L: Send + 'static,
    {
        let inner = async_stream::stream! {
            let _lease = lease;
            loop {
                let step = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Step::Cancelled,
                    chunk = chunks.next() => Step::Chunk(chunk),
                };

                match step {
                    Step::Cancelled => {
                        yield Err(InferenceError::Cancelled);
                        break;
                    }
                    Step::Chunk(None) => break,
                    Step::Chunk(Some(chunk)) if chunk.is_error() => {
                        let source = BoxError::from(format!("model error: {}", chunk.content));
                        yield Err(InferenceError::Upstream { kind, source });
                        break;
                    }
                    Step::Chunk(Some(chunk)) => {
                        let done = chunk.finish.is_some();
                        if !chunk.content.is_empty() {
                            yield Ok(chunk.content);
                        }
                        if done {
                            break;
                        }
                    }
                }
            }
        };

        Self {
            inner: Box::pin(inner),
        }
    }

    /// Drain the stream and concatenate its fragments.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for DescriptionStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for DescriptionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptionStream").finish_non_exhaustive()
    }
}

//! Issues requests to the provider and assembles streamed answers.

use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::accumulating_stream::AccumulatingStream;
use crate::chat::ChatConfig;
use crate::client::Transport;
use crate::markdown;
use crate::observability::{STREAM_DELTAS, STREAM_DURATION, STREAM_RENDERS, STREAM_TTFB};
use crate::render::Renderer;
use crate::tokens::TokenAccountant;
use crate::types::{ChatRequest, ExchangeResult, Turn};

/// Minimum time between two live repaints.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Sends one request at a time through a [`Transport`].
///
/// The dispatcher never retries.  Every call ends in exactly one [`ExchangeResult`]; transport
/// errors are carried in the result rather than returned.
pub struct Dispatcher<T: Transport> {
    transport: T,
    refresh_interval: Duration,
}

impl<T: Transport> Dispatcher<T> {
    /// A dispatcher over `transport` that repaints live output at most four times a second.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Change the live repaint throttle.  `Duration::ZERO` repaints on every delta.
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `turns` using the current config and report progress to `renderer`.
    ///
    /// Canceling `cancel` ends the exchange as canceled; any text received so far is dropped.
    /// When the provider reports no usage it is estimated with `accountant`.
    pub async fn send(
        &self,
        turns: &[Turn],
        config: &ChatConfig,
        accountant: &TokenAccountant,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> ExchangeResult {
        let request =
            ChatRequest::new(config.model.clone(), turns.to_vec()).with_stream(config.stream);
        if config.stream {
            self.send_streaming(&request, config, accountant, renderer, cancel)
                .await
        } else {
            self.send_blocking(&request, config, accountant, renderer, cancel)
                .await
        }
    }

    async fn send_blocking(
        &self,
        request: &ChatRequest,
        config: &ChatConfig,
        accountant: &TokenAccountant,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> ExchangeResult {
        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                renderer.print_interrupted();
                return ExchangeResult::canceled();
            }
            completion = self.transport.complete(request) => completion,
        };
        let completion = match completion {
            Ok(completion) => completion,
            Err(err) => return ExchangeResult::failed(err),
        };

        let content = completion.content().to_string();
        let usage = completion
            .usage
            .unwrap_or_else(|| accountant.estimate(&request.messages, &content));
        let result = ExchangeResult::answered(content, Some(usage));
        if result.outcome.is_ok() {
            renderer.start_response();
            if config.markdown {
                renderer.update_live(&markdown::render(&result.content, config.use_color));
            } else {
                renderer.print_text(&result.content);
            }
            renderer.finish_response();
        }
        result
    }

    async fn send_streaming(
        &self,
        request: &ChatRequest,
        config: &ChatConfig,
        accountant: &TokenAccountant,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> ExchangeResult {
        let start = Instant::now();
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                renderer.print_interrupted();
                return ExchangeResult::canceled();
            }
            stream = self.transport.stream(request) => stream,
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => return ExchangeResult::failed(err),
        };

        let mut stream = AccumulatingStream::new(stream);
        let mut first_delta = true;
        let mut last_render: Option<Instant> = None;
        let mut stale = false;
        renderer.start_response();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(received = stream.content().len(), "stream canceled");
                    renderer.print_interrupted();
                    return ExchangeResult::canceled();
                }
                next = stream.next() => next,
            };
            let delta = match next {
                Some(Ok(delta)) => delta,
                Some(Err(err)) => {
                    renderer.finish_response();
                    return ExchangeResult::failed(err);
                }
                None => break,
            };

            STREAM_DELTAS.click();
            if first_delta {
                STREAM_TTFB.add(start.elapsed().as_secs_f64());
                first_delta = false;
            }
            let Some(text) = delta.content.as_deref().filter(|text| !text.is_empty()) else {
                continue;
            };
            if !config.markdown {
                renderer.print_text(text);
                continue;
            }
            stale = true;
            let due = last_render.is_none_or(|at| at.elapsed() >= self.refresh_interval);
            if due {
                renderer.update_live(&markdown::render(stream.content(), config.use_color));
                STREAM_RENDERS.click();
                last_render = Some(Instant::now());
                stale = false;
            }
        }
        if stale {
            renderer.update_live(&markdown::render(stream.content(), config.use_color));
            STREAM_RENDERS.click();
        }
        renderer.finish_response();
        STREAM_DURATION.add(start.elapsed().as_secs_f64());

        let answer = stream.into_parts();
        let usage = answer
            .usage
            .unwrap_or_else(|| accountant.estimate(&request.messages, &answer.content));
        ExchangeResult::answered(answer.content, Some(usage))
    }
}

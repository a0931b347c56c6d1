use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("gptcli.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("gptcli.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("gptcli.client.request_duration_seconds");

pub(crate) static STREAM_DELTAS: Counter = Counter::new("gptcli.stream.deltas");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("gptcli.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("gptcli.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("gptcli.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("gptcli.stream.duration_seconds");
pub(crate) static STREAM_RENDERS: Counter = Counter::new("gptcli.stream.renders");

pub(crate) static SESSION_EXCHANGES: Counter = Counter::new("gptcli.session.exchanges");
pub(crate) static SESSION_ROLLBACKS: Counter = Counter::new("gptcli.session.rollbacks");
pub(crate) static SESSION_CANCELLATIONS: Counter = Counter::new("gptcli.session.cancellations");
pub(crate) static SESSION_TOKENS: Counter = Counter::new("gptcli.session.tokens");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_DELTAS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);
    collector.register_counter(&STREAM_RENDERS);

    collector.register_counter(&SESSION_EXCHANGES);
    collector.register_counter(&SESSION_ROLLBACKS);
    collector.register_counter(&SESSION_CANCELLATIONS);
    collector.register_counter(&SESSION_TOKENS);
}

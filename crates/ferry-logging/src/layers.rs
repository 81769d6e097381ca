//! Custom tracing layers

use tracing::{Subscriber, span};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::config::JsonlConfig;
use crate::context::{PeerContextData, PeerContextGuard};

/// Layer that attaches the active node context to new spans
///
/// The context is stored as a [`PeerContextExtension`] so later layers and
/// formatters can read which node opened the span, even when the span is
/// entered again from another node's scope.
pub struct PeerContextLayer;

impl PeerContextLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PeerContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct PeerContextExtension {
    pub data: PeerContextData,
}

impl<S> Layer<S> for PeerContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(peer_ctx) = PeerContextGuard::current()
        {
            span.extensions_mut()
                .insert(PeerContextExtension { data: peer_ctx });
        }
    }
}

/// Build a JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(writer: W, config: &JsonlConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup> + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
        .boxed()
}

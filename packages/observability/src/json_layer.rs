//! JSONL layer.
//!
//! One event becomes one line:
//!
//! ```text
//! {"ts":"2026-03-02T09:14:07.512Z","level":"WARN","service":"medipulse-cli",
//!  "target":"medipulse_auth::client","message":"Token refresh failed, session cleared",
//!  "span":{"request_id":"5d0c..","method":"GET","path":"doctors"},
//!  "fields":{"error":"..","rejected_waiters":2}}
//! ```
//!
//! Values are masked as they are recorded, so span extensions and entries
//! only ever hold redacted data.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::redact::redact_value;

#[derive(Serialize)]
struct Entry<'a> {
    ts: String,
    level: &'static str,
    service: &'a str,
    target: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    span: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

/// Redacted fields of one span, stored in its extensions.
struct SpanFields(Map<String, Value>);

struct MaskingVisitor<'a> {
    fields: &'a mut Map<String, Value>,
    message: Option<String>,
}

impl<'a> MaskingVisitor<'a> {
    fn new(fields: &'a mut Map<String, Value>) -> Self {
        Self {
            fields,
            message: None,
        }
    }

    fn put(&mut self, field: &Field, value: Value) {
        let name = field.name();
        self.fields
            .insert(name.to_string(), redact_value(name, &value));
    }

    fn put_text(&mut self, field: &Field, text: String) {
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.put(field, Value::String(text));
        }
    }
}

impl Visit for MaskingVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put_text(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }
}

/// Layer writing one redacted JSON object per event.
pub(crate) struct JsonLayer<W> {
    service: String,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub(crate) fn new(service: String, make_writer: W) -> Self {
        Self {
            service,
            make_writer,
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = Map::new();
        attrs.record(&mut MaskingVisitor::new(&mut fields));
        span.extensions_mut().insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
            values.record(&mut MaskingVisitor::new(fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = Map::new();
        let message = {
            let mut visitor = MaskingVisitor::new(&mut fields);
            event.record(&mut visitor);
            visitor.message.unwrap_or_default()
        };

        // Outer spans first so inner values win on name clashes.
        let mut span = Map::new();
        if let Some(scope) = ctx.event_scope(event) {
            for enclosing in scope.from_root() {
                if let Some(SpanFields(recorded)) = enclosing.extensions().get::<SpanFields>() {
                    span.extend(recorded.clone());
                }
            }
        }

        let metadata = event.metadata();
        let entry = Entry {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: metadata.level().as_str(),
            service: &self.service,
            target: metadata.target(),
            message,
            span,
            fields,
        };

        let Ok(mut line) = serde_json::to_vec(&entry) else {
            return;
        };
        line.push(b'\n');
        let _ = self.make_writer.make_writer().write_all(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redact::REDACTED;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    /// In-memory sink for emitted lines.
    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Sink {
        type Writer = Sink;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Sink {
        fn lines(&self) -> Vec<Value> {
            String::from_utf8(self.0.lock().clone())
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    fn capture(emit: impl FnOnce()) -> Vec<Value> {
        let sink = Sink::default();
        let subscriber = tracing_subscriber::registry()
            .with(JsonLayer::new("medipulse-cli".to_string(), sink.clone()));
        tracing::subscriber::with_default(subscriber, emit);
        sink.lines()
    }

    #[test]
    fn event_carries_span_context_and_masks_tokens() {
        let lines = capture(|| {
            let span = tracing::info_span!("api_request", request_id = "r-1", path = "doctors");
            let _guard = span.enter();
            tracing::warn!(refresh_token = "R1", status = 401u64, "Token refresh failed");
        });

        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["service"], "medipulse-cli");
        assert_eq!(line["message"], "Token refresh failed");
        assert_eq!(line["span"]["request_id"], "r-1");
        assert_eq!(line["span"]["path"], "doctors");
        assert_eq!(line["fields"]["refresh_token"], REDACTED);
        assert_eq!(line["fields"]["status"], 401);
    }

    #[test]
    fn values_recorded_on_span_later_are_masked() {
        let lines = capture(|| {
            let span = tracing::info_span!("api_request", auth = tracing::field::Empty);
            span.record("auth", "Bearer A1");
            let _guard = span.enter();
            tracing::info!("Sending");
        });

        assert_eq!(lines[0]["span"]["auth"], REDACTED);
    }

    #[test]
    fn inner_span_fields_override_outer() {
        let lines = capture(|| {
            let outer = tracing::info_span!("command", path = "outer");
            let _outer = outer.enter();
            let inner = tracing::info_span!("api_request", path = "appointments/3");
            let _inner = inner.enter();
            tracing::debug!("Sent");
        });

        assert_eq!(lines[0]["span"]["path"], "appointments/3");
    }

    #[test]
    fn bare_event_omits_empty_maps() {
        let lines = capture(|| tracing::info!("Logged out"));

        let line = lines[0].as_object().unwrap();
        assert_eq!(line["message"], "Logged out");
        assert!(!line.contains_key("span"));
        assert!(!line.contains_key("fields"));
        assert!(line["ts"].as_str().unwrap().ends_with('Z'));
    }
}

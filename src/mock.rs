//! Mock implementations for testing
//!
//! Provides a scripted metrics source and notifier so the pipeline can be
//! exercised without a host or a chat service.

use crate::domain::ChannelId;
use crate::error::{SendError, SourceError};
use crate::notify::Notifier;
use crate::sources::MetricsSource;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Mock metrics source returning preset values
#[derive(Debug, Default)]
pub struct MockSource {
    values: Mutex<HashMap<String, f64>>,
    failures: Mutex<HashMap<String, SourceError>>,
}

impl MockSource {
    /// Create an empty source; every metric is unknown until set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: preset a metric value
    pub fn with_value(self, metric: &str, value: f64) -> Self {
        self.set(metric, value);
        self
    }

    /// Set the value returned for a metric
    pub fn set(&self, metric: &str, value: f64) {
        self.failures.lock().unwrap().remove(metric);
        self.values.lock().unwrap().insert(metric.to_string(), value);
    }

    /// Make a metric fail until it is set again
    pub fn fail(&self, metric: &str, error: SourceError) {
        self.failures
            .lock()
            .unwrap()
            .insert(metric.to_string(), error);
    }
}

impl MetricsSource for MockSource {
    fn sample(&self, metric: &str) -> Result<f64, SourceError> {
        if let Some(err) = self.failures.lock().unwrap().get(metric) {
            return Err(err.clone());
        }
        self.values
            .lock()
            .unwrap()
            .get(metric)
            .copied()
            .ok_or_else(|| SourceError::UnknownMetric(metric.to_string()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Notifier that replays scripted results per channel and records every attempt
#[derive(Debug, Default)]
pub struct ScriptedNotifier {
    script: Mutex<HashMap<ChannelId, VecDeque<Result<(), SendError>>>>,
    sent: Mutex<Vec<(ChannelId, String)>>,
    latency: Option<Duration>,
}

impl ScriptedNotifier {
    /// Create a notifier that succeeds unless scripted otherwise
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: sleep before answering each send
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue the result of the next send to `channel`
    pub fn push(&self, channel: &str, result: Result<(), SendError>) {
        self.script
            .lock()
            .unwrap()
            .entry(ChannelId::new(channel))
            .or_default()
            .push_back(result);
    }

    /// Every attempted send, in order
    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts of attempted sends to one channel
    pub fn sent_to(&self, channel: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c.as_str() == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Notifier for ScriptedNotifier {
    fn send(&self, channel: &ChannelId, text: &str) -> Result<(), SendError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.clone(), text.to_string()));
        self.script
            .lock()
            .unwrap()
            .get_mut(channel)
            .and_then(|results| results.pop_front())
            .unwrap_or(Ok(()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source() {
        let source = MockSource::new().with_value("cpu_percent", 42.0);
        assert_eq!(source.sample("cpu_percent").unwrap(), 42.0);
        assert!(source.sample("disk_percent").is_err());

        source.fail(
            "cpu_percent",
            SourceError::Unavailable {
                metric: "cpu_percent".into(),
                reason: "busy".into(),
            },
        );
        assert!(source.sample("cpu_percent").is_err());

        source.set("cpu_percent", 10.0);
        assert_eq!(source.sample("cpu_percent").unwrap(), 10.0);
    }

    #[test]
    fn test_scripted_notifier() {
        let notifier = ScriptedNotifier::new();
        notifier.push("ops", Err(SendError::Transient("503".into())));

        let ops = ChannelId::new("ops");
        assert!(notifier.send(&ops, "one").is_err());
        assert!(notifier.send(&ops, "two").is_ok());
        assert_eq!(notifier.sent_to("ops"), vec!["one", "two"]);
        assert_eq!(notifier.sent().len(), 2);
    }
}

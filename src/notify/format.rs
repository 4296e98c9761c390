//! Chat message rendering

use crate::domain::Event;
use crate::ingress::{truncate, MAX_MESSAGE_CHARS};

/// Renders events into plain chat text
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    /// Metadata entries shown below the body
    pub max_metadata_fields: usize,
    /// Hard cap on the rendered message
    pub max_chars: usize,
}

impl MessageFormatter {
    /// Render an event
    pub fn format(&self, event: &Event) -> String {
        let mut text = format!("{} {}\n{}\n", event.severity.badge(), event.title, event.message);

        text.push_str(&format!(
            "Source: {} ({}) | Category: {}",
            event.origin, event.source, event.category
        ));

        let fields: Vec<String> = event
            .metadata
            .iter()
            .take(self.max_metadata_fields)
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect();
        if !fields.is_empty() {
            text.push('\n');
            text.push_str(&fields.join(" | "));
        }

        let at = event.reported_at.unwrap_or(event.created_at);
        text.push_str(&format!("\n{}", at.format("%Y-%m-%d %H:%M:%S UTC")));

        truncate(&text, self.max_chars)
    }
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self {
            max_metadata_fields: 5,
            max_chars: MAX_MESSAGE_CHARS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventSource, Severity};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_event() {
        let event = Event::builder(EventSource::ExternalReport, "ci", "deployment")
            .severity(Severity::Critical)
            .title("Deploy failed")
            .message("Rollout of api stalled")
            .meta("environment", "prod")
            .build(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let text = MessageFormatter::default().format(&event);
        assert!(text.starts_with("[CRITICAL] Deploy failed\nRollout of api stalled\n"));
        assert!(text.contains("Source: ci (external-report) | Category: deployment"));
        assert!(text.contains("environment: prod"));
        assert!(text.ends_with("2024-05-01 12:00:00 UTC"));
    }

    #[test]
    fn test_metadata_fields_limited() {
        let mut builder = Event::builder(EventSource::ExternalReport, "ci", "x");
        for i in 0..10 {
            builder = builder.meta(format!("k{}", i), i as f64);
        }
        let event = builder.build(Utc::now());
        let formatter = MessageFormatter {
            max_metadata_fields: 3,
            ..Default::default()
        };
        let text = formatter.format(&event);
        assert!(text.contains("k2: 2"));
        assert!(!text.contains("k3: 3"));
    }

    #[test]
    fn test_format_respects_max_chars() {
        let event = Event::builder(EventSource::ExternalReport, "ci", "x")
            .message("y".repeat(100))
            .build(Utc::now());
        let formatter = MessageFormatter {
            max_chars: 20,
            ..Default::default()
        };
        assert_eq!(formatter.format(&event).chars().count(), 20);
    }
}

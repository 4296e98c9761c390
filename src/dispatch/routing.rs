//! Destination routing
//!
//! Maps an event's category to the channel it is delivered to. News goes to
//! the news channel, everything else to the status channel, unless a
//! category has an explicit route.

use crate::domain::{ChannelId, Event};
use crate::ingress::NEWS_CATEGORY;
use std::collections::HashMap;

/// Category to channel lookup table
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    status: Option<ChannelId>,
    news: Option<ChannelId>,
    routes: HashMap<String, ChannelId>,
}

impl RoutingTable {
    /// Create a table with the default status and news channels
    pub fn new(status: Option<ChannelId>, news: Option<ChannelId>) -> Self {
        Self {
            status,
            news,
            routes: HashMap::new(),
        }
    }

    /// Route a category to a specific channel
    pub fn with_route(mut self, category: impl Into<String>, channel: ChannelId) -> Self {
        self.routes.insert(category.into(), channel);
        self
    }

    /// Route several categories
    pub fn with_routes<I>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = (String, ChannelId)>,
    {
        self.routes.extend(routes);
        self
    }

    /// Resolve the destination for an event, if any channel is configured
    pub fn resolve(&self, event: &Event) -> Option<&ChannelId> {
        if let Some(channel) = self.routes.get(&event.category) {
            return Some(channel);
        }
        if event.category == NEWS_CATEGORY {
            self.news.as_ref()
        } else {
            self.status.as_ref()
        }
    }

    /// Every channel this table can route to
    pub fn channels(&self) -> Vec<&ChannelId> {
        let mut channels: Vec<&ChannelId> = self
            .status
            .iter()
            .chain(self.news.iter())
            .chain(self.routes.values())
            .collect();
        channels.sort();
        channels.dedup();
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventSource;
    use chrono::Utc;

    fn event(category: &str) -> Event {
        Event::builder(EventSource::ExternalReport, "src", category).build(Utc::now())
    }

    #[test]
    fn test_default_routing() {
        let table = RoutingTable::new(Some("status".into()), Some("news".into()));
        assert_eq!(table.resolve(&event("deployment")).unwrap().as_str(), "status");
        assert_eq!(table.resolve(&event("status")).unwrap().as_str(), "status");
        assert_eq!(table.resolve(&event(NEWS_CATEGORY)).unwrap().as_str(), "news");
    }

    #[test]
    fn test_explicit_route_wins() {
        let table = RoutingTable::new(Some("status".into()), None)
            .with_route("cpu_percent", ChannelId::new("infra"));
        assert_eq!(table.resolve(&event("cpu_percent")).unwrap().as_str(), "infra");
    }

    #[test]
    fn test_unconfigured_channel_resolves_to_none() {
        let table = RoutingTable::new(Some("status".into()), None);
        assert!(table.resolve(&event(NEWS_CATEGORY)).is_none());
        assert!(RoutingTable::default().resolve(&event("x")).is_none());
    }

    #[test]
    fn test_channels_deduplicated() {
        let table = RoutingTable::new(Some("ops".into()), Some("ops".into()))
            .with_route("deploy", ChannelId::new("ci"));
        assert_eq!(table.channels().len(), 2);
    }
}

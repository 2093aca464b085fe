//! Destination matching.
//!
//! Matching is first-match-wins over table order: overlapping entries are not
//! deduplicated, so the most specific entries must come first in the file.

use tracing::{debug, warn};

use super::table::{Destination, RoutingTable, SplunkDestination};
use crate::domain::AlertEvent;
use crate::{Error, Result};

/// Matches inbound events against one routing snapshot.
pub struct DestinationResolver<'a> {
    table: &'a RoutingTable,
}

impl<'a> DestinationResolver<'a> {
    pub fn new(table: &'a RoutingTable) -> Self {
        Self { table }
    }

    /// First destination whose `receiver` equals the event receiver
    /// (case-insensitive) and whose `severity` token is contained in the first
    /// alert's `severity` label (case-insensitive).
    pub fn resolve_prometheus(&self, event: &AlertEvent) -> Result<&'a Destination> {
        debug!(receiver = %event.receiver, "Looking for a prometheus destination");

        let severity = event
            .first_alert_severity()
            .map(str::to_lowercase)
            .unwrap_or_default();

        let receiver = event.receiver.to_lowercase();
        let found = if event.alerts.is_empty() {
            None
        } else {
            self.table.destinations.iter().find(|dest| {
                dest.receiver.to_lowercase() == receiver
                    && severity.contains(&dest.severity.to_lowercase())
            })
        };

        found.ok_or_else(|| {
            warn!(receiver = %event.receiver, severity = %severity, "No receiver match found");
            Error::no_destination("prometheus", event.receiver.clone())
        })
    }

    /// First splunk destination whose `subroute` equals `route`
    /// (case-insensitive, exact). An empty route never matches.
    pub fn resolve_splunk(&self, route: &str) -> Result<&'a SplunkDestination> {
        debug!(route = %route, "Looking for a splunk destination");

        let route_key = route.to_lowercase();
        let found = if route.is_empty() {
            None
        } else {
            self.table
                .splunk_destinations
                .iter()
                .find(|dest| !dest.subroute.is_empty() && dest.subroute.to_lowercase() == route_key)
        };

        found.ok_or_else(|| {
            warn!(route = %route, "No subroute match found");
            Error::no_destination("splunk", route)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Alert;
    use crate::routing::table::{ChannelTarget, SmsTarget};

    fn dest(receiver: &str, severity: &str, group: &str) -> Destination {
        Destination {
            receiver: receiver.to_string(),
            severity: severity.to_string(),
            types: vec![ChannelTarget::Sms(SmsTarget {
                group_name: group.to_string(),
                sender: None,
            })],
        }
    }

    fn splunk(subroute: &str) -> SplunkDestination {
        SplunkDestination {
            subroute: subroute.to_string(),
            keys: vec![],
            types: vec![],
        }
    }

    fn event(receiver: &str, severity: Option<&str>) -> AlertEvent {
        let mut alert: Alert = serde_json::from_str("{}").unwrap();
        if let Some(severity) = severity {
            alert.labels.insert("severity".to_string(), severity.to_string());
        }
        let mut event: AlertEvent = serde_json::from_str("{}").unwrap();
        event.receiver = receiver.to_string();
        event.alerts.push(alert);
        event
    }

    #[test]
    fn test_first_match_wins() {
        let table = RoutingTable::new(
            vec![dest("sre", "crit", "first"), dest("sre", "critical", "second")],
            vec![],
        );
        let resolver = DestinationResolver::new(&table);
        let found = resolver
            .resolve_prometheus(&event("sre", Some("critical")))
            .unwrap();
        assert_eq!(found, &table.destinations[0]);

        let reordered = RoutingTable::new(
            vec![dest("sre", "critical", "second"), dest("sre", "crit", "first")],
            vec![],
        );
        let found = DestinationResolver::new(&reordered)
            .resolve_prometheus(&event("sre", Some("critical")))
            .unwrap();
        assert_eq!(found.types, reordered.destinations[0].types);
        assert_ne!(found.types, table.destinations[0].types);
    }

    #[test]
    fn test_case_insensitive_receiver_and_severity() {
        let table = RoutingTable::new(vec![dest("SRE-Team", "Warning", "g")], vec![]);
        let resolver = DestinationResolver::new(&table);
        assert!(
            resolver
                .resolve_prometheus(&event("sre-team", Some("WARNING-high")))
                .is_ok()
        );
        assert!(
            resolver
                .resolve_prometheus(&event("sre-team", Some("critical")))
                .is_err()
        );
        assert!(
            resolver
                .resolve_prometheus(&event("sre-team-2", Some("warning")))
                .is_err()
        );

        let table = RoutingTable::new(vec![dest("ÉQUIPE", "critical", "g")], vec![]);
        assert!(
            DestinationResolver::new(&table)
                .resolve_prometheus(&event("équipe", Some("critical")))
                .is_ok()
        );
    }

    #[test]
    fn test_empty_alert_list_never_matches() {
        let table = RoutingTable::new(vec![dest("sre", "", "g")], vec![]);
        let resolver = DestinationResolver::new(&table);

        let mut empty: AlertEvent = serde_json::from_str("{}").unwrap();
        empty.receiver = "sre".to_string();
        let err = resolver.resolve_prometheus(&empty).unwrap_err();
        assert!(matches!(err, Error::NoDestination { source_kind: "prometheus", .. }));

        // An empty severity token is a substring of anything, including "".
        assert!(resolver.resolve_prometheus(&event("sre", None)).is_ok());
    }

    #[test]
    fn test_splunk_exact_case_insensitive() {
        let table = RoutingTable::new(vec![], vec![splunk("auth"), splunk("Auth-Failures")]);
        let resolver = DestinationResolver::new(&table);

        assert_eq!(resolver.resolve_splunk("AUTH").unwrap().subroute, "auth");
        assert_eq!(
            resolver.resolve_splunk("auth-failures").unwrap().subroute,
            "Auth-Failures"
        );
        assert!(resolver.resolve_splunk("aut").is_err());
        assert!(resolver.resolve_splunk("auth-fail").is_err());

        let table = RoutingTable::new(vec![], vec![splunk("Überwachung")]);
        assert_eq!(
            DestinationResolver::new(&table)
                .resolve_splunk("überwachung")
                .unwrap()
                .subroute,
            "Überwachung"
        );
    }

    #[test]
    fn test_empty_splunk_route_never_matches() {
        let table = RoutingTable::new(vec![], vec![splunk(""), splunk("auth")]);
        let err = DestinationResolver::new(&table)
            .resolve_splunk("")
            .unwrap_err();
        assert!(matches!(err, Error::NoDestination { source_kind: "splunk", .. }));
    }
}

//! Routing-protocol collaborator seam.
//!
//! The BGP speaker is an external collaborator: the reconcilers only
//! consume its route knowledge and hand it advertisement requests. The
//! [`RouteSpeaker`] trait is that contract; [`InMemorySpeaker`] implements
//! it for tests and for wiring without a live speaker.

use async_trait::async_trait;
use srv6_types::{Ipv6Prefix, RouteTarget, Sid, VrfId};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// A remotely learned, SID-tagged route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LearnedRoute {
    pub prefix: Ipv6Prefix,
    pub sid: Sid,
    pub route_target: RouteTarget,
}

/// A route advertisement request for a locally originated prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub prefix: Ipv6Prefix,
    pub sid: Sid,
    pub route_target: RouteTarget,
}

/// Result type alias for speaker calls.
pub type SpeakerResult<T> = Result<T, SpeakerError>;

/// Errors from the routing-protocol collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpeakerError {
    #[error("speaker unavailable: {0}")]
    Unavailable(String),
}

/// Interface to the routing-protocol speaker.
///
/// `learned_routes` and `local_prefixes` snapshot the speaker's current
/// knowledge; desired state is always recomputed from a fresh snapshot,
/// never patched incrementally from individual events.
#[async_trait]
pub trait RouteSpeaker: Send + Sync {
    /// Active remotely learned routes whose route target matches
    /// `import_rt`.
    async fn learned_routes(&self, import_rt: RouteTarget) -> SpeakerResult<Vec<LearnedRoute>>;

    /// Locally originated prefixes currently active in `vrf`.
    async fn local_prefixes(&self, vrf: VrfId) -> SpeakerResult<Vec<Ipv6Prefix>>;

    /// Requests advertisement of a locally originated prefix.
    async fn advertise(&self, adv: Advertisement) -> SpeakerResult<()>;

    /// Requests withdrawal of a previously advertised prefix.
    async fn withdraw(&self, prefix: Ipv6Prefix) -> SpeakerResult<()>;
}

/// Outbound request recorded by [`InMemorySpeaker`], in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakerEvent {
    Advertise(Advertisement),
    Withdraw(Ipv6Prefix),
}

/// In-process [`RouteSpeaker`] holding route state set directly by tests
/// or local wiring. Records every advertise/withdraw request so ordering
/// rules can be asserted.
#[derive(Default)]
pub struct InMemorySpeaker {
    learned: Mutex<Vec<LearnedRoute>>,
    local: Mutex<HashMap<VrfId, Vec<Ipv6Prefix>>>,
    events: Mutex<Vec<SpeakerEvent>>,
    unavailable: Mutex<bool>,
}

impl InMemorySpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set of remotely learned routes.
    pub fn set_learned(&self, routes: Vec<LearnedRoute>) {
        *self.learned.lock().unwrap() = routes;
    }

    /// Replaces the locally originated prefixes for a VRF.
    pub fn set_local(&self, vrf: VrfId, prefixes: Vec<Ipv6Prefix>) {
        self.local.lock().unwrap().insert(vrf, prefixes);
    }

    /// Makes subsequent advertise/withdraw calls fail. Test aid.
    pub fn set_unavailable(&self, down: bool) {
        *self.unavailable.lock().unwrap() = down;
    }

    /// Requests recorded so far, oldest first.
    pub fn events(&self) -> Vec<SpeakerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    fn check_up(&self) -> SpeakerResult<()> {
        if *self.unavailable.lock().unwrap() {
            Err(SpeakerError::Unavailable("session down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RouteSpeaker for InMemorySpeaker {
    async fn learned_routes(&self, import_rt: RouteTarget) -> SpeakerResult<Vec<LearnedRoute>> {
        Ok(self
            .learned
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.route_target == import_rt)
            .cloned()
            .collect())
    }

    async fn local_prefixes(&self, vrf: VrfId) -> SpeakerResult<Vec<Ipv6Prefix>> {
        Ok(self
            .local
            .lock()
            .unwrap()
            .get(&vrf)
            .cloned()
            .unwrap_or_default())
    }

    async fn advertise(&self, adv: Advertisement) -> SpeakerResult<()> {
        self.check_up()?;
        self.events
            .lock()
            .unwrap()
            .push(SpeakerEvent::Advertise(adv));
        Ok(())
    }

    async fn withdraw(&self, prefix: Ipv6Prefix) -> SpeakerResult<()> {
        self.check_up()?;
        self.events.lock().unwrap().push(SpeakerEvent::Withdraw(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route(prefix: &str, sid: &str, rt: &str) -> LearnedRoute {
        LearnedRoute {
            prefix: prefix.parse().unwrap(),
            sid: sid.parse().unwrap(),
            route_target: rt.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_learned_routes_filtered_by_route_target() {
        let speaker = InMemorySpeaker::new();
        speaker.set_learned(vec![
            route("fd10::/64", "fd00::1", "64512:100"),
            route("fd20::/64", "fd00::2", "64512:200"),
        ]);

        let routes = speaker.learned_routes("64512:100".parse().unwrap()).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].prefix, "fd10::/64".parse().unwrap());
    }

    #[tokio::test]
    async fn test_events_recorded_in_order() {
        let speaker = InMemorySpeaker::new();
        let adv = Advertisement {
            prefix: "fd10::/64".parse().unwrap(),
            sid: "fd00::1".parse().unwrap(),
            route_target: "64512:100".parse().unwrap(),
        };

        speaker.advertise(adv.clone()).await.unwrap();
        speaker.withdraw(adv.prefix).await.unwrap();

        assert_eq!(
            speaker.events(),
            vec![
                SpeakerEvent::Advertise(adv.clone()),
                SpeakerEvent::Withdraw(adv.prefix),
            ]
        );
    }

    #[tokio::test]
    async fn test_unavailable_speaker_rejects_requests() {
        let speaker = InMemorySpeaker::new();
        speaker.set_unavailable(true);

        let err = speaker.withdraw("fd10::/64".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, SpeakerError::Unavailable(_)));
        assert!(speaker.events().is_empty());
    }
}

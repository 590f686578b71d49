//! Per-interaction round state.
//!
//! Owned by the host and passed by reference into every entry point, so it can
//! be persisted between re-renders with any serde format.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::models::{
    AuthenticationRequest, AuthenticationResponse, ProtocolVersion, ResponseSnapshot,
};

/// A dispatched request the round is still waiting on.
///
/// The immediate and setup forms of a request share one entry: their replies
/// carry the same callback arguments and cannot be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub index: usize,
    pub endpoint: Url,
    pub claimed_identity: String,
    /// Identity sent in `openid.identity`.
    pub local_identity: String,
    pub version: ProtocolVersion,
    /// Return-to URL exactly as sent, callback arguments included.
    pub return_to: Url,
}

impl From<&AuthenticationRequest> for PendingRequest {
    fn from(request: &AuthenticationRequest) -> Self {
        Self {
            index: request.index(),
            endpoint: request.endpoint().provider_uri.clone(),
            claimed_identity: request.endpoint().claimed_identity.clone(),
            local_identity: request.endpoint().provider_local_identity().to_owned(),
            version: request.endpoint().version,
            return_to: request.return_to_with_arguments(),
        }
    }
}

/// Most recent completed result of the round, keyed by its callback payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    snapshot: Option<ResponseSnapshot>,
}

impl ResponseCache {
    /// Token associated with the stored snapshot.
    #[must_use]
    pub fn auth_data(&self) -> Option<&str> {
        self.auth_data.as_deref()
    }

    /// `true` when `token` names a payload the cache has not seen yet.
    #[must_use]
    pub fn is_fresh(&self, token: &str) -> bool {
        !token.is_empty() && self.auth_data.as_deref() != Some(token)
    }

    /// Record the snapshot of `response` under `token`.
    pub fn store(&mut self, token: &str, response: &AuthenticationResponse) -> ResponseSnapshot {
        let snapshot = ResponseSnapshot::from(response);
        self.auth_data = Some(token.to_owned());
        self.snapshot = Some(snapshot.clone());
        snapshot
    }

    /// Stored snapshot, unless a non-empty `token` names a different payload.
    #[must_use]
    pub fn load(&self, token: Option<&str>) -> Option<&ResponseSnapshot> {
        match token {
            Some(t) if !t.is_empty() && self.auth_data.as_deref() != Some(t) => None,
            _ => self.snapshot.as_ref(),
        }
    }

    pub fn clear(&mut self) {
        self.auth_data = None;
        self.snapshot = None;
    }
}

/// State of one interaction round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    round_id: Option<Uuid>,
    #[serde(default)]
    pending: Vec<PendingRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settled: Option<usize>,
    #[serde(default)]
    cache: ResponseCache,
}

impl RoundState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn round_id(&self) -> Option<Uuid> {
        self.round_id
    }

    /// Start a new round, forgetting pending requests of the previous one.
    ///
    /// The snapshot cache is kept: it is invalidated by token, not by round.
    pub fn begin(&mut self, round_id: Uuid) {
        self.round_id = Some(round_id);
        self.pending.clear();
        self.settled = None;
    }

    pub fn track(&mut self, request: PendingRequest) {
        if let Some(slot) = self.pending.iter_mut().find(|p| p.index == request.index) {
            *slot = request;
        } else {
            self.pending.push(request);
        }
    }

    #[must_use]
    pub fn pending(&self, index: usize) -> Option<&PendingRequest> {
        self.pending.iter().find(|p| p.index == index)
    }

    #[must_use]
    pub fn pending_requests(&self) -> &[PendingRequest] {
        &self.pending
    }

    /// Mark the round as won by the request at `index`.
    pub fn settle(&mut self, index: usize) {
        self.settled = Some(index);
    }

    #[must_use]
    pub fn settled_by(&self) -> Option<usize> {
        self.settled
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settled.is_some()
    }

    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResponseCache {
        &mut self.cache
    }
}

// HTTP implementation of the roster store against the hosted backend.
//
// CRUD goes over a JSON REST surface; the change feed is a WebSocket. The
// backend owns row-level security and the uniqueness constraints — this
// client only maps transport results onto the [`StoreError`] taxonomy
// (409 -> Conflict, 404 -> NotFound, 4xx -> Validation, everything
// transport-shaped -> Network).

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::model::{DraftPick, DraftStatus, Event, NewPick, Player, Team};
use crate::realtime;
use crate::store::{RosterStore, StoreError, StoreResult, Subscription};

pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
    realtime_url: String,
    api_key: Option<String>,
}

impl HttpStore {
    /// Create a client for the store at `base_url` (REST) and
    /// `realtime_url` (WebSocket feed). Trailing slashes are tolerated.
    pub fn new(base_url: &str, realtime_url: &str, api_key: Option<String>) -> Self {
        HttpStore {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            realtime_url: realtime_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn feed_url(&self, event_id: &str) -> String {
        format!("{}/feed?event={}", self.realtime_url, event_id)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> StoreResult<T> {
        let req = self.apply_auth(self.http.get(self.url(path)));
        let resp = req.send().await.map_err(to_network_error)?;
        read_json(resp).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> StoreResult<T> {
        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(to_network_error)?;
        read_json(resp).await
    }
}

/// Map an HTTP status onto the store error taxonomy. `None` means success.
pub(crate) fn status_to_error(status: StatusCode, body: &str) -> Option<StoreError> {
    if status.is_success() {
        return None;
    }
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        body.to_string()
    };
    Some(match status {
        StatusCode::CONFLICT => StoreError::Conflict(detail),
        StatusCode::NOT_FOUND => StoreError::NotFound(detail),
        s if s.is_client_error() => StoreError::Validation(detail),
        _ => StoreError::Network(detail),
    })
}

fn to_network_error(e: reqwest::Error) -> StoreError {
    StoreError::Network(e.to_string())
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> StoreResult<T> {
    let status = resp.status();
    let body = resp.text().await.map_err(to_network_error)?;
    if let Some(err) = status_to_error(status, &body) {
        return Err(err);
    }
    serde_json::from_str(&body)
        .map_err(|e| StoreError::Validation(format!("unexpected response body: {e}")))
}

async fn read_empty(resp: reqwest::Response) -> StoreResult<()> {
    let status = resp.status();
    let body = resp.text().await.map_err(to_network_error)?;
    match status_to_error(status, &body) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[async_trait]
impl RosterStore for HttpStore {
    async fn get_event(&self, event_id: &str) -> StoreResult<Event> {
        self.get_json(&format!("events/{event_id}")).await
    }

    async fn list_teams(&self, event_id: &str) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = self.get_json(&format!("events/{event_id}/teams")).await?;
        // The backend usually orders these already; sorting again costs
        // nothing and the coordinator depends on the order.
        teams.sort_by_key(|t| t.draft_order);
        Ok(teams)
    }

    async fn list_players(&self, event_id: &str) -> StoreResult<Vec<Player>> {
        self.get_json(&format!("events/{event_id}/players")).await
    }

    async fn list_picks(&self, event_id: &str) -> StoreResult<Vec<DraftPick>> {
        let mut picks: Vec<DraftPick> =
            self.get_json(&format!("events/{event_id}/picks")).await?;
        picks.sort_by_key(|p| p.pick_number);
        Ok(picks)
    }

    async fn create_pick(&self, pick: NewPick) -> StoreResult<DraftPick> {
        let url = self.url(&format!("events/{}/picks", pick.event_id));
        self.send_json(self.http.post(url).json(&pick)).await
    }

    async fn delete_all_picks(&self, event_id: &str) -> StoreResult<()> {
        let url = self.url(&format!("events/{event_id}/picks"));
        let resp = self
            .apply_auth(self.http.delete(url))
            .send()
            .await
            .map_err(to_network_error)?;
        read_empty(resp).await
    }

    async fn get_status(&self, event_id: &str) -> StoreResult<Option<DraftStatus>> {
        match self
            .get_json::<DraftStatus>(&format!("events/{event_id}/status"))
            .await
        {
            Ok(status) => Ok(Some(status)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_status(
        &self,
        event_id: &str,
        current_pick: u32,
        paused: bool,
    ) -> StoreResult<DraftStatus> {
        let url = self.url(&format!("events/{event_id}/status"));
        let body = serde_json::json!({
            "current_pick": current_pick,
            "paused": paused,
        });
        self.send_json(self.http.put(url).json(&body)).await
    }

    async fn subscribe(&self, event_id: &str) -> StoreResult<Subscription> {
        let feed_url = self.feed_url(event_id);
        let (ws, _) = tokio_tungstenite::connect_async(&feed_url)
            .await
            .map_err(|e| StoreError::Network(format!("feed connect failed: {e}")))?;
        info!("Change feed connected for event {event_id}");

        let (tx, rx) = mpsc::channel(256);
        let event_id = event_id.to_string();
        let task = tokio::spawn(async move {
            let (_write, read) = ws.split();
            if realtime::pump_change_stream(read, &tx, &event_id)
                .await
                .is_err()
            {
                // Subscription receiver dropped; nothing left to do.
                return;
            }
            warn!("Change feed for event {event_id} ended");
            // Dropping tx closes the channel, which the consumer observes
            // as feed loss and answers with a full refetch + resubscribe.
        });

        Ok(Subscription::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let store = HttpStore::new("https://api.example.com/v1/", "wss://rt.example.com/", None);
        assert_eq!(
            store.url("events/e1/picks"),
            "https://api.example.com/v1/events/e1/picks"
        );
        assert_eq!(
            store.feed_url("e1"),
            "wss://rt.example.com/feed?event=e1"
        );
    }

    #[test]
    fn conflict_status_maps_to_conflict() {
        let err = status_to_error(StatusCode::CONFLICT, "player taken").unwrap();
        assert!(matches!(err, StoreError::Conflict(m) if m == "player taken"));
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = status_to_error(StatusCode::NOT_FOUND, "").unwrap();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn other_client_errors_map_to_validation() {
        let err = status_to_error(StatusCode::UNPROCESSABLE_ENTITY, "bad pick").unwrap();
        assert!(matches!(err, StoreError::Validation(_)));
        let err = status_to_error(StatusCode::BAD_REQUEST, "").unwrap();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn server_errors_map_to_network() {
        let err = status_to_error(StatusCode::INTERNAL_SERVER_ERROR, "").unwrap();
        assert!(matches!(err, StoreError::Network(_)));
        let err = status_to_error(StatusCode::BAD_GATEWAY, "").unwrap();
        assert!(matches!(err, StoreError::Network(_)));
    }

    #[test]
    fn success_maps_to_none() {
        assert!(status_to_error(StatusCode::OK, "").is_none());
        assert!(status_to_error(StatusCode::CREATED, "").is_none());
    }
}

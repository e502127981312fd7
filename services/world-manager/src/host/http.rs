//! HTTP client for the session hosting service.
//!
//! Endpoints:
//! - `POST {base}/fleets/{alias}/sessions` creates a session
//! - `GET {base}/fleets/{alias}/sessions?limit=&next_token=` lists sessions
//! - `POST {base}/sessions/{id}/reservations` reserves a player slot

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use worldfleet_id::{GameSessionId, PlayerId};

use super::{CreateSessionRequest, HostClient, HostError, HostResult, SessionPage};
use crate::models::{HostedSession, Reservation};

/// Session host API client.
pub struct HttpHostClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSessionResponse {
    game_session: CreatedSession,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedSession {
    game_session_id: GameSessionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListSessionsResponse {
    /// Entries are read one by one so a foreign session cannot fail the page.
    #[serde(default)]
    game_sessions: Vec<serde_json::Value>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReservationRequest<'a> {
    player_id: &'a PlayerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReservationResponse {
    player_session: Reservation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    message: String,
}

impl HttpHostClient {
    /// Create a new client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> HostResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HostError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> HostResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))
    }

    /// Map a non-success response to an error.
    ///
    /// `client_errors_reject` treats 4xx answers as authoritative refusals.
    async fn error_for(response: reqwest::Response, client_errors_reject: bool) -> HostError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return HostError::Throttled;
        }

        if client_errors_reject && status.is_client_error() {
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            return HostError::Rejected { reason };
        }

        error!(status = %status, body = %body, "Unexpected host response");
        HostError::Unexpected {
            status: status.as_u16(),
            body,
        }
    }
}

fn transport(e: reqwest::Error) -> HostError {
    HostError::Transport(e.to_string())
}

#[async_trait]
impl HostClient for HttpHostClient {
    async fn create_session(&self, request: &CreateSessionRequest) -> HostResult<GameSessionId> {
        let url = format!("{}/fleets/{}/sessions", self.base_url, request.fleet_alias);
        debug!(url = %url, name = %request.name, location = %request.location, "Creating game session");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, false).await);
        }

        let created: CreateSessionResponse = Self::read_json(response).await?;
        Ok(created.game_session.game_session_id)
    }

    async fn list_sessions(
        &self,
        fleet_alias: &str,
        page_size: u32,
        next_token: Option<&str>,
    ) -> HostResult<SessionPage> {
        let url = format!("{}/fleets/{}/sessions", self.base_url, fleet_alias);

        let mut request = self.client.get(&url).query(&[("limit", page_size)]);
        if let Some(token) = next_token {
            request = request.query(&[("next_token", token)]);
        }

        let response = request.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::error_for(response, false).await);
        }

        let page: ListSessionsResponse = Self::read_json(response).await?;
        debug!(
            sessions = page.game_sessions.len(),
            more = page.next_token.is_some(),
            "Fetched game session page"
        );

        let mut listed = SessionPage {
            next: page.next_token.filter(|t| !t.is_empty()),
            ..SessionPage::default()
        };
        for raw in page.game_sessions {
            match HostedSession::from_listing(raw) {
                Ok(session) => listed.sessions.push(session),
                Err(unreadable) => listed.unreadable.push(unreadable),
            }
        }
        Ok(listed)
    }

    async fn create_reservation(
        &self,
        game_session_id: &GameSessionId,
        player_id: &PlayerId,
    ) -> HostResult<Reservation> {
        let url = format!("{}/sessions/{}/reservations", self.base_url, game_session_id);

        let response = self
            .client
            .post(&url)
            .json(&ReservationRequest { player_id })
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, true).await);
        }

        let reservation: ReservationResponse = Self::read_json(response).await?;
        Ok(reservation.player_session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SessionProperty;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpHostClient {
        HttpHostClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn hosted_json(name: &str, status: &str) -> serde_json::Value {
        serde_json::json!({
            "Location": "us-east-1",
            "Name": name,
            "Status": status,
            "GameSessionId": format!("gsess-{name}"),
            "CurrentPlayerSessionCount": 2,
            "CreationTime": "2026-06-01T12:00:00Z",
        })
    }

    #[tokio::test]
    async fn test_create_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fleets/alias-1/sessions"))
            .and(body_partial_json(serde_json::json!({
                "Name": "castle",
                "MaximumPlayerSessionCount": 50,
                "GameProperties": [{"Key": "WorldMap", "Value": "castle_map"}],
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "GameSession": {"GameSessionId": "gsess-123"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CreateSessionRequest {
            fleet_alias: "alias-1".to_string(),
            max_players: 50,
            name: "castle".parse().unwrap(),
            properties: vec![SessionProperty::new("WorldMap", "castle_map")],
            location: "us-east-1".parse().unwrap(),
        };

        let id = client(&server).create_session(&request).await.unwrap();
        assert_eq!(id.as_str(), "gsess-123");
    }

    #[tokio::test]
    async fn test_list_sessions_follows_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fleets/alias-1/sessions"))
            .and(query_param("next_token", "t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "GameSessions": [hosted_json("forest", "TERMINATED")],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fleets/alias-1/sessions"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "GameSessions": [hosted_json("castle", "ACTIVE")],
                "NextToken": "t2",
            })))
            .mount(&server)
            .await;

        let host = client(&server);
        let first = host.list_sessions("alias-1", 100, None).await.unwrap();
        assert_eq!(first.sessions.len(), 1);
        assert_eq!(first.next.as_deref(), Some("t2"));

        let second = host.list_sessions("alias-1", 100, Some("t2")).await.unwrap();
        assert_eq!(second.sessions[0].instance_name.as_str(), "forest");
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_keeps_page_with_foreign_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fleets/alias-1/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "GameSessions": [
                    hosted_json("castle", "ACTIVE"),
                    hosted_json("manual session", "ACTIVE"),
                    hosted_json("forest", "HIBERNATING"),
                ],
            })))
            .mount(&server)
            .await;

        let page = client(&server).list_sessions("alias-1", 100, None).await.unwrap();

        assert_eq!(page.sessions.len(), 1);
        assert_eq!(page.sessions[0].instance_name.as_str(), "castle");
        assert_eq!(page.unreadable.len(), 2);
        assert_eq!(page.unreadable[0].name.as_deref(), Some("manual session"));
    }

    #[tokio::test]
    async fn test_list_sessions_throttled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client(&server).list_sessions("alias-1", 100, None).await;
        assert_eq!(result.unwrap_err(), HostError::Throttled);
    }

    #[tokio::test]
    async fn test_reservation_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/gsess-1/reservations"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({"Message": "game session is full"})),
            )
            .mount(&server)
            .await;

        let result = client(&server)
            .create_reservation(&"gsess-1".parse().unwrap(), &"player-1".parse().unwrap())
            .await;

        assert_eq!(
            result.unwrap_err(),
            HostError::Rejected {
                reason: "game session is full".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reservation_granted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/gsess-1/reservations"))
            .and(body_partial_json(serde_json::json!({"PlayerId": "player-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "PlayerSession": {
                    "PlayerSessionId": "psess-9",
                    "PlayerId": "player-1",
                    "GameSessionId": "gsess-1",
                    "Status": "RESERVED",
                    "IpAddress": "10.0.0.5",
                    "Port": 7777,
                    "CreationTime": "2026-06-01T12:00:00Z",
                }
            })))
            .mount(&server)
            .await;

        let reservation = client(&server)
            .create_reservation(&"gsess-1".parse().unwrap(), &"player-1".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(reservation.player_session_id.as_str(), "psess-9");
        assert_eq!(reservation.port, Some(7777));
    }

    #[tokio::test]
    async fn test_server_error_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = client(&server)
            .create_reservation(&"gsess-1".parse().unwrap(), &"player-1".parse().unwrap())
            .await;

        assert_eq!(
            result.unwrap_err(),
            HostError::Unexpected {
                status: 500,
                body: "boom".to_string()
            }
        );
    }
}

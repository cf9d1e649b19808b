use std::env;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::errors::{self, CustomResult, Error};

pub const DEFAULT_BASE_URL: &str = "https://rob-is.cz";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "event_name")]
    name: String,
    #[serde(rename = "event_date_start")]
    date_start: String,
    #[serde(rename = "event_closed")]
    closed: bool,
    id: i64,
}

/// An open event, as offered to the organizer for selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSummary {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct RawEventAdmin {
    races: Vec<RawRace>,
}

#[derive(Debug, Deserialize)]
struct RawRace {
    id: i64,
    #[serde(rename = "race_name")]
    name: String,
    #[serde(rename = "race_date")]
    date: String,
    #[serde(rename = "race_api_key")]
    api_key: Option<String>,
}

/// A stage of an event. `api_key: None` means the race is locked for this
/// account, which is different from the race not existing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaceSummary {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub api_key: Option<String>,
}

/// Event detail fetched with a race api key during import.
#[derive(Debug, Deserialize)]
pub struct RemoteEvent {
    pub event_name: String,
    pub event_organiser: String,
}

/// Race detail fetched with a race api key during import.
#[derive(Debug, Deserialize)]
pub struct RemoteRace {
    pub race_name: String,
    pub race_start: String,
    pub race_time_limit: i64,
    pub race_band: String,
    #[serde(default)]
    pub categories: Vec<RemoteCategory>,
    #[serde(default)]
    pub competitors: Vec<RemoteCompetitor>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteCategory {
    pub category_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoteCompetitor {
    pub last_name: String,
    pub first_name: String,
    pub competitor_club: String,
    pub si_number: Option<i64>,
    pub competitor_index: String,
    pub competitor_category: String,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    #[serde(rename = "userId")]
    user_id: serde_json::Value,
    first_name: String,
    last_name: String,
    roles: serde_json::Value,
}

/// What a successful login yields: the auth token plus the local-storage
/// snapshot the embedded browser gets seeded with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginSession {
    pub token: String,
    pub local_storage: String,
}

/// Raw outcome of a write call, reported verbatim to the operator log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

impl ApiReply {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct RobisApi {
    base_url: String,
    client: Client,
}

impl RobisApi {
    /// Client against the configured service; `ARDF_ROBIS_URL` overrides
    /// the production URL.
    pub fn new() -> CustomResult<RobisApi> {
        let base_url = env::var("ARDF_ROBIS_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        RobisApi::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> CustomResult<RobisApi> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(errors::ClientBuildSnafu)?;
        Ok(RobisApi {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Logs in with the organizer's account. The service answers with an
    /// `authToken` cookie and the profile fields the web app keeps in local
    /// storage; both are returned so the caller can persist them.
    pub async fn login(&self, email: &str, password: &str) -> CustomResult<LoginSession> {
        let url = format!("{}/api/login/", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("email", email), ("password", password)])
            .send()
            .await
            .context(errors::RequestSnafu { url: url.clone() })?;

        if response.status() != StatusCode::OK {
            return Err(Error::AuthRejected {
                reason: format!("status {}", response.status().as_u16()),
            });
        }
        let token = response
            .cookies()
            .find(|c| c.name() == "authToken")
            .map(|c| c.value().to_string());
        let Some(token) = token else {
            return Err(Error::AuthRejected {
                reason: "authToken cookie missing".to_string(),
            });
        };

        let body: LoginBody = response
            .json()
            .await
            .map_err(|e| Error::MalformedRemoteData {
                detail: format!("login profile: {e}"),
            })?;
        Ok(LoginSession {
            token,
            local_storage: local_storage_snapshot(&body)?,
        })
    }

    /// Events of the given year the organizer may still work with: closed
    /// ones dropped, sorted ascending by start date.
    pub async fn list_open_events(&self, token: &str, year: i32) -> CustomResult<Vec<EventSummary>> {
        let url = format!("{}/api/event/?year={}&period=all", self.base_url, year);
        let raw: Vec<RawEvent> = self.get_with_cookie(&url, token).await?;
        open_events(raw)
    }

    /// Candidate races of one event. A non-success response means the
    /// account does not administer the event.
    pub async fn list_races(&self, token: &str, event_id: i64) -> CustomResult<Vec<RaceSummary>> {
        let url = format!("{}/api/event/edit/?id={}", self.base_url, event_id);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::COOKIE, format!("authToken={token}"))
            .send()
            .await
            .context(errors::RequestSnafu { url: url.clone() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::NotAdministrator {
                event_id,
                status: status.as_u16(),
            });
        }
        let body = response
            .text()
            .await
            .context(errors::RequestSnafu { url })?;
        let raw: RawEventAdmin = decode(&body)?;
        candidate_races(raw.races)
    }

    pub async fn fetch_event(&self, api_key: &str) -> CustomResult<RemoteEvent> {
        let url = format!("{}/api/?type=json&name=event", self.base_url);
        self.get_with_race_key(&url, api_key).await
    }

    pub async fn fetch_race(&self, api_key: &str) -> CustomResult<RemoteRace> {
        let url = format!("{}/api/?type=json&name=race", self.base_url);
        self.get_with_race_key(&url, api_key).await
    }

    pub async fn post_startlist<T: Serialize>(
        &self,
        api_key: &str,
        payload: &T,
    ) -> CustomResult<ApiReply> {
        self.write(Method::POST, "/api/startlist/?valid=True", api_key, payload)
            .await
    }

    pub async fn put_race_setup<T: Serialize>(
        &self,
        api_key: &str,
        payload: &T,
    ) -> CustomResult<ApiReply> {
        self.write(Method::PUT, "/api/race/", api_key, payload).await
    }

    pub async fn post_results<T: Serialize>(
        &self,
        api_key: &str,
        payload: &T,
    ) -> CustomResult<ApiReply> {
        self.write(Method::POST, "/api/results/?valid=True", api_key, payload)
            .await
    }

    pub async fn post_live_results<T: Serialize>(
        &self,
        api_key: &str,
        payload: &T,
    ) -> CustomResult<ApiReply> {
        self.write(Method::POST, "/api/results/?name=json", api_key, payload)
            .await
    }

    /// Background consistency probe. This endpoint authenticates with a
    /// plain `Key` header, unlike the other race-scoped calls.
    pub async fn fetch_ochecklist(&self, api_key: &str) -> CustomResult<ApiReply> {
        let url = format!("{}/api/ochecklist/", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Key", api_key)
            .send()
            .await
            .context(errors::RequestSnafu { url: url.clone() })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context(errors::RequestSnafu { url })?;
        Ok(ApiReply { status, body })
    }

    async fn get_with_cookie<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> CustomResult<T> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::COOKIE, format!("authToken={token}"))
            .send()
            .await
            .context(errors::RequestSnafu { url })?;
        self.decode_success(url, response).await
    }

    async fn get_with_race_key<T: DeserializeOwned>(
        &self,
        url: &str,
        api_key: &str,
    ) -> CustomResult<T> {
        let response = self
            .client
            .get(url)
            .header("Race-Api-Key", api_key)
            .send()
            .await
            .context(errors::RequestSnafu { url })?;
        self.decode_success(url, response).await
    }

    async fn decode_success<T: DeserializeOwned>(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> CustomResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .context(errors::RequestSnafu { url })?;
        if !status.is_success() {
            return Err(Error::RemoteStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        decode(&body)
    }

    async fn write<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        api_key: &str,
        payload: &T,
    ) -> CustomResult<ApiReply> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .request(method, &url)
            .header("Race-Api-Key", api_key)
            .json(payload)
            .send()
            .await
            .context(errors::RequestSnafu { url: url.clone() })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context(errors::RequestSnafu { url })?;
        Ok(ApiReply { status, body })
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> CustomResult<T> {
    serde_json::from_str(body).map_err(|e| Error::MalformedRemoteData {
        detail: e.to_string(),
    })
}

fn local_storage_snapshot(body: &LoginBody) -> CustomResult<String> {
    // key spelling matches what the web app itself writes to local storage
    let roles = serde_json::to_string(&body.roles).map_err(|e| Error::MalformedRemoteData {
        detail: format!("roles: {e}"),
    })?;
    Ok(serde_json::json!({
        "userID": body.user_id,
        "firstName": body.first_name,
        "last_name": body.last_name,
        "rolesByIndex": roles,
    })
    .to_string())
}

fn open_events(raw: Vec<RawEvent>) -> CustomResult<Vec<EventSummary>> {
    let mut events = Vec::new();
    for event in raw {
        if event.closed {
            continue;
        }
        events.push(EventSummary {
            id: event.id,
            name: event.name,
            date: parse_date(&event.date_start)?,
        });
    }
    events.sort_by_key(|e| e.date);
    Ok(events)
}

/// The service always pads the race list with a placeholder at index 0;
/// it is never a candidate, whatever it contains.
fn candidate_races(raw: Vec<RawRace>) -> CustomResult<Vec<RaceSummary>> {
    raw.into_iter()
        .skip(1)
        .map(|race| {
            Ok(RaceSummary {
                id: race.id,
                name: race.name,
                date: parse_date(&race.date)?,
                api_key: race.api_key,
            })
        })
        .collect()
}

fn parse_date(raw: &str) -> CustomResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| Error::MalformedRemoteData {
        detail: format!("date {raw:?}: {e}"),
    })
}

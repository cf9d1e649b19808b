use snafu::Snafu;

pub type CustomResult<T> = Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Login returned a non-200 status or the expected auth cookie was missing.
    #[snafu(display("login rejected: {reason}"))]
    AuthRejected { reason: String },

    #[snafu(display("stored token expired at unix time {expired_at}"))]
    AuthExpired { expired_at: i64 },

    /// Race-list fetch for an event came back non-success while browsing.
    #[snafu(display("event {event_id}: race list fetch returned {status}"))]
    NotAdministrator { event_id: i64, status: u16 },

    /// The active race has no api key, so no write may go out.
    #[snafu(display("race is locked: no api key available"))]
    LockedRace,

    #[snafu(display("{label}: remote write returned {status}: {body}"))]
    RemoteWriteFailure {
        label: String,
        status: u16,
        body: String,
    },

    #[snafu(display("malformed remote data: {detail}"))]
    MalformedRemoteData { detail: String },

    #[snafu(display("request to {url} failed: {source}"))]
    Request { url: String, source: reqwest::Error },

    #[snafu(display("{url} returned {status}: {body}"))]
    RemoteStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[snafu(display("could not build http client: {source}"))]
    ClientBuild { source: reqwest::Error },

    #[snafu(display("scheduler error: {message}"))]
    Scheduler { message: String },
}

//! Blocking HTTP transport shared by the remote adapters.
//!
//! One [`HttpClient`] is shared by every adapter in a run so the pacing delay
//! applies across services, not per service.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, trace};

const USER_AGENT: &str = concat!("prsync/", env!("CARGO_PKG_VERSION"));

/// Failure talking to a remote service. Never represented as an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{endpoint}: transport error: {message}")]
    Transport { endpoint: String, message: String },
    #[error("{endpoint}: http status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("{endpoint}: invalid response body: {message}")]
    Decode { endpoint: String, message: String },
    /// The service answered but could not return the whole result set.
    #[error("{endpoint}: incomplete results: {message}")]
    Incomplete { endpoint: String, message: String },
}

impl RemoteError {
    /// The remote object does not exist (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Status { status: 404, .. })
    }
}

/// Fixed delay before every request except the first.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    started: Cell<bool>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Cell::new(false),
        }
    }

    pub fn wait(&self) {
        if self.started.replace(true) && !self.delay.is_zero() {
            trace!(delay_ms = self.delay.as_millis() as u64, "pacing request");
            thread::sleep(self.delay);
        }
    }
}

/// Thin wrapper around a `ureq` agent with pacing and error mapping.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    pacer: Rc<Pacer>,
}

impl HttpClient {
    pub fn new(timeout: Duration, delay: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            pacer: Rc::new(Pacer::new(delay)),
        }
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        for (name, value) in query {
            request = request.query(name, value);
        }
        self.pacer.wait();
        debug!(method = "GET", url, "sending request");
        let response = request.call().map_err(|err| map_ureq_error(url, err))?;
        decode(url, response)
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<T, RemoteError> {
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        self.pacer.wait();
        debug!(method = "POST", url, "sending request");
        let response = request
            .send_json(body)
            .map_err(|err| map_ureq_error(url, err))?;
        decode(url, response)
    }

    /// POST without a body. Returns the (2xx) status.
    pub fn post_empty(&self, url: &str, headers: &[(&str, &str)]) -> Result<u16, RemoteError> {
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        self.pacer.wait();
        debug!(method = "POST", url, "sending request");
        let response = request.call().map_err(|err| map_ureq_error(url, err))?;
        ensure_success(url, response.status())
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T, RemoteError> {
    ensure_success(url, response.status())?;
    response
        .into_json::<T>()
        .map_err(|err| RemoteError::Decode {
            endpoint: url.to_string(),
            message: err.to_string(),
        })
}

fn ensure_success(url: &str, status: u16) -> Result<u16, RemoteError> {
    if (200..=299).contains(&status) {
        Ok(status)
    } else {
        Err(RemoteError::Status {
            endpoint: url.to_string(),
            status,
        })
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, _) => RemoteError::Status {
            endpoint: url.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => RemoteError::Transport {
            endpoint: url.to_string(),
            message: transport.to_string(),
        },
    }
}

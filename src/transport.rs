use std::{io, time::Duration};

use crate::jmap::Session;
use log::{debug, log_enabled, trace};
use serde_json::Value;
use snafu::prelude::*;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Could not open session at {}: {}", session_url, source))]
    OpenSession {
        session_url: String,
        source: ureq::Error,
    },

    #[snafu(display("Server at {} answered with HTTP status {}", url, status))]
    Status { url: String, status: u16 },

    #[snafu(display("Could not complete API request: {}", source))]
    Request { source: ureq::Error },

    #[snafu(display("Could not interpret API response: {}", source))]
    Response { source: io::Error },

    #[snafu(display("Could not deserialize API response: {}", source))]
    DeserializeResponse { source: serde_json::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Moves JSON documents to and from a JMAP server.
///
/// One call is one HTTP exchange. Timeouts and authentication belong to the implementation.
pub trait Transport {
    /// POST `body` to `url` and return the JSON document the server answered with.
    fn post(&self, url: &str, body: &Value) -> Result<Value>;

    /// GET the JSON document at `url`.
    fn get(&self, url: &str) -> Result<Value>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, url: &str, body: &Value) -> Result<Value> {
        (**self).post(url, body)
    }

    fn get(&self, url: &str) -> Result<Value> {
        (**self).get(url)
    }
}

/// [`Transport`] over HTTP(S) with a persistent `ureq` agent.
pub struct HttpTransport {
    /// Value of HTTP Authorization header.
    authorization: Option<String>,
    /// Persistent ureq agent to use for all HTTP requests.
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(authorization: Option<String>, timeout: u64) -> Self {
        Self {
            authorization,
            agent: agent(timeout),
        }
    }

    /// Fetch the session document at `session_url`, authenticating with HTTP Basic if the server
    /// asks for it.
    ///
    /// Returns the transport, the session URL after following redirects, and the session.
    pub fn open(
        session_url: &str,
        username: &str,
        password: &str,
        timeout: u64,
    ) -> Result<(Self, String, Session)> {
        let agent = agent(timeout);

        match agent.get(session_url).call() {
            Ok(r) => {
                // Server returned success without authentication. Surprising, but valid.
                let session_url = r.get_url().to_string();
                let session: Session = r.into_json().context(ResponseSnafu {})?;
                Ok((Self::new(None, timeout), session_url, session))
            }

            Err(ureq::Error::Status(code, ref r)) if code == 401 => {
                debug!("Session endpoint requires authentication, retrying as {username}");
                let authorization = basic_authorization(username, password);

                let r = agent
                    .get(r.get_url())
                    .set("Authorization", &authorization)
                    .call()
                    .context(OpenSessionSnafu { session_url })?;

                let session_url = r.get_url().to_string();
                let session: Session = r.into_json().context(ResponseSnafu {})?;
                Ok((Self::new(Some(authorization), timeout), session_url, session))
            }

            Err(e) => Err(e).context(OpenSessionSnafu { session_url }),
        }
    }

    fn apply_authorization(&self, req: ureq::Request) -> ureq::Request {
        match &self.authorization {
            Some(authorization) => req.set("Authorization", authorization),
            _ => req,
        }
    }

    fn read_json(response: ureq::Response) -> Result<Value> {
        if log_enabled!(log::Level::Trace) {
            let json = response.into_string().context(ResponseSnafu {})?;
            trace!("Response: {json}");
            serde_json::from_str(&json).context(DeserializeResponseSnafu {})
        } else {
            response.into_json().context(ResponseSnafu {})
        }
    }
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .apply_authorization(self.agent.post(url))
            .send_json(body)
            .map_err(status_error)?;
        Self::read_json(response)
    }

    fn get(&self, url: &str) -> Result<Value> {
        let response = self
            .apply_authorization(self.agent.get(url))
            .call()
            .map_err(status_error)?;
        Self::read_json(response)
    }
}

fn agent(timeout: u64) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .redirect_auth_headers(ureq::RedirectAuthHeaders::SameHost)
        .timeout(Duration::from_secs(timeout))
        .build()
}

fn status_error(error: ureq::Error) -> Error {
    match error {
        ureq::Error::Status(status, response) => Error::Status {
            url: response.get_url().to_string(),
            status,
        },
        source => Error::Request { source },
    }
}

/// The `Authorization` header value for HTTP Basic.
///
/// Anything from the first `:` of the username on is dropped, since Basic cannot carry it.
pub fn basic_authorization(username: &str, password: &str) -> String {
    let safe_username = match username.find(':') {
        Some(idx) => &username[..idx],
        None => username,
    };
    format!(
        "Basic {}",
        base64::encode(format!("{}:{}", safe_username, password))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_authorization_encodes_credentials() {
        assert_eq!(
            basic_authorization("Aladdin", "open sesame"),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn basic_authorization_truncates_username_at_colon() {
        assert_eq!(
            basic_authorization("Aladdin:extra", "open sesame"),
            basic_authorization("Aladdin", "open sesame")
        );
    }
}

use crate::{
    batch::{self, Invocation, Outcome, Projection},
    jmap::{Capability, Id, MethodCall, Session},
    transport::{self, HttpTransport, Transport},
};
use log::{trace, warn};
use snafu::prelude::*;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Could not open session: {}", source))]
    OpenSession { source: transport::Error },

    #[snafu(display("Could not refresh session at {}: {}", session_url, source))]
    RefreshSession {
        session_url: String,
        source: transport::Error,
    },

    #[snafu(display("Could not deserialize session at {}: {}", session_url, source))]
    DeserializeSession {
        session_url: String,
        source: serde_json::Error,
    },

    #[snafu(display("Session has no primary account for mail"))]
    NoPrimaryAccount {},

    #[snafu(display(
        "Batch of {} calls exceeds the server's limit of {} calls per request",
        count,
        max
    ))]
    TooManyCalls { count: usize, max: u64 },

    #[snafu(display("{}", source))]
    Batch { source: batch::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A JMAP session bound to a transport and the account its calls act on.
pub struct Client<T> {
    transport: T,
    /// URL which points to the session endpoint after following all redirects.
    session_url: String,
    /// The latest session object returned by the server.
    session: Session,
    account_id: Id,
}

impl Client<HttpTransport> {
    /// Connect to the session endpoint at `session_url` over HTTP.
    pub fn open(session_url: &str, username: &str, password: &str, timeout: u64) -> Result<Self> {
        let (transport, session_url, session) =
            HttpTransport::open(session_url, username, password, timeout)
                .context(OpenSessionSnafu {})?;
        Self::with_session(transport, session_url, session)
    }
}

impl<T: Transport> Client<T> {
    /// Wrap an already fetched session. Calls act on the session's primary mail account.
    pub fn with_session(transport: T, session_url: String, session: Session) -> Result<Self> {
        let account_id = session
            .primary_account(Capability::Mail)
            .cloned()
            .context(NoPrimaryAccountSnafu {})?;
        Ok(Self {
            transport,
            session_url,
            session,
            account_id,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn account_id(&self) -> &Id {
        &self.account_id
    }

    /// Act on `account_id` instead of the primary mail account from now on.
    pub fn set_account_id(&mut self, account_id: Id) {
        self.account_id = account_id;
    }

    /// Send `invocations` as one request and return their outcomes.
    ///
    /// A one-call batch yields [`Projection::Single`]; anything else yields the outcomes in the
    /// order the calls were given.
    pub fn request(&self, invocations: Vec<Invocation>) -> Result<Projection> {
        if let Some(core) = self.session.core_capabilities() {
            ensure!(
                invocations.len() as u64 <= core.max_calls_in_request,
                TooManyCallsSnafu {
                    count: invocations.len(),
                    max: core.max_calls_in_request,
                }
            );
        }

        let prepared = batch::prepare(
            invocations,
            Some(&self.account_id),
            &self.session.advertised_capabilities(),
        )
        .context(BatchSnafu {})?;
        let executed = batch::execute(&self.transport, &self.session.api_url, prepared)
            .context(BatchSnafu {})?;

        if let Some(state) = &executed.session_state {
            if *state != self.session.state {
                warn!(
                    "Session state changed from {} to {}; the session should be refreshed",
                    self.session.state, state
                );
            }
        }
        Ok(batch::project(executed.calls))
    }

    /// Send a single call and return its outcome.
    pub fn method_call(&self, call: MethodCall) -> Result<Outcome> {
        match self.request(vec![call.into()])? {
            Projection::Single(outcome) => Ok(outcome),
            Projection::Many(outcomes) => Ok(Outcome::WithImplicit(
                outcomes.into_iter().flat_map(Outcome::into_results).collect(),
            )),
        }
    }

    /// Fetch the session document again, e.g. after its state has changed.
    pub fn refresh_session(&mut self) -> Result<()> {
        let value = self
            .transport
            .get(&self.session_url)
            .context(RefreshSessionSnafu {
                session_url: &self.session_url,
            })?;
        let session: Session = serde_json::from_value(value).context(DeserializeSessionSnafu {
            session_url: &self.session_url,
        })?;
        trace!(
            "updating session state from {} to {}",
            self.session.state,
            session.state
        );
        self.session = session;
        Ok(())
    }
}

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{Capability, Id, State};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// An object specifying the capabilities of this server. Each key is a URN
    /// for a capability supported by the server; capabilities this client does
    /// not know are kept but never consulted.
    pub capabilities: HashMap<String, Value>,
    /// A map of an account id to an `Account` object for each account the user
    /// has access to.
    pub accounts: HashMap<Id, Account>,
    /// A map of capability URNs to the account id that is considered to be the
    /// user’s main or default account for data pertaining to that capability.
    #[serde(default)]
    pub primary_accounts: HashMap<String, Id>,
    /// The username associated with the given credentials, or the empty string
    /// if none.
    #[serde(default)]
    pub username: String,
    /// The URL to use for JMAP API requests.
    pub api_url: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub event_source_url: String,
    /// A string representing the state of this object on the server. The
    /// current value is also returned on the API Response object, allowing
    /// clients to quickly determine if the session information has changed.
    pub state: State,
}

impl Session {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains_key(capability.as_urn())
    }

    /// The capabilities known to this client which the server advertises.
    pub fn advertised_capabilities(&self) -> Vec<Capability> {
        [Capability::Core, Capability::Mail, Capability::Submission]
            .into_iter()
            .filter(|capability| self.has_capability(*capability))
            .collect()
    }

    pub fn primary_account(&self, capability: Capability) -> Option<&Id> {
        self.primary_accounts.get(capability.as_urn())
    }

    /// The limits advertised under the core capability, if present and well formed.
    pub fn core_capabilities(&self) -> Option<CoreCapabilities> {
        self.capabilities
            .get(Capability::Core.as_urn())
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreCapabilities {
    /// The maximum file size, in octets, that the server will accept for a
    /// single file upload (for any purpose).
    pub max_size_upload: u64,
    pub max_concurrent_upload: u64,
    /// The maximum size, in octets, that the server will accept for a single
    /// request to the API endpoint.
    pub max_size_request: u64,
    pub max_concurrent_requests: u64,
    /// The maximum number of method calls the server will accept in a single
    /// request to the API endpoint.
    pub max_calls_in_request: u64,
    /// The maximum number of objects that the client may request in a single
    /// /get type method call.
    pub max_objects_in_get: u64,
    /// The maximum number of objects the client may send to create, update, or
    /// destroy in a single /set type method call.
    pub max_objects_in_set: u64,
    #[serde(default)]
    pub collation_algorithms: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// A user-friendly string to show when presenting content from this
    /// account, e.g., the email address representing the owner of the account.
    pub name: String,
    /// This is `true` if the account belongs to the authenticated user rather
    /// than a group account or a personal account of another user that has been
    /// shared with them.
    pub is_personal: bool,
    /// This is `true` if the entire account is read-only.
    pub is_read_only: bool,
    /// The set of capabilities for the methods supported in this account, keyed
    /// by URN.
    #[serde(default)]
    pub account_capabilities: HashMap<String, Value>,
}

use lazy_static::lazy_static;
use serde::{
    de::{Error, SeqAccess, Visitor},
    Deserialize, Deserializer,
};
use serde_json::{Map, Value};
use snafu::prelude::*;
use std::{collections::HashMap, fmt};

use super::{
    Email, EmailSubmission, Id, Identity, Mailbox, State, Thread, CORE_ECHO, EMAIL_CHANGES,
    EMAIL_GET, EMAIL_QUERY, EMAIL_QUERY_CHANGES, EMAIL_SET, EMAIL_SUBMISSION_CHANGES,
    EMAIL_SUBMISSION_GET, EMAIL_SUBMISSION_QUERY, EMAIL_SUBMISSION_QUERY_CHANGES,
    EMAIL_SUBMISSION_SET, IDENTITY_GET, MAILBOX_CHANGES, MAILBOX_GET, MAILBOX_QUERY,
    MAILBOX_QUERY_CHANGES, MAILBOX_SET, THREAD_CHANGES, THREAD_GET,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// An array of responses. The output of the methods MUST be added to the
    /// `method_responses` array in the same order that the methods are
    /// processed.
    pub method_responses: Vec<ResponseInvocation>,
    /// (optional; only returned if given in the request) A map of a
    /// (client-specified) creation id to the id the server assigned when a
    /// record was successfully created.
    #[serde(default)]
    pub created_ids: Option<HashMap<String, Id>>,
    /// The current value of the “state” string on the `Session` object. Clients
    /// may use this to detect if this object has changed and needs to be
    /// refetched. Some servers leave it out.
    #[serde(default)]
    pub session_state: Option<State>,
}

/// One `[name, payload, id]` triple of a response, not yet decoded.
///
/// Decoding is deferred so that a payload which does not match its method's
/// shape only fails that one triple.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseInvocation {
    pub name: String,
    pub arguments: Value,
    /// An arbitrary string from the client to be echoed back with the responses
    /// emitted by that method call (a method may return 1 or more responses, as
    /// it may make implicit calls to other methods; all responses initiated by
    /// this method call get the same method call id in the response).
    pub id: String,
}

impl<'de> Deserialize<'de> for ResponseInvocation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ResponseInvocationVisitor;

        impl<'de> Visitor<'de> for ResponseInvocationVisitor {
            type Value = ResponseInvocation;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of [string, map, string]")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let name: String = seq
                    .next_element()?
                    .ok_or_else(|| Error::invalid_length(0, &"3"))?;
                let arguments: Value = seq
                    .next_element()?
                    .ok_or_else(|| Error::invalid_length(1, &"3"))?;
                if !arguments.is_object() {
                    return Err(Error::invalid_type(
                        serde::de::Unexpected::Other("non-object arguments"),
                        &"a map",
                    ));
                }
                let id: String = seq
                    .next_element()?
                    .ok_or_else(|| Error::invalid_length(2, &"3"))?;
                if seq.next_element::<Value>()?.is_some() {
                    return Err(Error::invalid_length(4, &"3"));
                }
                Ok(ResponseInvocation {
                    name,
                    arguments,
                    id,
                })
            }
        }
        deserializer.deserialize_seq(ResponseInvocationVisitor)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResponse<T> {
    /// The id of the account used for the call.
    pub account_id: Id,
    /// A (preferably short) string representing the state on the server for all
    /// the data of this type in the account (not just the objects returned in
    /// this call). If the data changes, this string MUST change.
    pub state: State,
    /// An array of the Foo objects requested. This is the empty array if no
    /// objects were found or if the ids argument passed in was also an empty
    /// array. The results MAY be in a different order to the ids in the request
    /// arguments.
    pub list: Vec<T>,
    /// This array contains the ids passed to the method for records that do not
    /// exist. The array is empty if all requested ids were found or if the ids
    /// argument passed in was either null or an empty array.
    pub not_found: Vec<Id>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// The id of the account used for the call.
    pub account_id: Id,
    /// A string encoding the current state of the query on the server. This
    /// string MUST change if the results of the query (i.e., the matching ids
    /// and their sort order) have changed.
    ///
    /// Should a client receive back a response with a different `query_state`
    /// string to a previous call, it MUST either throw away the currently
    /// cached query and fetch it again or call `Foo/queryChanges` to get the
    /// difference.
    pub query_state: State,
    /// This is true if the server supports calling Foo/queryChanges with these
    /// filter/sort parameters.
    pub can_calculate_changes: bool,
    /// The zero-based index of the first result in the ids array within the
    /// complete list of query results.
    pub position: u64,
    /// The list of ids for each Foo in the query results, starting at the index
    /// given by the position argument of this response and continuing until it
    /// hits the end of the results or reaches the limit number of ids.
    pub ids: Vec<Id>,
    /// (only if requested) The total number of Foos in the results (given the
    /// filter). This argument MUST be omitted if the `calculate_total` request
    /// argument is not true.
    pub total: Option<u64>,
    /// The limit enforced by the server on the maximum number of results to
    /// return. This is only returned if the server set a limit or used a
    /// different limit than that given in the request.
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesResponse {
    /// The id of the account used for the call.
    pub account_id: Id,
    /// This is the sinceState argument echoed back; it’s the state from which
    /// the server is returning changes.
    pub old_state: State,
    /// This is the state the client will be in after applying the set of
    /// changes to the old state.
    pub new_state: State,
    /// If true, the client may call Foo/changes again with the newState
    /// returned to get further updates. If false, newState is the current
    /// server state.
    pub has_more_changes: bool,
    pub created: Vec<Id>,
    pub updated: Vec<Id>,
    pub destroyed: Vec<Id>,
    /// `Mailbox/changes` only: if only the counts changed, the names of those
    /// properties.
    #[serde(default)]
    pub updated_properties: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryChangesResponse {
    pub account_id: Id,
    /// This is the `sinceQueryState` argument echoed back; that is, the state
    /// from which the server is returning changes.
    pub old_query_state: State,
    pub new_query_state: State,
    pub total: Option<u64>,
    /// The `id` for every Foo that was in the query results in the old state
    /// and that is not in the results in the new state.
    pub removed: Vec<Id>,
    /// The id and index in the query results (in the new state) for every Foo
    /// that has been added to the results since the old state AND every Foo in
    /// the current results that was included in the removed array (due to a
    /// filter or sort based upon a mutable property).
    pub added: Vec<AddedItem>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct AddedItem {
    pub id: Id,
    pub index: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetResponse<T> {
    pub account_id: Id,
    /// The state string that would have been returned by Foo/get before making
    /// the requested changes, or null if the server doesn’t know what the
    /// previous state string was.
    pub old_state: Option<State>,
    pub new_state: State,
    /// A map of the creation id to an object containing any properties of the
    /// created Foo object that were not sent by the client.
    pub created: Option<HashMap<Id, T>>,
    /// The keys in this map are the ids of all Foos that were successfully
    /// updated. The value for each id is a Foo object containing any property
    /// that changed in a way not explicitly requested by the PatchObject sent to
    /// the server, or null if none.
    pub updated: Option<HashMap<Id, Option<T>>>,
    pub destroyed: Option<Vec<Id>>,
    pub not_created: Option<HashMap<Id, SetError>>,
    pub not_updated: Option<HashMap<Id, SetError>>,
    pub not_destroyed: Option<HashMap<Id, SetError>>,
}

/// If a method encounters an error, the appropriate error response MUST be
/// inserted at the current point in the methodResponses array and, unless
/// otherwise specified, further processing MUST NOT happen within that
/// method call.
///
/// Any further method calls in the request MUST then be processed as
/// normal. Errors at the method level MUST NOT generate an HTTP-level
/// error.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodError {
    #[serde(rename = "type")]
    pub kind: MethodErrorKind,
    pub description: Option<String>,
    /// The arguments or properties at fault, if the server names them.
    #[serde(default, alias = "arguments")]
    pub properties: Option<Vec<String>>,
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(description) = &self.description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}

/// The per-item failure of a `/set` create, update or destroy.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetError {
    #[serde(rename = "type")]
    pub kind: MethodErrorKind,
    pub description: Option<String>,
    /// `invalidProperties`: the properties that were invalid.
    pub properties: Option<Vec<String>>,
    /// `alreadyExists`: the id of the existing record.
    pub existing_id: Option<Id>,
    /// `blobNotFound`: the blob ids that could not be found.
    pub not_found: Option<Vec<Id>>,
}

#[derive(Debug, Deserialize, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum MethodErrorKind {
    /// The accountId does not correspond to a valid account.
    AccountNotFound,
    /// The accountId given corresponds to a valid account, but the account does
    /// not support this method or data type.
    AccountNotSupportedByMethod,
    /// This method modifies state, but the account is read-only (as returned on
    /// the corresponding Account in the Session object).
    AccountReadOnly,
    /// An anchor argument was supplied, but it cannot be found in the results
    /// of the query.
    AnchorNotFound,
    /// The server forbids duplicates, and the record already exists in the
    /// target account.
    AlreadyExists,
    /// The server cannot calculate the changes from the state string given by
    /// the client.
    CannotCalculateChanges,
    /// The action would violate an ACL or other permissions policy.
    Forbidden,
    /// One of the arguments is of the wrong type or otherwise invalid, or a
    /// required argument is missing.
    InvalidArguments,
    /// The PatchObject given to update the record was not a valid patch.
    InvalidPatch,
    /// The record given is invalid.
    InvalidProperties,
    /// The id given cannot be found.
    NotFound,
    /// The create would exceed a server-defined limit on the number or total
    /// size of objects of this type.
    OverQuota,
    /// Too many objects of this type have been created recently, and a
    /// server-defined rate limit has been reached.
    RateLimit,
    /// The total number of actions exceeds the maximum number the server is
    /// willing to process in a single method call.
    RequestTooLarge,
    /// The method used a result reference for one of its arguments, but this
    /// failed to resolve.
    InvalidResultReference,
    /// An unexpected or unknown error occurred during the processing of the
    /// call. The method call made no changes to the server’s state.
    ServerFail,
    /// Some, but not all, expected changes described by the method occurred.
    ServerPartialFail,
    /// Some internal server resource was temporarily unavailable.
    ServerUnavailable,
    /// This is a singleton type, so you cannot create another one or destroy
    /// the existing one.
    Singleton,
    /// An ifInState argument was supplied, and it does not match the current
    /// state.
    StateMismatch,
    /// The action would result in an object that exceeds a server-defined limit
    /// for the maximum size of a single object of this type.
    TooLarge,
    /// There are more changes than the client’s maxChanges argument.
    TooManyChanges,
    /// The server does not recognise this method name.
    UnknownMethod,
    /// The filter is syntactically valid, but the server cannot process it.
    UnsupportedFilter,
    /// The sort is syntactically valid, but includes a property the server does
    /// not support sorting on, or a collation method it does not recognise.
    UnsupportedSort,
    /// The client requested an object be both updated and destroyed in the same
    /// /set request, and the server has decided to therefore ignore the update.
    WillDestroy,
    /// The Mailbox still has at least one child Mailbox.
    MailboxHasChild,
    /// The Mailbox has at least one message assigned to it and the
    /// onDestroyRemoveEmails argument was false.
    MailboxHasEmail,
    /// At least one blob id referenced in the object doesn’t exist.
    BlobNotFound,
    TooManyKeywords,
    TooManyMailboxes,
    /// The Email to be sent is invalid in some way.
    InvalidEmail,
    TooManyRecipients,
    NoRecipients,
    InvalidRecipients,
    ForbiddenMailFrom,
    ForbiddenFrom,
    /// The user does not have permission to send at all right now.
    ForbiddenToSend,
    /// The submission has already been relayed and cannot be canceled.
    CannotUnsend,
    /// Any error type this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A decoded method response: the typed result of one method, or a method-level error.
#[derive(Clone, Debug)]
pub enum MethodResponse {
    CoreEcho(Map<String, Value>),

    EmailGet(GetResponse<Email>),
    EmailQuery(QueryResponse),
    EmailChanges(ChangesResponse),
    EmailQueryChanges(QueryChangesResponse),
    EmailSet(SetResponse<Email>),

    MailboxGet(GetResponse<Mailbox>),
    MailboxQuery(QueryResponse),
    MailboxChanges(ChangesResponse),
    MailboxQueryChanges(QueryChangesResponse),
    MailboxSet(SetResponse<Mailbox>),

    ThreadGet(GetResponse<Thread>),
    ThreadChanges(ChangesResponse),

    EmailSubmissionGet(GetResponse<EmailSubmission>),
    EmailSubmissionQuery(QueryResponse),
    EmailSubmissionChanges(ChangesResponse),
    EmailSubmissionQueryChanges(QueryChangesResponse),
    EmailSubmissionSet(SetResponse<EmailSubmission>),

    IdentityGet(GetResponse<Identity>),

    Error(MethodError),
}

/// Decodes the payload of one response triple.
pub type Decoder = fn(Value) -> serde_json::Result<MethodResponse>;

/// Name of the pseudo-method carried by method-level error triples.
pub const ERROR_METHOD: &str = "error";

macro_rules! decoders {
    ($($name:expr => $variant:ident),* $(,)?) => {{
        let mut table: HashMap<&'static str, Decoder> = HashMap::new();
        $(
            table.insert($name, |payload| {
                serde_json::from_value(payload).map(MethodResponse::$variant)
            });
        )*
        table
    }};
}

lazy_static! {
    static ref DECODERS: HashMap<&'static str, Decoder> = decoders! {
        CORE_ECHO.name => CoreEcho,
        EMAIL_GET.name => EmailGet,
        EMAIL_QUERY.name => EmailQuery,
        EMAIL_CHANGES.name => EmailChanges,
        EMAIL_QUERY_CHANGES.name => EmailQueryChanges,
        EMAIL_SET.name => EmailSet,
        MAILBOX_GET.name => MailboxGet,
        MAILBOX_QUERY.name => MailboxQuery,
        MAILBOX_CHANGES.name => MailboxChanges,
        MAILBOX_QUERY_CHANGES.name => MailboxQueryChanges,
        MAILBOX_SET.name => MailboxSet,
        THREAD_GET.name => ThreadGet,
        THREAD_CHANGES.name => ThreadChanges,
        EMAIL_SUBMISSION_GET.name => EmailSubmissionGet,
        EMAIL_SUBMISSION_QUERY.name => EmailSubmissionQuery,
        EMAIL_SUBMISSION_CHANGES.name => EmailSubmissionChanges,
        EMAIL_SUBMISSION_QUERY_CHANGES.name => EmailSubmissionQueryChanges,
        EMAIL_SUBMISSION_SET.name => EmailSubmissionSet,
        IDENTITY_GET.name => IdentityGet,
        ERROR_METHOD => Error,
    };
}

/// Look up the decoder for a response triple's method name.
pub fn decoder(name: &str) -> Option<Decoder> {
    DECODERS.get(name).copied()
}

#[derive(Debug, Snafu)]
pub enum ExpectError {
    #[snafu(display("Method-level JMAP error: {}", error))]
    Method { error: MethodError },

    #[snafu(display("Expected a {} response, got {}", expected, actual))]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },
}

macro_rules! expect_methods {
    ($($fn:ident => $variant:ident($ty:ty) as $spec:ident),* $(,)?) => {
        impl MethodResponse {
            $(
                pub fn $fn(self) -> Result<$ty, ExpectError> {
                    match self {
                        MethodResponse::$variant(response) => Ok(response),
                        MethodResponse::Error(error) => Err(ExpectError::Method { error }),
                        other => UnexpectedResponseSnafu {
                            expected: $spec.name,
                            actual: other.name(),
                        }
                        .fail(),
                    }
                }
            )*
        }
    };
}

expect_methods! {
    expect_core_echo => CoreEcho(Map<String, Value>) as CORE_ECHO,
    expect_email_get => EmailGet(GetResponse<Email>) as EMAIL_GET,
    expect_email_query => EmailQuery(QueryResponse) as EMAIL_QUERY,
    expect_email_changes => EmailChanges(ChangesResponse) as EMAIL_CHANGES,
    expect_email_query_changes => EmailQueryChanges(QueryChangesResponse) as EMAIL_QUERY_CHANGES,
    expect_email_set => EmailSet(SetResponse<Email>) as EMAIL_SET,
    expect_mailbox_get => MailboxGet(GetResponse<Mailbox>) as MAILBOX_GET,
    expect_mailbox_query => MailboxQuery(QueryResponse) as MAILBOX_QUERY,
    expect_mailbox_changes => MailboxChanges(ChangesResponse) as MAILBOX_CHANGES,
    expect_mailbox_query_changes => MailboxQueryChanges(QueryChangesResponse) as MAILBOX_QUERY_CHANGES,
    expect_mailbox_set => MailboxSet(SetResponse<Mailbox>) as MAILBOX_SET,
    expect_thread_get => ThreadGet(GetResponse<Thread>) as THREAD_GET,
    expect_thread_changes => ThreadChanges(ChangesResponse) as THREAD_CHANGES,
    expect_email_submission_get => EmailSubmissionGet(GetResponse<EmailSubmission>) as EMAIL_SUBMISSION_GET,
    expect_email_submission_query => EmailSubmissionQuery(QueryResponse) as EMAIL_SUBMISSION_QUERY,
    expect_email_submission_changes => EmailSubmissionChanges(ChangesResponse) as EMAIL_SUBMISSION_CHANGES,
    expect_email_submission_query_changes => EmailSubmissionQueryChanges(QueryChangesResponse) as EMAIL_SUBMISSION_QUERY_CHANGES,
    expect_email_submission_set => EmailSubmissionSet(SetResponse<EmailSubmission>) as EMAIL_SUBMISSION_SET,
    expect_identity_get => IdentityGet(GetResponse<Identity>) as IDENTITY_GET,
}

impl MethodResponse {
    /// The wire method name this response was decoded from.
    pub fn name(&self) -> &'static str {
        match self {
            MethodResponse::CoreEcho(_) => CORE_ECHO.name,
            MethodResponse::EmailGet(_) => EMAIL_GET.name,
            MethodResponse::EmailQuery(_) => EMAIL_QUERY.name,
            MethodResponse::EmailChanges(_) => EMAIL_CHANGES.name,
            MethodResponse::EmailQueryChanges(_) => EMAIL_QUERY_CHANGES.name,
            MethodResponse::EmailSet(_) => EMAIL_SET.name,
            MethodResponse::MailboxGet(_) => MAILBOX_GET.name,
            MethodResponse::MailboxQuery(_) => MAILBOX_QUERY.name,
            MethodResponse::MailboxChanges(_) => MAILBOX_CHANGES.name,
            MethodResponse::MailboxQueryChanges(_) => MAILBOX_QUERY_CHANGES.name,
            MethodResponse::MailboxSet(_) => MAILBOX_SET.name,
            MethodResponse::ThreadGet(_) => THREAD_GET.name,
            MethodResponse::ThreadChanges(_) => THREAD_CHANGES.name,
            MethodResponse::EmailSubmissionGet(_) => EMAIL_SUBMISSION_GET.name,
            MethodResponse::EmailSubmissionQuery(_) => EMAIL_SUBMISSION_QUERY.name,
            MethodResponse::EmailSubmissionChanges(_) => EMAIL_SUBMISSION_CHANGES.name,
            MethodResponse::EmailSubmissionQueryChanges(_) => EMAIL_SUBMISSION_QUERY_CHANGES.name,
            MethodResponse::EmailSubmissionSet(_) => EMAIL_SUBMISSION_SET.name,
            MethodResponse::IdentityGet(_) => IDENTITY_GET.name,
            MethodResponse::Error(_) => ERROR_METHOD,
        }
    }

    pub fn as_error(&self) -> Option<&MethodError> {
        match self {
            MethodResponse::Error(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(name: &str, payload: Value) -> serde_json::Result<MethodResponse> {
        decoder(name).expect("known method")(payload)
    }

    #[test]
    fn response_triples_stay_raw_until_decoded() {
        let response: Response = serde_json::from_value(json!({
            "methodResponses": [
                ["Mailbox/get", {"accountId": "A1", "state": "s1", "list": [], "notFound": []}, "c0"],
                ["Frobnicate/now", {"anything": 1}, "c1"],
            ],
            "sessionState": "75128aab4b1b",
        }))
        .unwrap();
        assert_eq!(response.method_responses.len(), 2);
        assert_eq!(response.method_responses[1].name, "Frobnicate/now");
        assert_eq!(response.method_responses[1].id, "c1");
        assert!(response.created_ids.is_none());
        assert_eq!(response.session_state, Some(State::from("75128aab4b1b")));
    }

    #[test]
    fn session_state_may_be_left_out() {
        let response: Response = serde_json::from_value(json!({
            "methodResponses": [["Core/echo", {}, "single.Core/echo"]]
        }))
        .unwrap();
        assert_eq!(response.method_responses.len(), 1);
        assert!(response.session_state.is_none());
    }

    #[test]
    fn response_triples_must_have_three_elements() {
        let short = serde_json::from_value::<ResponseInvocation>(json!(["Mailbox/get", {}]));
        assert!(short.is_err());
        let long =
            serde_json::from_value::<ResponseInvocation>(json!(["Mailbox/get", {}, "c0", "x"]));
        assert!(long.is_err());
    }

    #[test]
    fn unknown_methods_have_no_decoder() {
        assert!(decoder("Frobnicate/now").is_none());
        assert!(decoder("Mailbox/get").is_some());
    }

    #[test]
    fn method_errors_decode_by_type() {
        let response = decode(
            "error",
            json!({"type": "invalidArguments", "description": "bad filter", "arguments": ["filter"]}),
        )
        .unwrap();
        let error = response.as_error().unwrap();
        assert_eq!(error.kind, MethodErrorKind::InvalidArguments);
        assert_eq!(error.description.as_deref(), Some("bad filter"));
        assert_eq!(error.properties, Some(vec!["filter".to_string()]));

        let unknown = decode("error", json!({"type": "somethingNew"})).unwrap();
        assert_eq!(unknown.as_error().unwrap().kind, MethodErrorKind::Unknown);
    }

    #[test]
    fn method_error_without_type_fails_to_decode() {
        assert!(decode("error", json!({"description": "what happened?"})).is_err());
    }

    #[test]
    fn set_response_partitions_updates() {
        let response = decode(
            "Email/set",
            json!({
                "accountId": "A1",
                "oldState": "s1",
                "newState": "s2",
                "updated": {"M1": null, "M2": {"keywords": {"$seen": true}}},
                "notUpdated": {
                    "M3": {"type": "invalidProperties", "properties": ["keywords/$bogus"]}
                },
            }),
        )
        .unwrap()
        .expect_email_set()
        .unwrap();

        let updated = response.updated.unwrap();
        assert_eq!(updated.len(), 2);
        assert!(updated[&Id::from("M1")].is_none());
        assert!(updated[&Id::from("M2")].is_some());
        let not_updated = response.not_updated.unwrap();
        assert_eq!(not_updated.len(), 1);
        let error = &not_updated[&Id::from("M3")];
        assert_eq!(error.kind, MethodErrorKind::InvalidProperties);
        assert_eq!(error.properties, Some(vec!["keywords/$bogus".to_string()]));
        assert!(response.created.is_none());
        assert!(response.not_created.is_none());
    }

    #[test]
    fn mailbox_changes_carries_updated_properties() {
        let changes = decode(
            "Mailbox/changes",
            json!({
                "accountId": "A1",
                "oldState": "s1",
                "newState": "s2",
                "hasMoreChanges": false,
                "created": [],
                "updated": ["MBX1"],
                "destroyed": [],
                "updatedProperties": ["totalEmails", "unreadEmails"],
            }),
        )
        .unwrap()
        .expect_mailbox_changes()
        .unwrap();
        assert_eq!(changes.updated, vec![Id::from("MBX1")]);
        assert_eq!(
            changes.updated_properties,
            Some(vec!["totalEmails".to_string(), "unreadEmails".to_string()])
        );
    }

    #[test]
    fn expect_reports_the_mismatch() {
        let response = decode("Core/echo", json!({"hello": true})).unwrap();
        match response.expect_email_get() {
            Err(ExpectError::UnexpectedResponse { expected, actual }) => {
                assert_eq!(expected, "Email/get");
                assert_eq!(actual, "Core/echo");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

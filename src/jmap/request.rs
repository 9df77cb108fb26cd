use super::{
    Comparator, Email, EmailFilterCondition, EmailSubmission, EmailSubmissionFilterCondition,
    Filter, Id, Mailbox, MailboxFilterCondition, State,
};
use crate::reference::{ListOrRef, Ref, ValueOrRef};
use serde::{ser::SerializeSeq, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub enum Capability {
    #[serde(rename = "urn:ietf:params:jmap:core")]
    Core,
    #[serde(rename = "urn:ietf:params:jmap:mail")]
    Mail,
    #[serde(rename = "urn:ietf:params:jmap:submission")]
    Submission,
}

impl Capability {
    pub fn as_urn(&self) -> &'static str {
        match *self {
            Capability::Core => "urn:ietf:params:jmap:core",
            Capability::Mail => "urn:ietf:params:jmap:mail",
            Capability::Submission => "urn:ietf:params:jmap:submission",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// The set of capabilities the client wishes to use. The client MAY include capability
    /// identifiers even if the method calls it makes do not utilise those capabilities.
    pub using: Vec<Capability>,
    /// An array of method calls to process on the server. The method calls MUST be processed
    /// sequentially, in order.
    pub method_calls: Vec<RequestInvocation>,
}

/// One `[name, arguments, id]` triple of a request, with its arguments already encoded.
#[derive(Debug)]
pub struct RequestInvocation {
    pub name: &'static str,
    pub arguments: Map<String, Value>,
    /// An arbitrary string from the client to be echoed back with the responses emitted by that
    /// method call (a method may return 1 or more responses, as it may make implicit calls to other
    /// methods; all responses initiated by this method call get the same method call id in the
    /// response).
    pub id: String,
}

impl Serialize for RequestInvocation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(self.name)?;
        seq.serialize_element(&self.arguments)?;
        seq.serialize_element(&self.id)?;
        seq.end()
    }
}

/// The protocol's back-reference object. An argument named `foo` whose value is one of these is
/// sent as `#foo`, and the server substitutes the value found at `path` in the response to
/// `result_of` before running the call.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReference {
    /// The method call id of a previous method call in the current request.
    pub result_of: String,
    /// The required name of a response to that method call.
    pub name: String,
    /// A pointer into the arguments of the response selected via the name and resultOf
    /// properties.
    pub path: String,
}

/// Static facts about a method: its wire name and the capabilities a request must declare to
/// use it.
#[derive(Debug)]
pub struct MethodSpec {
    pub name: &'static str,
    pub capabilities: &'static [Capability],
}

macro_rules! method_spec {
    ($ident:ident, $name:literal, $($capability:ident),*) => {
        pub static $ident: MethodSpec = MethodSpec {
            name: $name,
            capabilities: &[$(Capability::$capability),*],
        };
    };
}

method_spec!(CORE_ECHO, "Core/echo", Core);
method_spec!(EMAIL_GET, "Email/get", Mail);
method_spec!(EMAIL_QUERY, "Email/query", Mail);
method_spec!(EMAIL_CHANGES, "Email/changes", Mail);
method_spec!(EMAIL_QUERY_CHANGES, "Email/queryChanges", Mail);
method_spec!(EMAIL_SET, "Email/set", Mail);
method_spec!(MAILBOX_GET, "Mailbox/get", Mail);
method_spec!(MAILBOX_QUERY, "Mailbox/query", Mail);
method_spec!(MAILBOX_CHANGES, "Mailbox/changes", Mail);
method_spec!(MAILBOX_QUERY_CHANGES, "Mailbox/queryChanges", Mail);
method_spec!(MAILBOX_SET, "Mailbox/set", Mail);
method_spec!(THREAD_GET, "Thread/get", Mail);
method_spec!(THREAD_CHANGES, "Thread/changes", Mail);
method_spec!(EMAIL_SUBMISSION_GET, "EmailSubmission/get", Submission);
method_spec!(EMAIL_SUBMISSION_QUERY, "EmailSubmission/query", Submission);
method_spec!(EMAIL_SUBMISSION_CHANGES, "EmailSubmission/changes", Submission);
method_spec!(
    EMAIL_SUBMISSION_QUERY_CHANGES,
    "EmailSubmission/queryChanges",
    Submission
);
method_spec!(EMAIL_SUBMISSION_SET, "EmailSubmission/set", Submission);
method_spec!(IDENTITY_GET, "Identity/get", Submission);

/// Behaviour shared by every argument struct.
pub trait Arguments {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>>;

    /// Top-level arguments which currently hold a result reference, by wire name.
    fn references(&self) -> Vec<(&'static str, &Ref)> {
        Vec::new()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum MethodCall {
    CoreEcho(Echo),

    EmailGet(EmailGet),
    EmailQuery(EmailQuery),
    EmailChanges(Changes),
    EmailQueryChanges(EmailQueryChanges),
    EmailSet(Set<Email>),

    MailboxGet(Get),
    MailboxQuery(MailboxQuery),
    MailboxChanges(Changes),
    MailboxQueryChanges(QueryChanges<MailboxFilterCondition>),
    MailboxSet(MailboxSet),

    ThreadGet(Get),
    ThreadChanges(Changes),

    EmailSubmissionGet(Get),
    EmailSubmissionQuery(Query<EmailSubmissionFilterCondition>),
    EmailSubmissionChanges(Changes),
    EmailSubmissionQueryChanges(QueryChanges<EmailSubmissionFilterCondition>),
    EmailSubmissionSet(EmailSubmissionSet),

    IdentityGet(Get),
}

impl MethodCall {
    pub fn spec(&self) -> &'static MethodSpec {
        match self {
            MethodCall::CoreEcho(_) => &CORE_ECHO,
            MethodCall::EmailGet(_) => &EMAIL_GET,
            MethodCall::EmailQuery(_) => &EMAIL_QUERY,
            MethodCall::EmailChanges(_) => &EMAIL_CHANGES,
            MethodCall::EmailQueryChanges(_) => &EMAIL_QUERY_CHANGES,
            MethodCall::EmailSet(_) => &EMAIL_SET,
            MethodCall::MailboxGet(_) => &MAILBOX_GET,
            MethodCall::MailboxQuery(_) => &MAILBOX_QUERY,
            MethodCall::MailboxChanges(_) => &MAILBOX_CHANGES,
            MethodCall::MailboxQueryChanges(_) => &MAILBOX_QUERY_CHANGES,
            MethodCall::MailboxSet(_) => &MAILBOX_SET,
            MethodCall::ThreadGet(_) => &THREAD_GET,
            MethodCall::ThreadChanges(_) => &THREAD_CHANGES,
            MethodCall::EmailSubmissionGet(_) => &EMAIL_SUBMISSION_GET,
            MethodCall::EmailSubmissionQuery(_) => &EMAIL_SUBMISSION_QUERY,
            MethodCall::EmailSubmissionChanges(_) => &EMAIL_SUBMISSION_CHANGES,
            MethodCall::EmailSubmissionQueryChanges(_) => &EMAIL_SUBMISSION_QUERY_CHANGES,
            MethodCall::EmailSubmissionSet(_) => &EMAIL_SUBMISSION_SET,
            MethodCall::IdentityGet(_) => &IDENTITY_GET,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    pub fn arguments(&self) -> &dyn Arguments {
        match self {
            MethodCall::CoreEcho(a) => a,
            MethodCall::EmailGet(a) => a,
            MethodCall::EmailQuery(a) => a,
            MethodCall::EmailChanges(a)
            | MethodCall::MailboxChanges(a)
            | MethodCall::ThreadChanges(a)
            | MethodCall::EmailSubmissionChanges(a) => a,
            MethodCall::EmailQueryChanges(a) => a,
            MethodCall::EmailSet(a) => a,
            MethodCall::MailboxGet(a)
            | MethodCall::ThreadGet(a)
            | MethodCall::EmailSubmissionGet(a)
            | MethodCall::IdentityGet(a) => a,
            MethodCall::MailboxQuery(a) => a,
            MethodCall::MailboxQueryChanges(a) => a,
            MethodCall::MailboxSet(a) => a,
            MethodCall::EmailSubmissionQuery(a) => a,
            MethodCall::EmailSubmissionQueryChanges(a) => a,
            MethodCall::EmailSubmissionSet(a) => a,
        }
    }

    pub fn arguments_mut(&mut self) -> &mut dyn Arguments {
        match self {
            MethodCall::CoreEcho(a) => a,
            MethodCall::EmailGet(a) => a,
            MethodCall::EmailQuery(a) => a,
            MethodCall::EmailChanges(a)
            | MethodCall::MailboxChanges(a)
            | MethodCall::ThreadChanges(a)
            | MethodCall::EmailSubmissionChanges(a) => a,
            MethodCall::EmailQueryChanges(a) => a,
            MethodCall::EmailSet(a) => a,
            MethodCall::MailboxGet(a)
            | MethodCall::ThreadGet(a)
            | MethodCall::EmailSubmissionGet(a)
            | MethodCall::IdentityGet(a) => a,
            MethodCall::MailboxQuery(a) => a,
            MethodCall::MailboxQueryChanges(a) => a,
            MethodCall::MailboxSet(a) => a,
            MethodCall::EmailSubmissionQuery(a) => a,
            MethodCall::EmailSubmissionQueryChanges(a) => a,
            MethodCall::EmailSubmissionSet(a) => a,
        }
    }

    /// Encode the arguments of this call into their wire form.
    ///
    /// `resolved` holds the back-reference for every argument listed by
    /// [`Arguments::references`]; each such argument is sent as `#name` instead of `name`.
    pub fn encode(
        &self,
        resolved: Vec<(&str, ResultReference)>,
    ) -> serde_json::Result<Map<String, Value>> {
        let mut arguments = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => {
                return Err(serde::ser::Error::custom(format!(
                    "arguments of `{}' are not an object",
                    self.name()
                )))
            }
        };
        for (name, reference) in resolved {
            arguments.remove(name);
            arguments.insert(format!("#{}", name), serde_json::to_value(reference)?);
        }
        Ok(arguments)
    }
}

/// `Core/echo` arguments, returned unchanged by the server.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Echo(pub Map<String, Value>);

impl Arguments for Echo {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        None
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Get {
    /// The id of the account to use. Filled in from the session when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Id>,
    /// The ids of the Foo objects to return. If `None`, then all records of the data type are
    /// returned, if this is supported for that data type and the number of records does not exceed
    /// the `max_objects_in_get` limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<ListOrRef<Id>>,
    /// If supplied, only the properties listed in the array are returned for each Foo object. If
    /// `None`, all properties of the object are returned. The id property of the object is always
    /// returned, even if not explicitly requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
}

impl Arguments for Get {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        Some(&mut self.account_id)
    }

    fn references(&self) -> Vec<(&'static str, &Ref)> {
        self.ids
            .as_ref()
            .and_then(ListOrRef::reference)
            .map(|r| ("ids", r))
            .into_iter()
            .collect()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailGet {
    #[serde(flatten)]
    pub get: Get,
    /// The properties to fetch for each `EmailBodyPart` returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_properties: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_text_body_values: Option<bool>,
    #[serde(
        rename = "fetchHTMLBodyValues",
        skip_serializing_if = "Option::is_none"
    )]
    pub fetch_html_body_values: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_all_body_values: Option<bool>,
    /// If greater than zero, the value property of any `EmailBodyValue` object returned in
    /// `bodyValues` MUST be truncated if necessary so it does not exceed this number of octets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_value_bytes: Option<u64>,
}

impl Arguments for EmailGet {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        self.get.account_id_mut()
    }

    fn references(&self) -> Vec<(&'static str, &Ref)> {
        self.get.references()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query<F> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Id>,
    /// Determines the set of Foos returned in the results. If `None`, all objects of this type
    /// in the account are included in the results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter<F>>,
    /// Lists the names of properties to compare between two Foo records, and how to compare them,
    /// to determine which comes first in the sort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Comparator>>,
    /// The zero-based index of the first id in the full list of results to return.
    ///
    /// If a negative value is given, it is an offset from the end of the list. Specifically, the
    /// negative value MUST be added to the total number of results given the filter, and if still
    /// negative, it’s clamped to 0. This is now the zero-based index of the first id to return.
    #[serde(default, skip_serializing_if = "default")]
    pub position: i64,
    /// A `Foo` id. If supplied, the position argument is ignored. The index of this id in the
    /// results will be used in combination with the `anchor_offset` argument to determine the index
    /// of the first result to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Id>,
    /// The index of the first result to return relative to the index of the anchor, if an anchor is
    /// given. This MAY be negative.
    #[serde(default, skip_serializing_if = "default")]
    pub anchor_offset: i64,
    /// The maximum number of results to return. If `None`, no limit presumed. The server MAY choose
    /// to enforce a maximum limit argument.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Does the client wish to know the total number of results in the query? This may be slow and
    /// expensive for servers to calculate.
    #[serde(default, skip_serializing_if = "default")]
    pub calculate_total: bool,
}

impl<F> Arguments for Query<F> {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        Some(&mut self.account_id)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailQuery {
    #[serde(flatten)]
    pub query: Query<EmailFilterCondition>,
    /// If true, Emails in the same Thread as a previous Email in the list (given the filter and
    /// sort order) will be removed from the list.
    #[serde(default, skip_serializing_if = "default")]
    pub collapse_threads: bool,
}

impl Arguments for EmailQuery {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        self.query.account_id_mut()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxQuery {
    #[serde(flatten)]
    pub query: Query<MailboxFilterCondition>,
    /// If true, Mailboxes are sorted so that each parent comes before its children.
    #[serde(default, skip_serializing_if = "default")]
    pub sort_as_tree: bool,
    /// If true, a Mailbox is only included if all of its ancestors also match the filter.
    #[serde(default, skip_serializing_if = "default")]
    pub filter_as_tree: bool,
}

impl Arguments for MailboxQuery {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        self.query.account_id_mut()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Id>,
    /// The current state of the client. This is the string that was returned as the state argument
    /// in the Foo/get response. The server will return the changes that have occurred since this
    /// state.
    pub since_state: ValueOrRef<State>,
    /// The maximum number of ids to return in the response. The server MAY choose to return fewer
    /// than this value but MUST NOT return more.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_changes: Option<u64>,
}

impl Changes {
    pub fn new(since_state: impl Into<ValueOrRef<State>>) -> Self {
        Self {
            account_id: None,
            since_state: since_state.into(),
            max_changes: None,
        }
    }
}

impl Arguments for Changes {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        Some(&mut self.account_id)
    }

    fn references(&self) -> Vec<(&'static str, &Ref)> {
        self.since_state
            .reference()
            .map(|r| ("sinceState", r))
            .into_iter()
            .collect()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryChanges<F> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Id>,
    /// The filter argument that was used with Foo/query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter<F>>,
    /// The sort argument that was used with Foo/query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Comparator>>,
    /// The current state of the query in the client. This is the string that was returned as the
    /// queryState argument in the Foo/query response with the same sort/filter.
    pub since_query_state: ValueOrRef<State>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_changes: Option<u64>,
    /// The last (highest-index) id the client currently has cached from the query results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_to_id: Option<Id>,
    #[serde(default, skip_serializing_if = "default")]
    pub calculate_total: bool,
}

impl<F> QueryChanges<F> {
    pub fn new(since_query_state: impl Into<ValueOrRef<State>>) -> Self {
        Self {
            account_id: None,
            filter: None,
            sort: None,
            since_query_state: since_query_state.into(),
            max_changes: None,
            up_to_id: None,
            calculate_total: false,
        }
    }
}

impl<F> Arguments for QueryChanges<F> {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        Some(&mut self.account_id)
    }

    fn references(&self) -> Vec<(&'static str, &Ref)> {
        self.since_query_state
            .reference()
            .map(|r| ("sinceQueryState", r))
            .into_iter()
            .collect()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailQueryChanges {
    #[serde(flatten)]
    pub query_changes: QueryChanges<EmailFilterCondition>,
    #[serde(default, skip_serializing_if = "default")]
    pub collapse_threads: bool,
}

impl Arguments for EmailQueryChanges {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        self.query_changes.account_id_mut()
    }

    fn references(&self) -> Vec<(&'static str, &Ref)> {
        self.query_changes.references()
    }
}

/// A `PatchObject`: keys are paths in JSON Pointer format with an implicit leading "/". A
/// `null` value resets the property to its default (or removes it); a key that is not present
/// leaves the property untouched.
pub type Patch = BTreeMap<String, Value>;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Set<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Id>,
    /// This is a state string as returned by the `Foo/get` method (representing the state of all
    /// objects of this type in the account). If supplied, the string must match the current state;
    /// otherwise, the method will be aborted and a stateMismatch error returned. If `None`, any
    /// changes will be applied to the current state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_state: Option<State>,
    /// A map of a creation id (a temporary id set by the client) to `Foo` objects, or `None` if no
    /// objects are to be created.
    ///
    /// The client MUST omit any properties that may only be set by the server (for example, the id
    /// property on most object types).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<BTreeMap<Id, T>>,
    /// A map of an id to a Patch object to apply to the current `Foo` object with that id, or
    /// `None` if no objects are to be updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<BTreeMap<Id, Patch>>,
    /// A list of ids for `Foo` objects to permanently delete, or `None` if no objects are to be
    /// destroyed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destroy: Option<ListOrRef<Id>>,
}

impl<T> Default for Set<T> {
    fn default() -> Self {
        Self {
            account_id: None,
            if_in_state: None,
            create: None,
            update: None,
            destroy: None,
        }
    }
}

impl<T> Arguments for Set<T> {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        Some(&mut self.account_id)
    }

    fn references(&self) -> Vec<(&'static str, &Ref)> {
        self.destroy
            .as_ref()
            .and_then(ListOrRef::reference)
            .map(|r| ("destroy", r))
            .into_iter()
            .collect()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxSet {
    #[serde(flatten)]
    pub set: Set<Mailbox>,
    /// If false, any attempt to destroy a Mailbox that still has Emails in it will be rejected
    /// with a `mailboxHasEmail` SetError.
    #[serde(default, skip_serializing_if = "default")]
    pub on_destroy_remove_emails: bool,
}

impl Arguments for MailboxSet {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        self.set.account_id_mut()
    }

    fn references(&self) -> Vec<(&'static str, &Ref)> {
        self.set.references()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSubmissionSet {
    #[serde(flatten)]
    pub set: Set<EmailSubmission>,
    /// A map of `EmailSubmission` id (or `#` plus a creation id) to a patch to apply to the
    /// referenced Email once that submission succeeds. Runs as an implicit `Email/set`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_success_update_email: Option<BTreeMap<Id, Patch>>,
    /// A list of `EmailSubmission` ids (or `#` plus a creation id) whose Email should be
    /// destroyed once the submission succeeds. Runs as an implicit `Email/set`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_success_destroy_email: Option<Vec<Id>>,
}

impl Arguments for EmailSubmissionSet {
    fn account_id_mut(&mut self) -> Option<&mut Option<Id>> {
        self.set.account_id_mut()
    }

    fn references(&self) -> Vec<(&'static str, &Ref)> {
        self.set.references()
    }
}

pub(crate) fn default<T: Default + PartialEq>(t: &T) -> bool {
    *t == Default::default()
}

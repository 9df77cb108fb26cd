use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt};

use super::{Id, Nullable, PresenceSet, UtcDate};

/// An Email object, used both for creation (only the properties being set are present) and as
/// returned by `Email/get` (only the requested properties are present).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    /// The id representing the raw octets of the message [@!RFC5322] for this Email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Id>,
    /// The set of Mailbox ids this Email belongs to. An Email in the mail store MUST belong to one
    /// or more Mailboxes at all times (until it is destroyed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox_ids: Option<PresenceSet<Id>>,
    /// A set of keywords that apply to the Email, e.g. `$seen`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<PresenceSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// The date the Email was received by the message store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<UtcDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Vec<EmailAddress>>,
    #[serde(rename = "from", skip_serializing_if = "Option::is_none")]
    pub mail_from: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<UtcDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_structure: Option<EmailBodyPart>,
    /// A map of `part_id` to an `EmailBodyValue` object for none, some, or all text/* parts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_values: Option<BTreeMap<String, EmailBodyValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_body: Option<Vec<EmailBodyPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<Vec<EmailBodyPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<EmailBodyPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_attachment: Option<bool>,
    /// A plaintext fragment of the message body, up to 256 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Arbitrary header fields, each sent as its own `header:<name>` property.
    #[serde(flatten)]
    pub headers: EmailHeaders,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    /// The display name of the mailbox or group, or `None` if none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl EmailAddress {
    pub fn new(name: Option<&str>, email: &str) -> Self {
        Self {
            name: name.map(str::to_string),
            email: email.to_string(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EmailHeader {
    pub name: String,
    pub value: String,
}

impl EmailHeader {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Header fields of an [`Email`], encoded as one dynamically named `header:<name>` property per
/// entry rather than as a nested list.
///
/// A name given more than once (compared case-insensitively) is sent as a single
/// `header:<name>:all` property holding every value in order. Decoding picks up the raw
/// `header:<name>` and `header:<name>:all` forms and skips the parsed `:as*` ones.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EmailHeaders(pub Vec<EmailHeader>);

impl EmailHeaders {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values grouped by header name, in order of each name's first appearance.
    fn grouped(&self) -> Vec<(&str, Vec<&str>)> {
        let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
        for header in &self.0 {
            match groups
                .iter_mut()
                .find(|(name, _)| name.eq_ignore_ascii_case(&header.name))
            {
                Some((_, values)) => values.push(header.value.as_str()),
                None => groups.push((header.name.as_str(), vec![header.value.as_str()])),
            }
        }
        groups
    }
}

impl Serialize for EmailHeaders {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.grouped().into_iter().map(|(name, values)| {
            if values.len() == 1 {
                (format!("header:{}", name), Value::from(values[0]))
            } else {
                (format!("header:{}:all", name), Value::from(values))
            }
        }))
    }
}

impl<'de> Deserialize<'de> for EmailHeaders {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = EmailHeaders;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of `header:<name>` properties")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut headers = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    let form = match key.strip_prefix("header:") {
                        Some(form) => form,
                        None => continue,
                    };
                    match (form.split_once(':'), value) {
                        (None, Value::String(value)) => headers.push(EmailHeader {
                            name: form.to_string(),
                            value,
                        }),
                        (Some((name, "all")), Value::Array(values)) => {
                            headers.extend(values.into_iter().filter_map(|value| match value {
                                Value::String(value) => Some(EmailHeader {
                                    name: name.to_string(),
                                    value,
                                }),
                                _ => None,
                            }))
                        }
                        _ => {}
                    }
                }
                Ok(EmailHeaders(headers))
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBodyPart {
    /// Identifies this part uniquely within the Email. This is scoped to the `email_id` and has no
    /// meaning outside of the JMAP Email object representation. This is `None` if, and only if,
    /// the part is of type multipart/*.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The value of the Content-Type header field of the part, if present; otherwise, the implicit
    /// type as per the MIME standard.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_parts: Option<Vec<EmailBodyPart>>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailBodyValue {
    /// The value of the body part after decoding Content-Transfer-Encoding and the Content-Type
    /// charset, if both known to the server, and with any CRLF replaced with a single LF.
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_encoding_problem: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_truncated: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    /// The id of the Mailbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    /// User-visible name for the Mailbox, e.g., “Inbox”. There MUST NOT be two sibling Mailboxes
    /// with both the same parent and the same name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The Mailbox id for the parent of this Mailbox, or null if this Mailbox is at the top level.
    /// Mailboxes form acyclic graphs (forests) directed by the child-to-parent relationship. There
    /// MUST NOT be a loop.
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub parent_id: Nullable<Id>,
    /// Identifies Mailboxes that have a particular common purpose (e.g., the “inbox”), regardless
    /// of the name property (which may be localised).
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub role: Nullable<MailboxRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_emails: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_emails: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_threads: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_threads: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_rights: Option<MailboxRights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_subscribed: Option<bool>,
}

/// https://www.iana.org/assignments/imap-mailbox-name-attributes/imap-mailbox-name-attributes.xhtml
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxRole {
    /// All messages.
    All,
    /// Archived messages.
    Archive,
    /// Messages that are working drafts.
    Drafts,
    /// Messages with the \Flagged flag.
    Flagged,
    /// Messages deemed important to user.
    Important,
    /// Messages New mail is delivered here by default.
    Inbox,
    /// Messages identified as Spam/Junk.
    Junk,
    /// Sent mail.
    Sent,
    /// The mailbox is subscribed to.
    Subscribed,
    /// Messages the user has discarded.
    Trash,
    /// As-of-yet defined roles.
    #[serde(other)]
    Unknown,
}

impl MailboxRole {
    pub fn as_str(&self) -> &'static str {
        match *self {
            MailboxRole::All => "all",
            MailboxRole::Archive => "archive",
            MailboxRole::Drafts => "drafts",
            MailboxRole::Flagged => "flagged",
            MailboxRole::Important => "important",
            MailboxRole::Inbox => "inbox",
            MailboxRole::Junk => "junk",
            MailboxRole::Sent => "sent",
            MailboxRole::Subscribed => "subscribed",
            MailboxRole::Trash => "trash",
            MailboxRole::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxRights {
    pub may_read_items: bool,
    pub may_add_items: bool,
    pub may_remove_items: bool,
    pub may_set_seen: bool,
    pub may_set_keywords: bool,
    pub may_create_child: bool,
    pub may_rename: bool,
    pub may_delete: bool,
    pub may_submit: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: Id,
    /// The ids of the Emails in the Thread, sorted by the `received_at` date of the Email, oldest
    /// first.
    pub email_ids: Vec<Id>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSubmission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    /// The id of the Identity to associate with this submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<Id>,
    /// The id of the Email to send, or `#` followed by the creation id of an Email created
    /// earlier in the same request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Id>,
    /// Information for use when sending via SMTP. If `None` on create, the server generates it
    /// from the headers of the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Envelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_at: Option<UtcDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo_status: Option<UndoStatus>,
    /// Per-recipient delivery status, keyed by rcpt address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<BTreeMap<String, DeliveryStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsn_blob_ids: Option<Vec<Id>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mdn_blob_ids: Option<Vec<Id>>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub mail_from: Address,
    pub rcpt_to: Vec<Address>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub email: String,
    /// SMTP extension parameters, e.g. `SIZE` or `HOLDFOR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

impl Address {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            parameters: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoStatus {
    /// It may be possible to cancel this submission.
    Pending,
    /// The message has been relayed to at least one recipient in a manner that cannot be recalled.
    Final,
    /// The submission was canceled and will not be delivered to any recipient.
    Canceled,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatus {
    /// The SMTP reply string returned for this recipient when the server last tried to relay the
    /// message, or in a later Delivery Status Notification.
    pub smtp_reply: String,
    pub delivered: Delivered,
    pub displayed: Displayed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivered {
    Queued,
    Yes,
    No,
    Unknown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Displayed {
    Unknown,
    Yes,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    /// The “From” email address the client MUST use when creating a new Email from this Identity.
    pub email: String,
    #[serde(default)]
    pub reply_to: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub bcc: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub text_signature: String,
    #[serde(default)]
    pub html_signature: String,
    /// Is the user allowed to delete this Identity?
    pub may_delete: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    And,
    Or,
    Not,
}

/// A query filter: either a single condition or an operator combining further filters.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Filter<C> {
    Operator(FilterOperator<C>),
    Condition(C),
}

#[derive(Clone, Debug, Serialize)]
pub struct FilterOperator<C> {
    pub operator: Operator,
    pub conditions: Vec<Filter<C>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparator {
    /// The name of the property on the objects to compare.
    pub property: String,
    /// If true, sort in ascending order; if false, reverse the comparator’s results to sort in
    /// descending order.
    #[serde(skip_serializing_if = "is_true")]
    pub is_ascending: bool,
    /// The identifier, as registered in the collation registry defined in [@!RFC4790], for the
    /// algorithm to use when comparing the order of strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

impl Comparator {
    pub fn new(property: &str) -> Self {
        Self {
            property: property.to_string(),
            is_ascending: true,
            collation: None,
        }
    }
}

fn is_true(b: &bool) -> bool {
    *b
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailFilterCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_mailbox: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_mailbox_other_than: Option<Vec<Id>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<UtcDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<UtcDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_in_thread_have_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub some_in_thread_have_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub none_in_thread_have_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_attachment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// A header field name, optionally followed by a value the field must contain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxFilterCondition {
    /// `Null` matches top-level Mailboxes only; `Absent` does not filter on the parent.
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub parent_id: Nullable<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub role: Nullable<MailboxRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_any_role: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_subscribed: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSubmissionFilterCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_ids: Option<Vec<Id>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_ids: Option<Vec<Id>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ids: Option<Vec<Id>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo_status: Option<UndoStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<UtcDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<UtcDate>,
}

use std::{cell::RefCell, collections::VecDeque};

use jmapc::{
    batch::{self, DecodeError},
    client,
    jmap::{
        Changes, EmailGet, EmailQuery, EmailSubmission, EmailSubmissionSet, Get, Id,
        MethodCall, MethodErrorKind, MethodResponse, Patch, Session, Set, State,
    },
    reference::{self, ListOrRef, Ref, RefPath, ValueOrRef},
    transport::{self, Transport},
    Client, Invocation, Outcome, Projection,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const API_URL: &str = "https://jmap.example.com/api/";
const SESSION_URL: &str = "https://jmap.example.com/.well-known/jmap";

fn session_json(state: &str) -> Value {
    json!({
        "capabilities": {
            "urn:ietf:params:jmap:core": {
                "maxSizeUpload": 50000000,
                "maxConcurrentUpload": 4,
                "maxSizeRequest": 10000000,
                "maxConcurrentRequests": 4,
                "maxCallsInRequest": 4,
                "maxObjectsInGet": 500,
                "maxObjectsInSet": 500,
                "collationAlgorithms": []
            },
            "urn:ietf:params:jmap:mail": {},
            "urn:ietf:params:jmap:submission": {}
        },
        "accounts": {
            "A1": {"name": "ness@onett.example", "isPersonal": true, "isReadOnly": false}
        },
        "primaryAccounts": {
            "urn:ietf:params:jmap:mail": "A1",
            "urn:ietf:params:jmap:submission": "A1"
        },
        "username": "ness@onett.example",
        "apiUrl": API_URL,
        "state": state
    })
}

/// Replays canned responses in order and records every request body.
#[derive(Default)]
struct Scripted {
    responses: RefCell<VecDeque<transport::Result<Value>>>,
    requests: RefCell<Vec<Value>>,
}

impl Scripted {
    fn replying(responses: Vec<Value>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    fn failing(error: transport::Error) -> Self {
        Self {
            responses: RefCell::new(VecDeque::from([Err(error)])),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.borrow().clone()
    }
}

impl Transport for Scripted {
    fn post(&self, url: &str, body: &Value) -> transport::Result<Value> {
        assert_eq!(url, API_URL);
        self.requests.borrow_mut().push(body.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .expect("no scripted response left")
    }

    fn get(&self, url: &str) -> transport::Result<Value> {
        assert_eq!(url, SESSION_URL);
        Ok(session_json("s-refreshed"))
    }
}

fn client(transport: &Scripted) -> Client<&Scripted> {
    let session: Session = serde_json::from_value(session_json("s0")).unwrap();
    Client::with_session(transport, SESSION_URL.to_string(), session).unwrap()
}

fn response(triples: Value) -> Value {
    json!({"methodResponses": triples, "sessionState": "s0"})
}

fn mailbox_get_payload() -> Value {
    json!({
        "accountId": "A1",
        "state": "m1",
        "list": [{"id": "MBX1", "name": "Inbox", "role": "inbox", "parentId": null}],
        "notFound": []
    })
}

fn only(outcome: Outcome) -> MethodResponse {
    match outcome {
        Outcome::Result(Ok(response)) => response,
        other => panic!("expected a single decoded result, got {other:?}"),
    }
}

#[test]
fn single_call_is_unwrapped() {
    let transport = Scripted::replying(vec![response(json!([
        ["Mailbox/get", mailbox_get_payload(), "single.Mailbox/get"]
    ]))]);

    let projection = client(&transport)
        .request(vec![MethodCall::MailboxGet(Get::default()).into()])
        .unwrap();

    assert_eq!(
        transport.requests(),
        vec![json!({
            "using": ["urn:ietf:params:jmap:core", "urn:ietf:params:jmap:mail"],
            "methodCalls": [["Mailbox/get", {"accountId": "A1"}, "single.Mailbox/get"]]
        })]
    );
    let mailboxes = match projection {
        Projection::Single(outcome) => only(outcome).expect_mailbox_get().unwrap(),
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(mailboxes.state, State::from("m1"));
    assert_eq!(mailboxes.list[0].name.as_deref(), Some("Inbox"));
}

#[test]
fn response_without_session_state_is_decoded() {
    let transport = Scripted::replying(vec![json!({
        "methodResponses": [["Mailbox/get", mailbox_get_payload(), "single.Mailbox/get"]]
    })]);

    let outcome = client(&transport)
        .method_call(MethodCall::MailboxGet(Get::default()))
        .unwrap();

    let mailboxes = only(outcome).expect_mailbox_get().unwrap();
    assert_eq!(mailboxes.list.len(), 1);
}

#[test]
fn many_calls_keep_call_order() {
    let transport = Scripted::replying(vec![response(json!([
        ["Core/echo", {"second": true}, "1.Core/echo"],
        ["Core/echo", {"first": true}, "0.Core/echo"]
    ]))]);

    let echo = |key: &str| -> Invocation {
        let mut arguments = serde_json::Map::new();
        arguments.insert(key.to_string(), json!(true));
        MethodCall::CoreEcho(jmapc::jmap::Echo(arguments)).into()
    };
    let outcomes = match client(&transport)
        .request(vec![echo("first"), echo("second")])
        .unwrap()
    {
        Projection::Many(outcomes) => outcomes,
        other => panic!("unexpected {other:?}"),
    };

    let echoed: Vec<Value> = outcomes
        .into_iter()
        .map(|outcome| Value::Object(only(outcome).expect_core_echo().unwrap()))
        .collect();
    assert_eq!(echoed, vec![json!({"first": true}), json!({"second": true})]);
}

#[test]
fn query_ids_feed_email_get() {
    let transport = Scripted::replying(vec![response(json!([
        ["Email/query", {
            "accountId": "A1",
            "queryState": "q1",
            "canCalculateChanges": true,
            "position": 0,
            "ids": ["M2", "M1"]
        }, "uno"],
        ["Email/get", {
            "accountId": "A1",
            "state": "e1",
            "list": [{"id": "M1", "subject": "Hi"}, {"id": "M2", "subject": "Hello"}],
            "notFound": []
        }, "dos"]
    ]))]);

    let get = EmailGet {
        get: Get {
            ids: Some(ListOrRef::Ref(Ref::to("uno", RefPath::root().field("ids")))),
            properties: Some(vec!["subject".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };
    let projection = client(&transport)
        .request(vec![
            Invocation::with_id(MethodCall::EmailQuery(EmailQuery::default()), "uno"),
            Invocation::with_id(MethodCall::EmailGet(get), "dos"),
        ])
        .unwrap();

    let requests = transport.requests();
    assert_eq!(
        requests[0]["methodCalls"][1],
        json!(["Email/get", {
            "accountId": "A1",
            "#ids": {"resultOf": "uno", "name": "Email/query", "path": "/ids"},
            "properties": ["subject"]
        }, "dos"])
    );

    let mut outcomes = projection.into_outcomes().into_iter();
    let query = only(outcomes.next().unwrap()).expect_email_query().unwrap();
    let emails = only(outcomes.next().unwrap()).expect_email_get().unwrap();
    let mut got: Vec<Id> = emails.list.into_iter().filter_map(|email| email.id).collect();
    let mut queried = query.ids.clone();
    got.sort();
    queried.sort();
    assert_eq!(got, queried);
}

#[test]
fn forward_reference_sends_nothing() {
    let transport = Scripted::default();
    let changes = Changes::new(ValueOrRef::Ref(Ref::to(
        "later",
        RefPath::root().field("state"),
    )));

    let result = client(&transport).request(vec![
        MethodCall::EmailChanges(changes).into(),
        Invocation::with_id(MethodCall::EmailGet(EmailGet::default()), "later"),
    ]);

    assert!(matches!(
        result,
        Err(client::Error::Batch {
            source: batch::Error::Reference {
                source: reference::Error::ForwardReference { .. }
            }
        })
    ));
    assert!(transport.requests().is_empty());
}

#[test]
fn submission_with_on_success_destroy_yields_two_results() {
    let transport = Scripted::replying(vec![response(json!([
        ["EmailSubmission/set", {
            "accountId": "A1",
            "oldState": "t1",
            "newState": "t2",
            "created": {"k1490": {"id": "S1", "undoStatus": "final"}}
        }, "single.EmailSubmission/set"],
        ["Email/set", {
            "accountId": "A1",
            "oldState": "e1",
            "newState": "e2",
            "destroyed": ["M7"]
        }, "single.EmailSubmission/set"]
    ]))]);

    let submission = EmailSubmission {
        identity_id: Some(Id::from("I1")),
        email_id: Some(Id::from("M7")),
        ..Default::default()
    };
    let set = EmailSubmissionSet {
        set: Set {
            create: Some([(Id::from("k1490"), submission)].into_iter().collect()),
            ..Default::default()
        },
        on_success_destroy_email: Some(vec![Id::from("#k1490")]),
        ..Default::default()
    };
    let outcome = client(&transport)
        .method_call(MethodCall::EmailSubmissionSet(set))
        .unwrap();

    assert_eq!(
        transport.requests()[0]["using"],
        json!(["urn:ietf:params:jmap:core", "urn:ietf:params:jmap:submission"])
    );
    let mut results = match outcome {
        Outcome::WithImplicit(results) => results.into_iter(),
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(results.len(), 2);
    let submission = results
        .next()
        .unwrap()
        .unwrap()
        .expect_email_submission_set()
        .unwrap();
    assert!(submission.created.unwrap().contains_key(&Id::from("k1490")));
    let email = results.next().unwrap().unwrap().expect_email_set().unwrap();
    assert_eq!(email.destroyed, Some(vec![Id::from("M7")]));
}

#[test]
fn partial_update_failure_is_partitioned() {
    let transport = Scripted::replying(vec![response(json!([
        ["Email/set", {
            "accountId": "A1",
            "oldState": "e1",
            "newState": "e2",
            "updated": {"M1": null, "M2": null},
            "notUpdated": {"M3": {"type": "invalidProperties", "properties": ["keywords"]}}
        }, "single.Email/set"]
    ]))]);

    let patch = |keyword: &str| -> Patch {
        [(format!("keywords/{keyword}"), json!(true))]
            .into_iter()
            .collect()
    };
    let set = Set {
        update: Some(
            [
                (Id::from("M1"), patch("$seen")),
                (Id::from("M2"), patch("$seen")),
                (Id::from("M3"), patch("$bogus")),
            ]
            .into_iter()
            .collect(),
        ),
        ..Default::default()
    };
    let outcome = client(&transport)
        .method_call(MethodCall::EmailSet(set))
        .unwrap();
    let set = only(outcome).expect_email_set().unwrap();

    let mut updated: Vec<Id> = set.updated.unwrap().into_keys().collect();
    updated.sort();
    assert_eq!(updated, vec![Id::from("M1"), Id::from("M2")]);
    let not_updated = set.not_updated.unwrap();
    assert_eq!(not_updated.len(), 1);
    assert_eq!(
        not_updated[&Id::from("M3")].kind,
        MethodErrorKind::InvalidProperties
    );
}

#[test]
fn method_error_is_data_and_siblings_survive() {
    let transport = Scripted::replying(vec![response(json!([
        ["error", {"type": "unknownMethod"}, "0.Mailbox/get"],
        ["Mailbox/get", mailbox_get_payload(), "1.Mailbox/get"]
    ]))]);

    let outcomes = client(&transport)
        .request(vec![
            MethodCall::MailboxGet(Get::default()).into(),
            MethodCall::MailboxGet(Get::default()).into(),
        ])
        .unwrap()
        .into_outcomes();

    match outcomes[0].primary() {
        Ok(MethodResponse::Error(error)) => assert_eq!(error.kind, MethodErrorKind::UnknownMethod),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(outcomes[1].primary(), Ok(MethodResponse::MailboxGet(_))));
}

#[test]
fn missing_response_is_per_call() {
    let transport = Scripted::replying(vec![response(json!([
        ["Mailbox/get", mailbox_get_payload(), "0.Mailbox/get"]
    ]))]);

    let outcomes = client(&transport)
        .request(vec![
            MethodCall::MailboxGet(Get::default()).into(),
            MethodCall::ThreadGet(Get::default()).into(),
        ])
        .unwrap()
        .into_outcomes();

    assert!(matches!(outcomes[0].primary(), Ok(_)));
    assert!(matches!(
        outcomes[1].primary(),
        Err(DecodeError::MissingResponse { call_id }) if call_id == "1.Thread/get"
    ));
}

#[test]
fn transport_failure_fails_the_batch() {
    let transport = Scripted::failing(transport::Error::Status {
        url: API_URL.to_string(),
        status: 503,
    });

    let result = client(&transport).request(vec![MethodCall::MailboxGet(Get::default()).into()]);

    assert!(matches!(
        result,
        Err(client::Error::Batch {
            source: batch::Error::Transport {
                source: transport::Error::Status { status: 503, .. }
            }
        })
    ));
}

#[test]
fn unadvertised_capability_sends_nothing() {
    let transport = Scripted::default();
    let mut session: Session = serde_json::from_value(session_json("s0")).unwrap();
    session
        .capabilities
        .remove("urn:ietf:params:jmap:submission");
    let client = Client::with_session(&transport, SESSION_URL.to_string(), session).unwrap();

    let result = client.request(vec![MethodCall::IdentityGet(Get::default()).into()]);

    assert!(matches!(
        result,
        Err(client::Error::Batch {
            source: batch::Error::MissingCapability { .. }
        })
    ));
    assert!(transport.requests().is_empty());
}

#[test]
fn batches_over_the_server_limit_are_refused() {
    let transport = Scripted::default();
    let calls: Vec<Invocation> = (0..5)
        .map(|_| MethodCall::MailboxGet(Get::default()).into())
        .collect();

    let result = client(&transport).request(calls);

    assert!(matches!(
        result,
        Err(client::Error::TooManyCalls { count: 5, max: 4 })
    ));
    assert!(transport.requests().is_empty());
}

#[test]
fn session_can_be_refreshed() {
    let transport = Scripted::replying(vec![json!({
        "methodResponses": [["Core/echo", {}, "single.Core/echo"]],
        "sessionState": "s-new"
    })]);
    let mut client = client(&transport);

    client
        .method_call(MethodCall::CoreEcho(Default::default()))
        .unwrap();
    client.refresh_session().unwrap();

    assert_eq!(client.session().state, State::from("s-refreshed"));
}

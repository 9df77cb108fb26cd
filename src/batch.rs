//! Executing several method calls in one request and matching the response triples back to them.
//!
//! A batch goes through three stages: [`prepare`] assigns call ids, checks capabilities and turns
//! result references into wire back-references without touching the network; [`execute`] performs
//! the single round trip and [`correlate`]s the response triples with the calls; [`project`]
//! shapes the per-call outcomes for the caller.

use std::collections::HashSet;

use crate::{
    jmap::{self, Capability, Id, MethodCall, MethodResponse, Request, RequestInvocation},
    reference::{self, Declared, Resolver},
    transport::{self, Transport},
};
use itertools::Itertools;
use log::{debug, log_enabled, trace, warn};
use serde_json::Value;
use snafu::prelude::*;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Call id `{}' is used more than once in the batch", call_id))]
    DuplicateCallId { call_id: String },

    #[snafu(display("{}", source))]
    Reference { source: reference::Error },

    #[snafu(display(
        "Call `{}' ({}) requires {}, which the server does not advertise",
        call_id,
        method,
        capability
    ))]
    MissingCapability {
        call_id: String,
        method: &'static str,
        capability: &'static str,
    },

    #[snafu(display("Could not encode arguments of call `{}': {}", call_id, source))]
    EncodeArguments {
        call_id: String,
        source: serde_json::Error,
    },

    #[snafu(display("Could not encode request: {}", source))]
    EncodeRequest { source: serde_json::Error },

    #[snafu(display("Could not complete API request: {}", source))]
    Transport { source: transport::Error },

    #[snafu(display("Could not deserialize API response: {}", source))]
    DeserializeResponse { source: serde_json::Error },

    #[snafu(display(
        "Response `{}' with call id `{}' does not follow any call of the batch",
        name,
        call_id
    ))]
    UnattributedResponse { call_id: String, name: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why one response triple, or a call's missing triple, could not be decoded. Scoped to that
/// call; its siblings decode independently.
#[derive(Debug, Snafu)]
pub enum DecodeError {
    #[snafu(display("Unknown method `{}' in response to call `{}'", name, call_id))]
    UnknownMethod { call_id: String, name: String },

    #[snafu(display(
        "Could not decode `{}' response to call `{}': {}",
        name,
        call_id,
        source
    ))]
    Payload {
        call_id: String,
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("No response to call `{}'", call_id))]
    MissingResponse { call_id: String },

    #[snafu(display(
        "Response `{}' to call `{}' arrived after responses to a later call",
        name,
        call_id
    ))]
    Interleaved { call_id: String, name: String },
}

/// The result of decoding one response triple.
pub type Decoded = std::result::Result<MethodResponse, DecodeError>;

/// A method call queued in a batch, optionally under an explicit call id.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub call: MethodCall,
    pub id: Option<String>,
}

impl Invocation {
    pub fn new(call: MethodCall) -> Self {
        Self { call, id: None }
    }

    /// Queue `call` under `id`, so that later calls can reference it by name.
    pub fn with_id(call: MethodCall, id: impl Into<String>) -> Self {
        Self {
            call,
            id: Some(id.into()),
        }
    }
}

impl From<MethodCall> for Invocation {
    fn from(call: MethodCall) -> Self {
        Self::new(call)
    }
}

/// A batch ready to be sent: the wire request plus the call ids it declares, in request order.
#[derive(Debug)]
pub struct PreparedBatch {
    pub request: Request,
    declared: Vec<Declared>,
}

impl PreparedBatch {
    pub fn call_ids(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(|call| call.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}

/// Build the wire request for `invocations`.
///
/// Calls without an account id get `account_id`. Every capability a call needs must be in
/// `advertised`. Nothing is sent; every error here happens before any I/O.
pub fn prepare(
    invocations: Vec<Invocation>,
    account_id: Option<&Id>,
    advertised: &[Capability],
) -> Result<PreparedBatch> {
    let mut taken = HashSet::new();
    for id in invocations.iter().filter_map(|invocation| invocation.id.as_deref()) {
        ensure!(taken.insert(id.to_string()), DuplicateCallIdSnafu { call_id: id });
    }

    let single = invocations.len() == 1;
    let declared: Vec<Declared> = invocations
        .iter()
        .enumerate()
        .map(|(index, invocation)| {
            let name = invocation.call.name();
            let id = match &invocation.id {
                Some(id) => id.clone(),
                None => {
                    let base = if single {
                        format!("single.{name}")
                    } else {
                        format!("{index}.{name}")
                    };
                    let id = unused_id(&taken, base);
                    taken.insert(id.clone());
                    id
                }
            };
            Declared { id, name }
        })
        .collect();

    let using: Vec<Capability> = std::iter::once(Capability::Core)
        .chain(
            invocations
                .iter()
                .flat_map(|invocation| invocation.call.spec().capabilities.iter().copied()),
        )
        .unique()
        .collect();

    let resolver = Resolver::new(&declared);
    let mut method_calls = Vec::with_capacity(invocations.len());
    for (position, (invocation, call)) in invocations.into_iter().zip(&declared).enumerate() {
        let mut method_call = invocation.call;
        for capability in method_call.spec().capabilities {
            ensure!(
                advertised.contains(capability),
                MissingCapabilitySnafu {
                    call_id: &call.id,
                    method: call.name,
                    capability: capability.as_urn(),
                }
            );
        }

        if let Some(account_id) = account_id {
            if let Some(slot) = method_call.arguments_mut().account_id_mut() {
                if slot.is_none() {
                    *slot = Some(account_id.clone());
                }
            }
        }

        let resolved = method_call
            .arguments()
            .references()
            .into_iter()
            .map(|(name, reference)| {
                resolver
                    .resolve(position, reference)
                    .map(|resolved| (name, resolved))
            })
            .collect::<reference::Result<Vec<_>>>()
            .context(ReferenceSnafu {})?;
        for (name, reference) in &resolved {
            trace!(
                "Call `{}' takes #{} from `{}' at {}",
                call.id,
                name,
                reference.result_of,
                reference.path
            );
        }

        let arguments = method_call
            .encode(resolved)
            .context(EncodeArgumentsSnafu { call_id: &call.id })?;
        method_calls.push(RequestInvocation {
            name: call.name,
            arguments,
            id: call.id.clone(),
        });
    }

    debug!(
        "Prepared batch [{}] using [{}]",
        declared.iter().map(|call| &call.id).join(", "),
        using.iter().map(Capability::as_urn).join(", ")
    );

    Ok(PreparedBatch {
        request: Request {
            using,
            method_calls,
        },
        declared,
    })
}

/// `base`, or `base` with the first numeric suffix that no other call of the batch uses.
fn unused_id(taken: &HashSet<String>, base: String) -> String {
    if !taken.contains(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let id = format!("{base}.{n}");
        if !taken.contains(&id) {
            return id;
        }
        n += 1;
    }
}

/// Everything a round trip produced: one outcome per declared call, in request order.
#[derive(Debug)]
pub struct Executed {
    pub calls: Vec<CallOutcome>,
    pub session_state: Option<jmap::State>,
    pub created_ids: Option<std::collections::HashMap<String, Id>>,
}

/// Send `prepared` to `url` in one round trip and correlate the answer.
///
/// A transport failure or an unreadable response envelope fails the whole batch; a triple that
/// fails to decode only fails the call it belongs to.
pub fn execute<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
    prepared: PreparedBatch,
) -> Result<Executed> {
    let body = serde_json::to_value(&prepared.request).context(EncodeRequestSnafu {})?;
    if log_enabled!(log::Level::Trace) {
        trace!("Request: {body}");
    }

    let raw = transport.post(url, &body).context(TransportSnafu {})?;
    let response: jmap::Response =
        serde_json::from_value(raw).context(DeserializeResponseSnafu {})?;

    let calls = correlate(&prepared.declared, response.method_responses)?;
    Ok(Executed {
        calls,
        session_state: response.session_state,
        created_ids: response.created_ids,
    })
}

/// All decoded responses to one call, in response order. The first is the call's own response;
/// any others are implicit calls the server made on its behalf.
#[derive(Debug)]
pub struct CallOutcome {
    pub id: String,
    pub method: &'static str,
    pub responses: Vec<Decoded>,
}

/// Group response triples by the call they answer and decode each one.
pub fn correlate(
    declared: &[Declared],
    triples: Vec<jmap::ResponseInvocation>,
) -> Result<Vec<CallOutcome>> {
    let mut groups: Vec<Vec<Decoded>> = declared.iter().map(|_| Vec::new()).collect();
    let mut opened = vec![false; declared.len()];
    let mut open: Option<usize> = None;

    for triple in triples {
        let index = declared.iter().position(|call| call.id == triple.id);
        match (index, open) {
            (Some(index), Some(current)) if index == current => {
                groups[current].push(decode(&declared[current].id, triple));
            }
            (Some(index), _) if !opened[index] => {
                opened[index] = true;
                open = Some(index);
                let call = &declared[index];
                if triple.name != call.name && triple.name != jmap::ERROR_METHOD {
                    debug!(
                        "Call `{}' ({}) answered with `{}'",
                        call.id, call.name, triple.name
                    );
                }
                groups[index].push(decode(&call.id, triple));
            }
            (Some(index), _) => {
                warn!(
                    "Response `{}' to call `{}' is separated from the call's other responses",
                    triple.name, triple.id
                );
                groups[index].push(Err(DecodeError::Interleaved {
                    call_id: triple.id,
                    name: triple.name,
                }));
            }
            (None, Some(current)) => {
                debug!(
                    "Attaching implicit `{}' ({}) to call `{}'",
                    triple.name, triple.id, declared[current].id
                );
                groups[current].push(decode(&declared[current].id, triple));
            }
            (None, None) => {
                return UnattributedResponseSnafu {
                    call_id: triple.id,
                    name: triple.name,
                }
                .fail()
            }
        }
    }

    Ok(declared
        .iter()
        .zip(groups)
        .map(|(call, mut responses)| {
            if responses.is_empty() {
                warn!("Server sent no response to call `{}'", call.id);
                responses.push(Err(DecodeError::MissingResponse {
                    call_id: call.id.clone(),
                }));
            }
            CallOutcome {
                id: call.id.clone(),
                method: call.name,
                responses,
            }
        })
        .collect())
}

fn decode(call_id: &str, triple: jmap::ResponseInvocation) -> Decoded {
    let decoder = jmap::decoder(&triple.name).context(UnknownMethodSnafu {
        call_id,
        name: &triple.name,
    })?;
    decoder(triple.arguments).context(PayloadSnafu {
        call_id,
        name: triple.name,
    })
}

/// What the caller gets back for one call.
#[derive(Debug)]
pub enum Outcome {
    /// The call's only response.
    Result(Decoded),
    /// The call's own response followed by the implicit ones, in response order.
    WithImplicit(Vec<Decoded>),
}

impl Outcome {
    pub fn into_results(self) -> Vec<Decoded> {
        match self {
            Outcome::Result(result) => vec![result],
            Outcome::WithImplicit(results) => results,
        }
    }

    /// The call's own response, ignoring any implicit ones.
    pub fn primary(&self) -> &Decoded {
        match self {
            Outcome::Result(result) => result,
            // Never empty: correlation gives every call at least one entry.
            Outcome::WithImplicit(results) => &results[0],
        }
    }
}

impl From<CallOutcome> for Outcome {
    fn from(call: CallOutcome) -> Self {
        let mut responses = call.responses;
        if responses.len() == 1 {
            if let Some(result) = responses.pop() {
                return Outcome::Result(result);
            }
        }
        Outcome::WithImplicit(responses)
    }
}

#[derive(Debug)]
pub enum Projection {
    /// The batch had exactly one call.
    Single(Outcome),
    /// One outcome per call, in the order the calls were queued.
    Many(Vec<Outcome>),
}

impl Projection {
    pub fn into_outcomes(self) -> Vec<Outcome> {
        match self {
            Projection::Single(outcome) => vec![outcome],
            Projection::Many(outcomes) => outcomes,
        }
    }
}

/// Unwrap a one-call batch, otherwise keep the outcomes in call order.
pub fn project(calls: Vec<CallOutcome>) -> Projection {
    let mut outcomes: Vec<Outcome> = calls.into_iter().map(Outcome::from).collect();
    if outcomes.len() == 1 {
        if let Some(outcome) = outcomes.pop() {
            return Projection::Single(outcome);
        }
    }
    Projection::Many(outcomes)
}

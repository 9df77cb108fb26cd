//! Placeholders for arguments whose value is only known once an earlier call in the same batch
//! has run on the server.
//!
//! Nothing here is evaluated locally. A [`Ref`] is validated against the calls queued before it
//! and translated into the protocol's own back-reference object, a [`ResultReference`], which the
//! server resolves while it executes the request.

use crate::jmap::ResultReference;
use serde::{Serialize, Serializer};
use snafu::prelude::*;
use std::{fmt, str::FromStr};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Invalid result reference path `{}'", path))]
    InvalidPath { path: String },

    #[snafu(display("Call `{}' references unknown call `{}'", call_id, target))]
    UnknownReference { call_id: String, target: String },

    #[snafu(display(
        "Call `{}' references call `{}', which is not queued before it",
        call_id,
        target
    ))]
    ForwardReference { call_id: String, target: String },

    #[snafu(display(
        "Call `{}' references the call {} positions before it, but only {} calls precede it",
        call_id,
        offset,
        position
    ))]
    ReferenceOutOfRange {
        call_id: String,
        offset: usize,
        position: usize,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which earlier call a [`Ref`] points at.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RefTarget {
    /// The call with this call id.
    Call(String),
    /// The call this many positions before the referencing call; `1` is the call immediately
    /// preceding it.
    Previous(usize),
}

/// One step of a [`RefPath`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathStep {
    Field(String),
    Index(usize),
    /// Every element of an array, written `*`. The results are flattened into a single array.
    Every,
}

/// A JSON-pointer-like path into the result of an earlier call, e.g. `/ids` or
/// `/list/*/threadId`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RefPath(Vec<PathStep>);

impl RefPath {
    /// The empty path, which addresses the whole result.
    pub fn root() -> Self {
        RefPath(Vec::new())
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathStep::Field(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathStep::Index(index));
        self
    }

    pub fn every(mut self) -> Self {
        self.0.push(PathStep::Every);
        self
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for step in &self.0 {
            f.write_str("/")?;
            match step {
                PathStep::Field(name) => f.write_str(&name.replace('~', "~0").replace('/', "~1"))?,
                PathStep::Index(index) => write!(f, "{}", index)?,
                PathStep::Every => f.write_str("*")?,
            }
        }
        Ok(())
    }
}

impl FromStr for RefPath {
    type Err = Error;

    fn from_str(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Ok(RefPath::root());
        }
        let rest = path
            .strip_prefix('/')
            .context(InvalidPathSnafu { path })?;
        rest.split('/')
            .map(|segment| parse_step(segment).context(InvalidPathSnafu { path }))
            .collect::<Result<Vec<_>>>()
            .map(RefPath)
    }
}

fn parse_step(segment: &str) -> Option<PathStep> {
    if segment == "*" {
        return Some(PathStep::Every);
    }
    let is_index = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if is_index {
        return segment.parse().ok().map(PathStep::Index);
    }

    let mut name = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        match c {
            '~' => match chars.next() {
                Some('0') => name.push('~'),
                Some('1') => name.push('/'),
                _ => return None,
            },
            c => name.push(c),
        }
    }
    Some(PathStep::Field(name))
}

/// "The value found at `path` in the result of `target`, once `target` has run."
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ref {
    pub target: RefTarget,
    pub path: RefPath,
}

impl Ref {
    pub fn to(call_id: impl Into<String>, path: RefPath) -> Self {
        Ref {
            target: RefTarget::Call(call_id.into()),
            path,
        }
    }

    /// Reference the call immediately preceding the one this argument belongs to.
    pub fn previous(path: RefPath) -> Self {
        Self::back(1, path)
    }

    pub fn back(offset: usize, path: RefPath) -> Self {
        Ref {
            target: RefTarget::Previous(offset),
            path,
        }
    }
}

/// An argument which is either a literal list or a reference to a list produced by an earlier
/// call, such as the `ids` of a query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ListOrRef<T> {
    List(Vec<T>),
    Ref(Ref),
}

impl<T> ListOrRef<T> {
    pub fn reference(&self) -> Option<&Ref> {
        match self {
            ListOrRef::Ref(reference) => Some(reference),
            ListOrRef::List(_) => None,
        }
    }
}

impl<T> From<Vec<T>> for ListOrRef<T> {
    fn from(list: Vec<T>) -> Self {
        ListOrRef::List(list)
    }
}

impl<T> From<Ref> for ListOrRef<T> {
    fn from(reference: Ref) -> Self {
        ListOrRef::Ref(reference)
    }
}

impl<T: Serialize> Serialize for ListOrRef<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ListOrRef::List(list) => list.serialize(serializer),
            // Replaced by a `#`-prefixed back-reference when the call is encoded.
            ListOrRef::Ref(_) => serializer.serialize_unit(),
        }
    }
}

/// An argument which is either a literal value or a reference to a single value produced by an
/// earlier call, such as the `state` of a `/get`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValueOrRef<T> {
    Value(T),
    Ref(Ref),
}

impl<T> ValueOrRef<T> {
    pub fn reference(&self) -> Option<&Ref> {
        match self {
            ValueOrRef::Ref(reference) => Some(reference),
            ValueOrRef::Value(_) => None,
        }
    }
}

impl<T> From<T> for ValueOrRef<T> {
    fn from(value: T) -> Self {
        ValueOrRef::Value(value)
    }
}

impl<T: Serialize> Serialize for ValueOrRef<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ValueOrRef::Value(value) => value.serialize(serializer),
            ValueOrRef::Ref(_) => serializer.serialize_unit(),
        }
    }
}

/// A call as seen by the resolver: its assigned id and its method name.
#[derive(Clone, Debug)]
pub struct Declared {
    pub id: String,
    pub name: &'static str,
}

/// Translates [`Ref`]s into wire back-references for one batch.
pub struct Resolver<'a> {
    calls: &'a [Declared],
}

impl<'a> Resolver<'a> {
    /// `calls` must be every call of the batch, in request order, with unique ids.
    pub fn new(calls: &'a [Declared]) -> Self {
        Self { calls }
    }

    /// Resolve `reference`, which appears in the arguments of the call at `position`.
    ///
    /// Only calls strictly before `position` may be referenced; the server evaluates calls in
    /// order, so anything else can never resolve.
    pub fn resolve(&self, position: usize, reference: &Ref) -> Result<ResultReference> {
        let call_id = &self.calls[position].id;
        let target = match &reference.target {
            RefTarget::Previous(offset) => {
                ensure!(
                    *offset >= 1 && *offset <= position,
                    ReferenceOutOfRangeSnafu {
                        call_id,
                        offset: *offset,
                        position,
                    }
                );
                &self.calls[position - offset]
            }
            RefTarget::Call(target) => match self.calls.iter().position(|c| c.id == *target) {
                Some(index) if index < position => &self.calls[index],
                Some(_) => return ForwardReferenceSnafu { call_id, target }.fail(),
                None => return UnknownReferenceSnafu { call_id, target }.fail(),
            },
        };
        Ok(ResultReference {
            result_of: target.id.clone(),
            name: target.name.to_string(),
            path: reference.path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> Vec<Declared> {
        vec![
            Declared {
                id: "uno".into(),
                name: "Email/query",
            },
            Declared {
                id: "dos".into(),
                name: "Email/get",
            },
            Declared {
                id: "tres".into(),
                name: "Thread/get",
            },
        ]
    }

    #[test]
    fn path_renders_as_json_pointer() {
        let path = RefPath::root().field("list").every().field("threadId");
        assert_eq!(path.to_string(), "/list/*/threadId");
        assert_eq!(RefPath::root().to_string(), "");
        assert_eq!(
            RefPath::root().field("keywords/$seen~").index(0).to_string(),
            "/keywords~1$seen~0/0"
        );
    }

    #[test]
    fn path_parses_what_it_renders() {
        for s in ["/ids", "/list/*/threadId", "/added/3/id", "/a~1b~0c", ""] {
            let path: RefPath = s.parse().unwrap();
            assert_eq!(path.to_string(), s);
        }
        let path: RefPath = "/list/*/emailIds".parse().unwrap();
        assert_eq!(
            path.steps(),
            &[
                PathStep::Field("list".into()),
                PathStep::Every,
                PathStep::Field("emailIds".into())
            ]
        );
    }

    #[test]
    fn path_rejects_malformed_pointers() {
        assert!(matches!(
            "ids".parse::<RefPath>(),
            Err(Error::InvalidPath { .. })
        ));
        assert!(matches!(
            "/bad~2escape".parse::<RefPath>(),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn leading_zeros_are_field_names() {
        let path: RefPath = "/007".parse().unwrap();
        assert_eq!(path.steps(), &[PathStep::Field("007".into())]);
    }

    #[test]
    fn resolves_named_reference_to_earlier_call() {
        let calls = declared();
        let resolver = Resolver::new(&calls);
        let resolved = resolver
            .resolve(1, &Ref::to("uno", RefPath::root().field("ids")))
            .unwrap();
        assert_eq!(
            resolved,
            ResultReference {
                result_of: "uno".into(),
                name: "Email/query".into(),
                path: "/ids".into(),
            }
        );
    }

    #[test]
    fn resolves_relative_reference() {
        let calls = declared();
        let resolver = Resolver::new(&calls);
        let path = RefPath::root().field("list").every().field("threadId");
        let resolved = resolver.resolve(2, &Ref::previous(path.clone())).unwrap();
        assert_eq!(resolved.result_of, "dos");
        assert_eq!(resolved.name, "Email/get");
        let resolved = resolver.resolve(2, &Ref::back(2, path)).unwrap();
        assert_eq!(resolved.result_of, "uno");
    }

    #[test]
    fn rejects_forward_and_self_references() {
        let calls = declared();
        let resolver = Resolver::new(&calls);
        let ids = RefPath::root().field("ids");
        assert!(matches!(
            resolver.resolve(0, &Ref::to("dos", ids.clone())),
            Err(Error::ForwardReference { .. })
        ));
        assert!(matches!(
            resolver.resolve(1, &Ref::to("dos", ids)),
            Err(Error::ForwardReference { .. })
        ));
    }

    #[test]
    fn rejects_unknown_and_out_of_range_references() {
        let calls = declared();
        let resolver = Resolver::new(&calls);
        let ids = RefPath::root().field("ids");
        assert!(matches!(
            resolver.resolve(2, &Ref::to("cuatro", ids.clone())),
            Err(Error::UnknownReference { .. })
        ));
        assert!(matches!(
            resolver.resolve(0, &Ref::previous(ids.clone())),
            Err(Error::ReferenceOutOfRange { .. })
        ));
        assert!(matches!(
            resolver.resolve(1, &Ref::back(0, ids)),
            Err(Error::ReferenceOutOfRange { .. })
        ));
    }
}

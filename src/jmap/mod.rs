mod object;
mod request;
mod response;
mod session;

use chrono::{DateTime, Utc};
use core::fmt;
use std::collections::BTreeSet;

pub use object::*;
pub use request::*;
pub use response::*;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
pub use session::*;

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Debug, Clone)]
pub struct Id(pub String);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_string())
    }
}

#[derive(Eq, PartialEq, Hash, Serialize, Deserialize, Debug, Clone)]
pub struct State(pub String);

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for State {
    fn from(s: &str) -> Self {
        State(s.to_string())
    }
}

/// A timezone-aware instant, carried on the wire as an RFC 3339 string in UTC.
///
/// Fractional seconds are written with as few digits as the instant needs, so
/// `...58.5Z` encodes back as `...58.5Z` and a whole second has no fraction.
/// Any wire string in that form encodes back to itself.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct UtcDate(pub DateTime<Utc>);

impl fmt::Display for UtcDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))?;
        // Leap seconds carry nanos past one second.
        let nanos = self.0.timestamp_subsec_nanos() % 1_000_000_000;
        if nanos > 0 {
            let digits = format!("{nanos:09}");
            write!(f, ".{}", digits.trim_end_matches('0'))?;
        }
        f.write_str("Z")
    }
}

impl From<DateTime<Utc>> for UtcDate {
    fn from(date: DateTime<Utc>) -> Self {
        UtcDate(date)
    }
}

impl Serialize for UtcDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UtcDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|date| UtcDate(date.with_timezone(&Utc)))
            .map_err(|e| de::Error::custom(format!("invalid date `{s}': {e}")))
    }
}

/// An argument or property which distinguishes "not supplied" from "supplied as
/// null".
///
/// `Absent` must be paired with `skip_serializing_if = "Nullable::is_absent"` and
/// `default` so that it never reaches the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Nullable<T> {
    Absent,
    Null,
    Present(T),
}

impl<T> Default for Nullable<T> {
    fn default() -> Self {
        Nullable::Absent
    }
}

impl<T> Nullable<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Nullable::Absent)
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Nullable::Present(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Nullable::Present(value),
            None => Nullable::Null,
        }
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Nullable::Present(value) => serializer.serialize_some(value),
            Nullable::Absent | Nullable::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Nullable::from)
    }
}

/// A set of keys carried on the wire as a map of each key to `true`, e.g. the
/// `mailboxIds` and `keywords` properties of an `Email`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PresenceSet<K: Ord>(pub BTreeSet<K>);

impl<K: Ord> Default for PresenceSet<K> {
    fn default() -> Self {
        PresenceSet(BTreeSet::new())
    }
}

impl<K: Ord> PresenceSet<K> {
    pub fn contains(&self, key: &K) -> bool {
        self.0.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.0.iter()
    }
}

impl<K: Ord> FromIterator<K> for PresenceSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        PresenceSet(iter.into_iter().collect())
    }
}

impl<K: Ord + Serialize> Serialize for PresenceSet<K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter().map(|key| (key, true)))
    }
}

impl<'de, K: Ord + Deserialize<'de>> Deserialize<'de> for PresenceSet<K> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Servers should never send `false`, but a key mapped to `false` is not a member.
        let map = std::collections::BTreeMap::<K, bool>::deserialize(deserializer)?;
        Ok(map
            .into_iter()
            .filter(|(_, present)| *present)
            .map(|(key, _)| key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn utc_date_round_trips_the_wire_string() {
        let date: UtcDate = serde_json::from_value(json!("1994-08-24T12:01:02Z")).unwrap();
        assert_eq!(date.0, Utc.with_ymd_and_hms(1994, 8, 24, 12, 1, 2).unwrap());
        assert_eq!(serde_json::to_value(date).unwrap(), json!("1994-08-24T12:01:02Z"));
    }

    #[test]
    fn utc_date_round_trips_the_instant() {
        let instant = UtcDate(
            Utc.with_ymd_and_hms(2022, 5, 1, 23, 59, 58).unwrap() + chrono::Duration::milliseconds(250),
        );
        let wire = serde_json::to_value(instant).unwrap();
        assert_eq!(wire, json!("2022-05-01T23:59:58.25Z"));
        let decoded: UtcDate = serde_json::from_value(wire).unwrap();
        assert_eq!(decoded, instant);
    }

    #[test]
    fn utc_date_keeps_short_fractions() {
        for wire in [
            "2022-05-01T23:59:58.5Z",
            "2022-05-01T23:59:58.0625Z",
            "2022-05-01T23:59:58.123456789Z",
        ] {
            let date: UtcDate = serde_json::from_value(json!(wire)).unwrap();
            assert_eq!(serde_json::to_value(date).unwrap(), json!(wire));
        }
    }

    #[test]
    fn utc_date_normalises_offsets() {
        let date: UtcDate = serde_json::from_value(json!("1994-08-24T14:01:02+02:00")).unwrap();
        assert_eq!(date.to_string(), "1994-08-24T12:01:02Z");
    }

    #[test]
    fn utc_date_rejects_garbage() {
        assert!(serde_json::from_value::<UtcDate>(json!("yesterday")).is_err());
    }

    #[test]
    fn presence_set_encodes_members_as_true() {
        let set: PresenceSet<Id> = ["MBX1", "MBX5"].into_iter().map(Id::from).collect();
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            json!({"MBX1": true, "MBX5": true})
        );
        let decoded: PresenceSet<Id> =
            serde_json::from_value(json!({"MBX1": true, "MBX2": false})).unwrap();
        assert!(decoded.contains(&Id::from("MBX1")));
        assert!(!decoded.contains(&Id::from("MBX2")));
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Holder {
        #[serde(default, skip_serializing_if = "Nullable::is_absent")]
        parent_id: Nullable<Id>,
    }

    #[test]
    fn nullable_keeps_absent_null_and_present_apart() {
        let absent = Holder {
            parent_id: Nullable::Absent,
        };
        let null = Holder {
            parent_id: Nullable::Null,
        };
        let present = Holder {
            parent_id: Nullable::Present(Id::from("MBX1")),
        };
        assert_eq!(serde_json::to_value(&absent).unwrap(), json!({}));
        assert_eq!(serde_json::to_value(&null).unwrap(), json!({"parentId": null}));
        assert_eq!(
            serde_json::to_value(&present).unwrap(),
            json!({"parentId": "MBX1"})
        );

        assert_eq!(serde_json::from_value::<Holder>(json!({})).unwrap(), absent);
        assert_eq!(
            serde_json::from_value::<Holder>(json!({"parentId": null})).unwrap(),
            null
        );
    }
}

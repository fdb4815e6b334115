use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// Keys the record itself owns; a statistic or histogram bucket with one of
/// these names is dropped during flattening.
pub const RESERVED_KEYS: [&str; 4] = ["name", "val", "timestamp", "type"];

/// A value carries data for this interval only when it is finite and non-zero.
pub fn is_reportable(value: f64) -> bool {
    value.is_finite() && value != 0.0
}

/// One metric point in the outbound JSON batch.
///
/// `kind` is left empty by formatters and filled with the group's type label
/// when the batch is assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireRecord {
    pub name: String,
    #[serde(flatten)]
    pub body: RecordBody,
    pub timestamp: u64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordBody {
    Value {
        #[serde(serialize_with = "serialize_number")]
        val: f64,
    },
    /// Flattened timer statistics: one top-level field per statistic.
    Stats(#[serde(serialize_with = "serialize_numbers")] BTreeMap<String, f64>),
}

impl WireRecord {
    pub fn value(name: &str, val: f64, timestamp: u64) -> Self {
        Self {
            name: name.to_owned(),
            body: RecordBody::Value { val },
            timestamp,
            kind: None,
        }
    }

    pub fn stats(name: &str, fields: BTreeMap<String, f64>, timestamp: u64) -> Self {
        Self {
            name: name.to_owned(),
            body: RecordBody::Stats(fields),
            timestamp,
            kind: None,
        }
    }

    pub fn val(&self) -> Option<f64> {
        match self.body {
            RecordBody::Value { val } => Some(val),
            RecordBody::Stats(_) => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<f64> {
        match &self.body {
            RecordBody::Value { val } if key == "val" => Some(*val),
            RecordBody::Value { .. } => None,
            RecordBody::Stats(fields) => fields.get(key).copied(),
        }
    }
}

/// Integral values go out as JSON integers (`3`, not `3.0`) so the payload
/// matches what statsd backends conventionally emit.
struct Number(f64);

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
        let v = self.0;
        if v.is_finite() && v.fract() == 0.0 && v.abs() < MAX_EXACT {
            serializer.serialize_i64(v as i64)
        } else {
            serializer.serialize_f64(v)
        }
    }
}

fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    Number(*value).serialize(serializer)
}

fn serialize_numbers<S: Serializer>(
    fields: &BTreeMap<String, f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(fields.iter().map(|(k, v)| (k, Number(*v))))
}

//! Typed field resolver for case data details.
//!
//! # Design
//! A case owns a set of detail records. Each one describes a single value
//! slot whose type is signalled by one of ten boolean flags. `DetailValueKind`
//! turns those flags into a tagged union, so picking the slot to write is an
//! exhaustive match instead of a flag scan. A record with no flag set, or
//! with several, is rejected before anything is written.
//!
//! References use `GROUP.CODE`. A reference without a dot only matches
//! records that have no group.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::error::{CallerError, DomainFailure, Result};
use crate::payload::Payload;

pub const DETAILS_BY_CASE_PATH: &str = "Pll/CaseDataDetail/ByCaObjectId";
pub const UPDATE_DETAIL_PATH: &str = "Pll/CaseDataDetail/Update";

/// The ten value kinds a detail record can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailValueKind {
    Number,
    Text,
    Date,
    YesNo,
    CalcRate,
    Comment,
    Currency,
    ListValue,
    Q1Q2Q3,
    Value,
}

impl DetailValueKind {
    /// Inspection order of the type flags.
    pub const PRIORITY: [DetailValueKind; 10] = [
        DetailValueKind::Number,
        DetailValueKind::Text,
        DetailValueKind::Date,
        DetailValueKind::YesNo,
        DetailValueKind::CalcRate,
        DetailValueKind::Comment,
        DetailValueKind::Currency,
        DetailValueKind::ListValue,
        DetailValueKind::Q1Q2Q3,
        DetailValueKind::Value,
    ];

    /// Name of the update field this kind writes.
    pub fn slot(self) -> &'static str {
        match self {
            DetailValueKind::Number => "NumberValue",
            DetailValueKind::Text => "TextValue",
            DetailValueKind::Date => "DateValue",
            DetailValueKind::YesNo => "YesNoValue",
            DetailValueKind::CalcRate => "CalcRateValue",
            DetailValueKind::Comment => "CommentValue",
            DetailValueKind::Currency => "CurrencyValue",
            DetailValueKind::ListValue => "ListValue",
            DetailValueKind::Q1Q2Q3 => "Q1Q2Q3Value",
            DetailValueKind::Value => "Value",
        }
    }

    /// Wire name of the flag that selects this kind.
    pub fn flag(self) -> &'static str {
        match self {
            DetailValueKind::Number => "NumberFlag",
            DetailValueKind::Text => "TextFlag",
            DetailValueKind::Date => "DateFlag",
            DetailValueKind::YesNo => "YesNoFlag",
            DetailValueKind::CalcRate => "CalcRateFlag",
            DetailValueKind::Comment => "CommentFlag",
            DetailValueKind::Currency => "CurrencyFlag",
            DetailValueKind::ListValue => "ListValuesFlag",
            DetailValueKind::Q1Q2Q3 => "Q1Q2Q3Flag",
            DetailValueKind::Value => "ValueFlag",
        }
    }

    /// Adjust a value for this slot. Only yes/no values change.
    pub fn normalize(self, value: Value) -> Value {
        if self != DetailValueKind::YesNo {
            return value;
        }
        let normalized = match value.as_str() {
            Some("Y" | "Yes") => "Y",
            Some("N" | "No") => "N",
            _ => return value,
        };
        Value::String(normalized.to_string())
    }
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Option::<bool>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A case-owned value slot as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetailRecord {
    pub ca_data_detail_id: i64,
    #[serde(default)]
    pub ca_object_id: Option<i64>,
    #[serde(default)]
    pub group_code: Option<String>,
    pub detail_code: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub number_flag: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub text_flag: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub date_flag: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub yes_no_flag: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub calc_rate_flag: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub comment_flag: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub currency_flag: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub list_values_flag: bool,
    #[serde(default, rename = "Q1Q2Q3Flag", deserialize_with = "null_as_false")]
    pub q1q2q3_flag: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub value_flag: bool,
    /// Every other field the service returns, value slots included.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetailRecord {
    pub fn has_flag(&self, kind: DetailValueKind) -> bool {
        match kind {
            DetailValueKind::Number => self.number_flag,
            DetailValueKind::Text => self.text_flag,
            DetailValueKind::Date => self.date_flag,
            DetailValueKind::YesNo => self.yes_no_flag,
            DetailValueKind::CalcRate => self.calc_rate_flag,
            DetailValueKind::Comment => self.comment_flag,
            DetailValueKind::Currency => self.currency_flag,
            DetailValueKind::ListValue => self.list_values_flag,
            DetailValueKind::Q1Q2Q3 => self.q1q2q3_flag,
            DetailValueKind::Value => self.value_flag,
        }
    }

    /// `GROUP.CODE`, or just `CODE` for ungrouped records.
    pub fn reference(&self) -> String {
        match self.group_code.as_deref() {
            Some(group) if !group.is_empty() => format!("{group}.{}", self.detail_code),
            _ => self.detail_code.clone(),
        }
    }

    /// The single value kind this record holds.
    pub fn value_kind(&self) -> std::result::Result<DetailValueKind, CallerError> {
        let set: Vec<DetailValueKind> = DetailValueKind::PRIORITY
            .into_iter()
            .filter(|kind| self.has_flag(*kind))
            .collect();
        match set.as_slice() {
            [kind] => Ok(*kind),
            [] => Err(CallerError::UntypedDetail {
                reference: self.reference(),
            }),
            several => Err(CallerError::AmbiguousDetailType {
                reference: self.reference(),
                flags: several.iter().map(|kind| kind.flag()).collect(),
            }),
        }
    }

    /// Current value of this record's slot, if the service returned one.
    pub fn current_value(&self) -> Option<&Value> {
        let kind = self.value_kind().ok()?;
        self.extra.get(kind.slot())
    }

    fn matches(&self, reference: &DetailReference<'_>) -> bool {
        if self.detail_code != reference.code {
            return false;
        }
        match (reference.group, self.group_code.as_deref()) {
            (Some(wanted), Some(group)) => wanted == group,
            (Some(_), None) => false,
            (None, group) => group.unwrap_or_default().is_empty(),
        }
    }
}

/// A parsed `GROUP.CODE` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailReference<'a> {
    pub group: Option<&'a str>,
    pub code: &'a str,
}

impl<'a> DetailReference<'a> {
    pub fn parse(reference: &'a str) -> std::result::Result<Self, CallerError> {
        let parsed = match reference.split_once('.') {
            Some((group, code)) => Self {
                group: Some(group),
                code,
            },
            None => Self {
                group: None,
                code: reference,
            },
        };
        if parsed.code.is_empty() || parsed.group.is_some_and(str::is_empty) {
            return Err(CallerError::InvalidReference(reference.to_string()));
        }
        Ok(parsed)
    }
}

/// Reads and writes case details by `GROUP.CODE` reference.
#[derive(Debug, Clone)]
pub struct DetailResolver {
    dispatcher: Dispatcher,
}

impl DetailResolver {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// All detail records owned by a case.
    pub async fn details(&self, case_id: i64) -> Result<Vec<DetailRecord>> {
        let envelope = self
            .dispatcher
            .dispatch(DETAILS_BY_CASE_PATH, Payload::new().with("CaObjectId", case_id))
            .await?
            .ensure_status(DomainFailure::Rejected)?;
        let records: Option<Vec<DetailRecord>> = envelope.decode()?;
        Ok(records.unwrap_or_default())
    }

    /// First record matching `reference`.
    pub fn resolve<'r>(
        records: &'r [DetailRecord],
        reference: &str,
    ) -> std::result::Result<&'r DetailRecord, CallerError> {
        let parsed = DetailReference::parse(reference)?;
        records
            .iter()
            .find(|record| record.matches(&parsed))
            .ok_or_else(|| CallerError::NotFound(reference.to_string()))
    }

    /// Update payload writing `value` into the record's single slot.
    pub fn update_payload(
        case_id: i64,
        record: &DetailRecord,
        value: Value,
    ) -> std::result::Result<Payload, CallerError> {
        let kind = record.value_kind()?;
        Ok(Payload::new()
            .with("CaObjectId", case_id)
            .with("CaDataDetailId", record.ca_data_detail_id)
            .with(kind.slot(), kind.normalize(value)))
    }

    async fn write(&self, payload: Payload) -> Result<DetailRecord> {
        self.dispatcher
            .dispatch(UPDATE_DETAIL_PATH, payload)
            .await?
            .ensure_status(DomainFailure::Rejected)?
            .decode()
    }

    /// Write one value by reference and return the updated record.
    pub async fn set_value_by_reference(
        &self,
        case_id: i64,
        reference: &str,
        value: impl Into<Value>,
    ) -> Result<DetailRecord> {
        let records = self.details(case_id).await?;
        let record = Self::resolve(&records, reference)?;
        let payload = Self::update_payload(case_id, record, value.into())?;
        debug!(case_id, reference, detail_id = record.ca_data_detail_id, "writing detail");
        self.write(payload).await
    }

    /// Write several values against one snapshot of the case's details.
    ///
    /// Every reference is resolved before the first write, so an unmatched
    /// or untyped reference fails the batch without touching the case. Edits
    /// made by others between the fetch and the writes are not detected.
    pub async fn set_many_by_reference<S: AsRef<str>>(
        &self,
        case_id: i64,
        items: &[(S, Value)],
    ) -> Result<Vec<DetailRecord>> {
        let records = self.details(case_id).await?;
        let payloads = items
            .iter()
            .map(|(reference, value)| {
                let record = Self::resolve(&records, reference.as_ref())?;
                Self::update_payload(case_id, record, value.clone())
            })
            .collect::<std::result::Result<Vec<_>, CallerError>>()?;

        debug!(case_id, count = payloads.len(), "writing detail batch");
        let mut updated = Vec::with_capacity(payloads.len());
        for payload in payloads {
            updated.push(self.write(payload).await?);
        }
        Ok(updated)
    }
}

//! Normalization from raw Dice result items to [`jobsdb_core::NormalizedListing`].
//!
//! Field mapping:
//!
//! | Dice field  | Listing field |
//! |-------------|---------------|
//! | `jobTitle`  | `title`       |
//! | `company`   | `company`     |
//! | `location`  | `location`    |
//! | `detailUrl` | `detail_url`  |
//! | `date`      | `posted_on`   |
//!
//! Dice items carry no dedicated id field; the id is taken from an explicit
//! `id`/`jobId` when present and otherwise derived from `detailUrl`, whose
//! path after `/job/result/` is stable per posting.

use chrono::NaiveDate;
use jobsdb_core::{NormalizedListing, SourceQuery};
use serde_json::{Map, Value};

use crate::error::NormalizationError;

const DETAIL_PATH_MARKER: &str = "/job/result/";

/// Maps one raw record to a listing. Absent optional fields become empty
/// strings; only a record with no usable id is rejected.
///
/// # Errors
///
/// - [`NormalizationError::NotAnObject`] if `raw` is not a JSON object.
/// - [`NormalizationError::InvalidField`] if a known field has the wrong type.
/// - [`NormalizationError::MissingId`] if no id can be found or derived.
pub fn normalize_listing(
    raw: &Value,
    query: &SourceQuery,
) -> Result<NormalizedListing, NormalizationError> {
    let obj = raw.as_object().ok_or(NormalizationError::NotAnObject)?;

    let title = string_field(obj, "jobTitle")?;
    let company = string_field(obj, "company")?;
    let location = string_field(obj, "location")?;
    let detail_url = string_field(obj, "detailUrl")?;
    let posted_on = NaiveDate::parse_from_str(&string_field(obj, "date")?, "%Y-%m-%d").ok();

    let id = match explicit_id(obj)? {
        Some(id) => id,
        None => id_from_detail_url(&detail_url).ok_or(NormalizationError::MissingId)?,
    };

    Ok(NormalizedListing {
        id,
        title,
        company,
        location,
        detail_url,
        source_query: query.clone(),
        posted_on,
        raw_data: raw.clone(),
    })
}

/// Reads a trimmed string field; absent or `null` is an empty string.
fn string_field(obj: &Map<String, Value>, field: &'static str) -> Result<String, NormalizationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_owned()),
        Some(_) => Err(NormalizationError::InvalidField {
            field,
            expected: "string",
        }),
    }
}

fn explicit_id(obj: &Map<String, Value>) -> Result<Option<String>, NormalizationError> {
    for field in ["id", "jobId"] {
        match obj.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if !s.trim().is_empty() => return Ok(Some(s.trim().to_owned())),
            Some(Value::String(_)) => {}
            Some(Value::Number(n)) => return Ok(Some(n.to_string())),
            Some(_) => {
                return Err(NormalizationError::InvalidField {
                    field,
                    expected: "string or integer",
                })
            }
        }
    }
    Ok(None)
}

/// Derives a stable id from a detail URL.
///
/// `http://www.dice.com/job/result/10110872/5674-R?src=19` yields
/// `10110872/5674-R`. URLs without the marker fall back to their path.
fn id_from_detail_url(detail_url: &str) -> Option<String> {
    if detail_url.is_empty() {
        return None;
    }
    let path = reqwest::Url::parse(detail_url).map_or_else(
        |_| {
            detail_url
                .split(['?', '#'])
                .next()
                .unwrap_or(detail_url)
                .to_owned()
        },
        |u| u.path().to_owned(),
    );

    let id = match path.find(DETAIL_PATH_MARKER) {
        Some(pos) => &path[pos + DETAIL_PATH_MARKER.len()..],
        None => path.as_str(),
    };
    let id = id.trim_matches('/');
    (!id.is_empty()).then(|| id.to_owned())
}

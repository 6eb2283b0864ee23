use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Sub-scores that make up the overall match score. Each value is 0.0 – 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<f64>,
}

/// Successful `POST /upload` body. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub filename: String,
    #[serde(rename = "name")]
    pub candidate_name: String,
    /// Overall match, approximately 0.0 – 1.0.
    #[serde(rename = "score", default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
    #[serde(
        default,
        deserialize_with = "null_values_as_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub section_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_keywords: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_values_as_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub missing_keywords_by_category: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    /// Upload status echoed by the backend ("uploaded").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Row id of the stored résumé on the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_id: Option<i64>,
}

/// The backend sends `null` where it has nothing to say.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Like `null_as_default`, applied to each value of a keyed map.
fn null_values_as_default<'de, D, V>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, V>>, D::Error>
where
    D: Deserializer<'de>,
    V: Default + Deserialize<'de>,
{
    let raw = Option::<BTreeMap<String, Option<V>>>::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .map(|(key, value)| (key, value.unwrap_or_default()))
            .collect()
    }))
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::coerce::{coerce_i64, coerce_non_empty_string, coerce_number, record_array, try_parse_json};

/// Profile row returned by `/farm/me`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmProfile {
    pub farm_id: Option<i64>,
    pub farm_name: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ipcam_address: Option<String>,
    pub mac: Option<String>,
}

fn pick_profile_row(root: &Map<String, Value>) -> Option<&Map<String, Value>> {
    let data = root.get("data");
    let nested = data.and_then(|d| d.get("data"));
    [data, root.get("result"), nested]
        .into_iter()
        .flatten()
        .find_map(|v| record_array(v).into_iter().next())
}

/// Normalize the `/farm/me` response: the first row of `data[]`, `result[]`
/// or `data.data[]`. Returns `None` when no row is present.
#[must_use]
pub fn normalize_farm_profile(raw: &Value) -> Option<FarmProfile> {
    let parsed = try_parse_json(raw);
    let row = pick_profile_row(parsed.as_object()?)?;
    let string = |key: &str| row.get(key).and_then(coerce_non_empty_string);

    Some(FarmProfile {
        farm_id: row.get("farmId").and_then(coerce_i64),
        farm_name: string("farmName"),
        username: string("username"),
        name: string("name"),
        phone: string("phone"),
        role: string("role"),
        address: string("address"),
        latitude: row.get("latitude").and_then(coerce_number),
        longitude: row.get("longitude").and_then(coerce_number),
        ipcam_address: string("ipcamAddress"),
        mac: string("mac"),
    })
}

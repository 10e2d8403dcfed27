use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::coerce::{coerce_i64, coerce_non_empty_string, coerce_number};
use super::envelope::Envelope;
use super::probe::{deep_find, deep_find_record_array, deep_find_string, extract_field};

pub const ACCESS_TOKEN_KEYS: &[&str] = &[
    "access_token",
    "accessToken",
    "token",
    "jwt",
    "id_token",
    "idToken",
];
pub const REFRESH_TOKEN_KEYS: &[&str] = &["refresh_token", "refreshToken"];

const USERNAME_KEYS: &[&str] = &["username", "userName", "user_id", "userId", "loginId", "id"];
const NAME_KEYS: &[&str] = &["name", "fullName", "nickname"];
const PHONE_KEYS: &[&str] = &["phone", "phoneNumber", "mobile", "mobilePhone", "contact"];
const ROLE_KEYS: &[&str] = &["role", "userRole", "authority"];
const FARMS_KEYS: &[&str] = &["farms"];

const FARM_ADDRESS_KEYS: &[&str] = &["farmAddress", "address", "addr"];
const FARM_LATITUDE_KEYS: &[&str] = &["farmLatitude", "latitude", "lat"];
const FARM_LONGITUDE_KEYS: &[&str] = &["farmLongitude", "longitude", "lon", "lot"];
const FARM_IPCAM_KEYS: &[&str] = &["ipcam_address", "ipcamAddress", "rtsp", "rtspUrl"];

/// A farm attached to the authenticated account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFarm {
    pub farm_id: Option<i64>,
    pub farm_name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ipcam_address: Option<String>,
}

/// Canonical result of `/auth/authenticate` and `/auth/refresh-token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    #[serde(rename = "access_token")]
    pub access_token: String,
    #[serde(rename = "refresh_token")]
    pub refresh_token: String,
    pub username: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub farms: Vec<AuthFarm>,
    pub farm_address: Option<String>,
    pub farm_latitude: Option<f64>,
    pub farm_longitude: Option<f64>,
    pub ipcam_address: Option<String>,
}

fn normalize_auth_farm(raw: &Map<String, Value>) -> AuthFarm {
    let candidates = [raw];
    AuthFarm {
        farm_id: extract_field(&candidates, &["farmId", "id"], coerce_i64),
        farm_name: extract_field(&candidates, &["farmName", "name"], coerce_non_empty_string),
        address: extract_field(&candidates, &["address", "addr"], coerce_non_empty_string),
        latitude: extract_field(&candidates, &["latitude", "lat"], coerce_number),
        longitude: extract_field(&candidates, &["longitude", "lon"], coerce_number),
        ipcam_address: extract_field(&candidates, FARM_IPCAM_KEYS, coerce_non_empty_string),
    }
}

/// Normalize an authenticate or refresh response.
///
/// Returns `None` when no access token can be located anywhere in the
/// payload. A missing refresh token falls back to the access token, and a
/// missing username falls back to `fallback_username`, then `"unknown"`.
#[must_use]
pub fn normalize_auth_response(raw: &Value, fallback_username: Option<&str>) -> Option<AuthResult> {
    let envelope = Envelope::parse(raw);
    let payload = envelope.payload()?;

    let access_token = deep_find_string(payload, ACCESS_TOKEN_KEYS)?;
    let refresh_token =
        deep_find_string(payload, REFRESH_TOKEN_KEYS).unwrap_or_else(|| access_token.clone());

    let username = deep_find_string(payload, USERNAME_KEYS)
        .or_else(|| fallback_username.map(str::to_owned))
        .unwrap_or_else(|| "unknown".to_owned());
    let name = deep_find_string(payload, NAME_KEYS).unwrap_or_default();
    let phone = deep_find_string(payload, PHONE_KEYS);
    let role = deep_find_string(payload, ROLE_KEYS).unwrap_or_default();

    let farm_records = deep_find_record_array(payload, FARMS_KEYS).unwrap_or_default();
    let farms: Vec<AuthFarm> = farm_records.iter().map(|r| normalize_auth_farm(r)).collect();
    let lead_raw = farm_records.first().map(|r| Value::Object((*r).clone()));
    let lead = farms.first();

    let lead_or_payload_string = |keys: &[&str]| {
        lead_raw
            .as_ref()
            .and_then(|l| deep_find(l, keys, coerce_non_empty_string))
            .or_else(|| deep_find(payload, keys, coerce_non_empty_string))
    };
    let lead_or_payload_number = |keys: &[&str]| {
        lead_raw
            .as_ref()
            .and_then(|l| deep_find(l, keys, coerce_number))
            .or_else(|| deep_find(payload, keys, coerce_number))
    };

    let farm_address = lead
        .and_then(|f| f.address.clone())
        .or_else(|| lead_or_payload_string(FARM_ADDRESS_KEYS));
    let farm_latitude = lead
        .and_then(|f| f.latitude)
        .or_else(|| lead_or_payload_number(FARM_LATITUDE_KEYS));
    let farm_longitude = lead
        .and_then(|f| f.longitude)
        .or_else(|| lead_or_payload_number(FARM_LONGITUDE_KEYS));
    let ipcam_address = lead
        .and_then(|f| f.ipcam_address.clone())
        .or_else(|| lead_or_payload_string(FARM_IPCAM_KEYS));

    Some(AuthResult {
        access_token,
        refresh_token,
        username,
        name,
        phone,
        role,
        farms,
        farm_address,
        farm_latitude,
        farm_longitude,
        ipcam_address,
    })
}

/// New token pair from a refresh response, keeping `current_refresh` when
/// the server does not rotate the refresh token.
#[must_use]
pub fn extract_refreshed_tokens(raw: &Value, current_refresh: &str) -> Option<(String, String)> {
    let envelope = Envelope::parse(raw);
    let source = envelope.payload().unwrap_or_else(|| envelope.root());
    let access = deep_find(source, ACCESS_TOKEN_KEYS, coerce_non_empty_string)?;
    let refresh = deep_find(source, REFRESH_TOKEN_KEYS, coerce_non_empty_string)
        .unwrap_or_else(|| current_refresh.to_owned());
    Some((access, refresh))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn logical_payload() -> Value {
        json!({
            "access_token": "A",
            "refresh_token": "R",
            "name": "Kim",
            "role": "USER",
            "farms": [{
                "farmId": "3",
                "farmName": "North",
                "address": "Jeonju",
                "lat": "35.8",
                "lon": 127.1,
                "rtsp": "rtsp://cam"
            }]
        })
    }

    #[test]
    fn nested_envelope_with_fallback_username() {
        let raw = json!({"data": {"result": {"access_token": "A", "refresh_token": "R", "name": "Kim"}}});
        let result = normalize_auth_response(&raw, Some("farmer1")).unwrap();
        assert_eq!(result.access_token, "A");
        assert_eq!(result.refresh_token, "R");
        assert_eq!(result.name, "Kim");
        assert_eq!(result.username, "farmer1");
        assert_eq!(result.role, "");
        assert!(result.farms.is_empty());
    }

    #[test]
    fn every_envelope_shape_yields_same_record() {
        let payload = logical_payload();
        let shapes = [
            payload.clone(),
            json!({"data": payload.clone()}),
            json!({"result": payload.clone()}),
            json!({"data": {"result": payload.clone()}}),
            json!({"result": {"data": payload.clone()}}),
        ];
        let expected = normalize_auth_response(&shapes[0], None).unwrap();
        for shape in &shapes[1..] {
            assert_eq!(normalize_auth_response(shape, None).as_ref(), Some(&expected));
        }
        assert_eq!(expected.farms[0].farm_id, Some(3));
        assert_eq!(expected.farm_address.as_deref(), Some("Jeonju"));
        assert_eq!(expected.farm_latitude, Some(35.8));
        assert_eq!(expected.farm_longitude, Some(127.1));
        assert_eq!(expected.ipcam_address.as_deref(), Some("rtsp://cam"));
    }

    #[test]
    fn alternate_token_keys() {
        let raw = json!({"result": {"jwt": "J", "user": {"userId": "u-9"}}});
        let result = normalize_auth_response(&raw, None).unwrap();
        assert_eq!(result.access_token, "J");
        assert_eq!(result.refresh_token, "J");
        assert_eq!(result.username, "u-9");
    }

    #[test]
    fn missing_tokens_yield_none() {
        assert_eq!(normalize_auth_response(&json!({"data": {"name": "Kim"}}), None), None);
        assert_eq!(normalize_auth_response(&json!(null), None), None);
        assert_eq!(normalize_auth_response(&json!("garbage"), None), None);
        assert_eq!(normalize_auth_response(&json!([{"token": "x"}]), None), None);
    }

    #[test]
    fn refreshed_tokens_keep_current_refresh() {
        let raw = json!({"data": {"accessToken": "NEW"}});
        assert_eq!(
            extract_refreshed_tokens(&raw, "R0"),
            Some(("NEW".to_string(), "R0".to_string()))
        );
        let rotated = json!({"result": {"access_token": "N", "refresh_token": "R1"}});
        assert_eq!(
            extract_refreshed_tokens(&rotated, "R0"),
            Some(("N".to_string(), "R1".to_string()))
        );
        assert_eq!(extract_refreshed_tokens(&json!({"ok": true}), "R0"), None);
    }

    #[test]
    fn bare_string_bodies_carry_no_tokens() {
        assert_eq!(extract_refreshed_tokens(&json!("eyJhbGciOi"), "R0"), None);
        assert_eq!(normalize_auth_response(&json!("eyJhbGciOi"), Some("farmer")), None);

        let stringified = json!(r#"{"data": {"accessToken": "NEW"}}"#);
        assert_eq!(
            extract_refreshed_tokens(&stringified, "R0"),
            Some(("NEW".to_string(), "R0".to_string()))
        );
    }
}

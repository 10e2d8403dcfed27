//! Input checks run before any request is sent.

use serde::{Deserialize, Serialize};

use crate::types::SensorKey;

/// Earliest `YYYYMMDD` the market price archive covers.
pub const MARKET_DATA_START: u32 = 20230101;

/// A rejected form field and the message shown next to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Filters of the market price search screen. Dates are `YYYYMMDD`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSearchFilters {
    pub start_date: String,
    pub end_date: String,
    pub item_code: Option<String>,
    pub grade: Option<String>,
    pub unit_name: Option<String>,
}

impl MarketSearchFilters {
    /// # Errors
    ///
    /// Fails on a missing date, a start before [`MARKET_DATA_START`], or an
    /// end before the start.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_date.is_empty() {
            return Err(ValidationError::new("startDate", "시작일을 선택해 주세요."));
        }
        if self.end_date.is_empty() {
            return Err(ValidationError::new("endDate", "종료일을 선택해 주세요."));
        }
        let start = self.start_date.parse::<u32>().ok();
        if !start.is_some_and(|s| s >= MARKET_DATA_START) {
            return Err(ValidationError::new(
                "startDate",
                "데이터는 2023년부터 수집중입니다.",
            ));
        }
        let end = self.end_date.parse::<u32>().ok();
        if !matches!((start, end), (Some(s), Some(e)) if e >= s) {
            return Err(ValidationError::new(
                "endDate",
                "종료일은 시작일보다 크거나 같아야 합니다.",
            ));
        }
        Ok(())
    }
}

/// How a sensor's alarm thresholds are entered and rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdRule {
    pub decimals: u32,
    pub integer_only: bool,
}

impl ThresholdRule {
    const INTEGER: Self = Self {
        decimals: 0,
        integer_only: true,
    };

    const fn decimal(decimals: u32) -> Self {
        Self {
            decimals,
            integer_only: false,
        }
    }

    /// Rule for a canonical sensor key; unknown sensors are integer-only.
    #[must_use]
    pub fn for_sensor(sensor: &str) -> Self {
        match sensor {
            SensorKey::TEMPERATURE | SensorKey::HYDROGEN_ION | SensorKey::SOIL_TEMPERATURE => {
                Self::decimal(1)
            }
            SensorKey::EC => Self::decimal(2),
            _ => Self::INTEGER,
        }
    }

    /// Round `value` to this rule's precision.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        if self.integer_only {
            return value.round();
        }
        let scale = 10f64.powi(self.decimals as i32);
        (value * scale).round() / scale
    }

    /// Parse one threshold field. A `,` decimal separator is accepted;
    /// integer-only rules reject any fraction.
    #[must_use]
    pub fn parse_input(&self, raw: &str) -> Option<f64> {
        let normalized = raw.trim().replacen(',', ".", 1);
        if normalized.is_empty() || (self.integer_only && normalized.contains('.')) {
            return None;
        }
        normalized.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Display form: fixed precision with trailing fractional zeros removed.
    #[must_use]
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return String::new();
        }
        let fixed = format!("{value:.*}", self.decimals as usize);
        if fixed.contains('.') {
            fixed.trim_end_matches('0').trim_end_matches('.').to_owned()
        } else {
            fixed
        }
    }
}

/// Raw text of the min/max inputs on the threshold editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdDraft {
    pub min_input: String,
    pub max_input: String,
}

/// Validated thresholds; a blank input means "no bound".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdValue {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ThresholdDraft {
    /// # Errors
    ///
    /// Fails when a non-blank input is not a number under `rule`, or when
    /// min exceeds max.
    pub fn validate(&self, rule: ThresholdRule) -> Result<ThresholdValue, ValidationError> {
        let field = |raw: &str, name: &'static str, message: &str| {
            if raw.trim().is_empty() {
                return Ok(None);
            }
            rule.parse_input(raw)
                .map(Some)
                .ok_or_else(|| ValidationError::new(name, message))
        };
        let min = field(&self.min_input, "minInput", "최소값을 숫자로 입력해 주세요.")?;
        let max = field(&self.max_input, "maxInput", "최대값을 숫자로 입력해 주세요.")?;
        if matches!((min, max), (Some(lo), Some(hi)) if lo > hi) {
            return Err(ValidationError::new(
                "maxInput",
                "최소값은 최대값보다 클 수 없습니다.",
            ));
        }
        Ok(ThresholdValue {
            min: min.map(|v| rule.normalize(v)),
            max: max.map(|v| rule.normalize(v)),
        })
    }
}

/// Login screen input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub user_id: String,
    pub password: String,
}

impl LoginForm {
    /// # Errors
    ///
    /// Fails when either field is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("userId", "아이디를 입력해 주세요"));
        }
        if self.password.trim().is_empty() {
            return Err(ValidationError::new("password", "비밀번호를 입력해 주세요"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(start: &str, end: &str) -> MarketSearchFilters {
        MarketSearchFilters {
            start_date: start.into(),
            end_date: end.into(),
            ..Default::default()
        }
    }

    #[test]
    fn market_search_dates() {
        assert!(filters("20240101", "20240131").validate().is_ok());
        assert!(filters("20240101", "20240101").validate().is_ok());
        assert_eq!(filters("", "20240101").validate().unwrap_err().field, "startDate");
        assert_eq!(filters("20240101", "").validate().unwrap_err().field, "endDate");
        assert_eq!(filters("20221231", "20240101").validate().unwrap_err().field, "startDate");
        assert_eq!(filters("2024-01-01", "20240101").validate().unwrap_err().field, "startDate");
        assert_eq!(filters("20240201", "20240131").validate().unwrap_err().field, "endDate");
    }

    #[test]
    fn threshold_rules() {
        assert_eq!(ThresholdRule::for_sensor("temperature"), ThresholdRule::decimal(1));
        assert_eq!(ThresholdRule::for_sensor("ec"), ThresholdRule::decimal(2));
        assert!(ThresholdRule::for_sensor("humidity").integer_only);
        assert!(ThresholdRule::for_sensor("leafWetness").integer_only);
    }

    #[test]
    fn threshold_parsing() {
        let decimal = ThresholdRule::decimal(1);
        assert_eq!(decimal.parse_input(" 12,5 "), Some(12.5));
        assert_eq!(decimal.parse_input("-3"), Some(-3.0));
        assert_eq!(decimal.parse_input("abc"), None);
        assert_eq!(ThresholdRule::INTEGER.parse_input("12.0"), None);
        assert_eq!(ThresholdRule::INTEGER.parse_input("12"), Some(12.0));
    }

    #[test]
    fn threshold_draft_validation() {
        let rule = ThresholdRule::decimal(2);
        let draft = ThresholdDraft {
            min_input: "1.234".into(),
            max_input: " ".into(),
        };
        assert_eq!(
            draft.validate(rule).unwrap(),
            ThresholdValue { min: Some(1.23), max: None }
        );

        let inverted = ThresholdDraft {
            min_input: "30".into(),
            max_input: "10".into(),
        };
        assert_eq!(inverted.validate(rule).unwrap_err().field, "maxInput");

        let bad_min = ThresholdDraft {
            min_input: "x".into(),
            max_input: "10".into(),
        };
        assert_eq!(bad_min.validate(rule).unwrap_err().field, "minInput");

        let fractional = ThresholdDraft {
            min_input: "1.5".into(),
            max_input: String::new(),
        };
        assert!(fractional.validate(ThresholdRule::INTEGER).is_err());
    }

    #[test]
    fn threshold_formatting() {
        assert_eq!(ThresholdRule::decimal(2).format(1.5), "1.5");
        assert_eq!(ThresholdRule::decimal(1).format(20.0), "20");
        assert_eq!(ThresholdRule::INTEGER.format(100.0), "100");
        assert_eq!(ThresholdRule::INTEGER.format(f64::NAN), "");
    }

    #[test]
    fn login_form() {
        let ok = LoginForm {
            user_id: "farmer1".into(),
            password: "pw".into(),
        };
        assert!(ok.validate().is_ok());
        let blank = LoginForm {
            user_id: "  ".into(),
            password: "pw".into(),
        };
        assert_eq!(blank.validate().unwrap_err().field, "userId");
        let no_password = LoginForm {
            user_id: "farmer1".into(),
            password: String::new(),
        };
        assert_eq!(no_password.validate().unwrap_err().field, "password");
    }
}

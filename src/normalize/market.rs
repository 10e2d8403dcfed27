//! Market price composers: the item chart and the recent-prices board.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Date, Month};

use super::coerce::{coerce_number, non_empty_str, parse_yyyymmdd, record_array};
use super::envelope::Envelope;

/// Longest timeline built from a `startDate`/`endDate` pair.
pub const MAX_TIMELINE_DAYS: usize = 370;

const HALF_YEAR_DAYS: i64 = 183;

/// One day on the market chart, keyed by `MMDD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketChartPoint {
    pub mmdd: String,
    pub label: String,
    pub current_price: Option<f64>,
    pub last_year_avg_price: Option<f64>,
    pub three_year_avg_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketChartSeries {
    pub today: String,
    pub item_code: String,
    pub item_name: String,
    pub unit_name: String,
    pub grade_name: String,
    pub points: Vec<MarketChartPoint>,
}

/// Values used when the response omits the item description.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartFallback<'a> {
    pub item_code: &'a str,
    pub item_name: &'a str,
    pub unit_name: &'a str,
    pub grade_name: &'a str,
    pub today: &'a str,
}

fn string_field(record: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    record?.get(key).and_then(non_empty_str).map(str::to_owned)
}

fn mmdd_of(date: Date) -> String {
    format!("{:02}{:02}", u8::from(date.month()), date.day())
}

fn split_mmdd(mmdd: &str) -> Option<(Month, u8)> {
    if mmdd.len() != 4 || !mmdd.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let month: u8 = mmdd[0..2].parse().ok()?;
    let day: u8 = mmdd[2..4].parse().ok()?;
    Some((Month::try_from(month).ok()?, day))
}

/// `"0305"` → `"3/5"`; anything that is not four digits is returned as-is.
#[must_use]
pub fn format_mmdd_label(mmdd: &str) -> String {
    match split_mmdd(mmdd) {
        Some((month, day)) => format!("{}/{}", u8::from(month), day),
        None => mmdd.to_owned(),
    }
}

/// Place an `MMDD` key in the year that puts it within half a year of `base`.
///
/// Returns `None` for keys that are not a calendar day in the chosen year.
#[must_use]
pub fn resolve_date_from_mmdd(mmdd: &str, base: Date) -> Option<Date> {
    let (month, day) = split_mmdd(mmdd)?;
    let year = base.year();
    let candidate = Date::from_calendar_date(year, month, day).ok()?;
    let diff = (candidate - base).whole_days();
    if diff > HALF_YEAR_DAYS {
        candidate.replace_year(year - 1).ok()
    } else if diff < -HALF_YEAR_DAYS {
        candidate.replace_year(year + 1).ok()
    } else {
        Some(candidate)
    }
}

fn build_mmdd_range(start: Option<&str>, end: Option<&str>) -> Vec<String> {
    let (Some(start), Some(end)) = (start.and_then(parse_yyyymmdd), end.and_then(parse_yyyymmdd))
    else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = start;
    while cursor <= end && out.len() < MAX_TIMELINE_DAYS {
        out.push(mmdd_of(cursor));
        let Some(next) = cursor.next_day() else {
            break;
        };
        cursor = next;
    }
    out
}

/// `MMDD` → mean of the `averagePrice` values under each `dates[]` row.
/// Rows with no usable price map to `None`.
fn range_prices(range: Option<&Map<String, Value>>) -> HashMap<String, Option<f64>> {
    let Some(dates) = range.and_then(|r| r.get("dates")) else {
        return HashMap::new();
    };
    record_array(dates)
        .into_iter()
        .filter_map(|row| {
            let price_date = row.get("priceDate").and_then(non_empty_str)?;
            if price_date.len() < 8 {
                return None;
            }
            let mmdd = price_date.get(price_date.len() - 4..)?.to_owned();
            let values: Vec<f64> = row
                .get("prices")
                .map(record_array)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|p| p.get("averagePrice").and_then(coerce_number))
                .collect();
            let average = (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);
            Some((mmdd, average))
        })
        .collect()
}

/// Merge three-year averages, the recent range and the one-year-ago range
/// into one chart series keyed by `MMDD`.
///
/// The timeline runs from `startDate` to `endDate` when both parse; otherwise
/// it is the sorted union of every `MMDD` seen. Points after `today` carry no
/// current price. Returns `None` when the response has no usable payload or
/// no points.
#[must_use]
pub fn parse_market_chart_data(raw: &Value, fallback: ChartFallback<'_>) -> Option<MarketChartSeries> {
    let envelope = Envelope::parse(raw);
    let result = *envelope.candidates().first()?;

    let mut three_year = HashMap::new();
    let mut mmdd_set = BTreeSet::new();
    if let Some(averages) = result.get("averages") {
        for row in record_array(averages) {
            let Some(mmdd) = row.get("mmdd").and_then(non_empty_str) else {
                continue;
            };
            mmdd_set.insert(mmdd.to_owned());
            three_year.insert(mmdd.to_owned(), row.get("averagePrice").and_then(coerce_number));
        }
    }

    let recent_range = result.get("upToMinus7Days").and_then(Value::as_object);
    let last_year_range = result.get("oneYearAgoRange").and_then(Value::as_object);
    let recent = range_prices(recent_range);
    let last_year = range_prices(last_year_range);
    mmdd_set.extend(recent.keys().cloned());
    mmdd_set.extend(last_year.keys().cloned());

    let bound = |key: &str| {
        string_field(Some(result), key)
            .or_else(|| string_field(recent_range, key))
            .or_else(|| string_field(last_year_range, key))
    };
    let timeline = build_mmdd_range(bound("startDate").as_deref(), bound("endDate").as_deref());
    let ordered: Vec<String> = if timeline.is_empty() {
        mmdd_set.into_iter().collect()
    } else {
        timeline
    };
    if ordered.is_empty() {
        return None;
    }

    let today = string_field(Some(result), "today").unwrap_or_else(|| fallback.today.to_owned());
    let today_date = parse_yyyymmdd(&today);

    let points = ordered
        .into_iter()
        .map(|mmdd| {
            let is_future = today_date
                .and_then(|t| resolve_date_from_mmdd(&mmdd, t).map(|d| d > t))
                .unwrap_or(false);
            MarketChartPoint {
                label: format_mmdd_label(&mmdd),
                current_price: if is_future { None } else { recent.get(&mmdd).copied().flatten() },
                last_year_avg_price: last_year.get(&mmdd).copied().flatten(),
                three_year_avg_price: three_year.get(&mmdd).copied().flatten(),
                mmdd,
            }
        })
        .collect();

    let or_fallback = |keys: &[&str], default: &str| {
        keys.iter()
            .find_map(|k| string_field(Some(result), k))
            .unwrap_or_else(|| default.to_owned())
    };

    Some(MarketChartSeries {
        today,
        item_code: or_fallback(&["itemCode"], fallback.item_code),
        item_name: or_fallback(&["itemName"], fallback.item_name),
        unit_name: or_fallback(&["unitName"], fallback.unit_name),
        grade_name: or_fallback(&["grade", "gradeName"], fallback.grade_name),
        points,
    })
}

/// Latest and previous price for one item/unit/grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradePrice {
    pub id: String,
    pub label: String,
    pub price: i64,
    pub prev_price: i64,
    pub item_code: String,
    pub grade_name: String,
    pub unit_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSection {
    pub title: String,
    pub grades: Vec<GradePrice>,
}

/// Sort rank of a Korean grade name: 특, 상, 중, 하, then everything else.
#[must_use]
pub fn grade_rank(grade_name: &str) -> u8 {
    match grade_name {
        "특" => 0,
        "상" => 1,
        "중" => 2,
        "하" => 3,
        _ => 99,
    }
}

struct PriceRecord<'a> {
    price_date: &'a str,
    item_name: &'a str,
    item_code: &'a str,
    unit_name: &'a str,
    grade_name: &'a str,
    average_price: f64,
}

fn text<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    row.get(key).and_then(non_empty_str)
}

impl<'a> PriceRecord<'a> {
    fn parse(row: &'a Map<String, Value>) -> Option<Self> {
        Some(Self {
            price_date: text(row, "priceDate")?,
            item_name: text(row, "itemName")?,
            item_code: text(row, "itemCode")?,
            unit_name: text(row, "unitName")?,
            grade_name: text(row, "gradeName")?,
            average_price: row.get("averagePrice").and_then(coerce_number)?,
        })
    }
}

fn grade_price(rows: &mut [PriceRecord<'_>]) -> Option<GradePrice> {
    rows.sort_by(|a, b| b.price_date.cmp(a.price_date));
    let latest = rows.first()?;
    let previous = rows.get(1).unwrap_or(latest);
    Some(GradePrice {
        id: format!("{}-{}-{}", latest.item_code, latest.unit_name, latest.grade_name),
        label: format!("{}({})", latest.item_name, latest.grade_name),
        price: latest.average_price.round() as i64,
        prev_price: previous.average_price.round() as i64,
        item_code: latest.item_code.to_owned(),
        grade_name: latest.grade_name.to_owned(),
        unit_name: latest.unit_name.to_owned(),
    })
}

/// Normalize `/market/prices/recently` into titled sections of grade prices.
///
/// Records are grouped by item code, unit and grade; each group reports its
/// latest price and the one before it (or the latest again when alone).
/// Sections are keyed by `productName`, falling back to `"{itemName} {unitName}"`.
#[must_use]
pub fn parse_recent_price_sections(raw: &Value) -> Vec<PriceSection> {
    let envelope = Envelope::parse(raw);
    let Some(items) = envelope
        .candidates()
        .into_iter()
        .find_map(|c| c.get("items").filter(|v| v.is_array()))
    else {
        return Vec::new();
    };

    let mut sections: Vec<PriceSection> = Vec::new();
    for item in record_array(items) {
        let records: Vec<PriceRecord<'_>> = item
            .get("records")
            .map(record_array)
            .unwrap_or_default()
            .into_iter()
            .filter_map(PriceRecord::parse)
            .collect();
        let Some(first) = records.first() else {
            continue;
        };
        let title = item
            .get("productName")
            .and_then(non_empty_str)
            .map_or_else(|| format!("{} {}", first.item_name, first.unit_name), str::to_owned);

        let mut groups: Vec<(String, Vec<PriceRecord<'_>>)> = Vec::new();
        for record in records {
            let key = format!("{}::{}::{}", record.item_code, record.unit_name, record.grade_name);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, bucket)) => bucket.push(record),
                None => groups.push((key, vec![record])),
            }
        }

        let index = match sections.iter().position(|s| s.title == title) {
            Some(index) => index,
            None => {
                sections.push(PriceSection { title, grades: Vec::new() });
                sections.len() - 1
            }
        };
        let section = &mut sections[index];
        section
            .grades
            .extend(groups.iter_mut().filter_map(|(_, rows)| grade_price(rows)));
        section.grades.sort_by_key(|g| grade_rank(&g.grade_name));
    }
    sections
}

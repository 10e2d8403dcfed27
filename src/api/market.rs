use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

use crate::client::ApiClient;
use crate::endpoints;
use crate::error::Error;
use crate::normalize::coerce::format_yyyymmdd;
use crate::normalize::{
    ChartFallback, MarketChartSeries, PriceSection, parse_market_chart_data,
    parse_recent_price_sections,
};
use crate::storage::SecureStore;
use crate::transport::Transport;
use crate::validation::MarketSearchFilters;

/// Paging of the market search. Defaults to page 1 with 20 records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub page: u32,
    pub count: u32,
}

impl Default for SearchPage {
    fn default() -> Self {
        Self { page: 1, count: 20 }
    }
}

/// Item, grade and unit identifying one market chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartQuery {
    pub item_code: String,
    pub grade_name: String,
    pub unit_name: String,
    /// Shown when the response omits the item name.
    pub item_name: Option<String>,
}

/// Filters of `GET /market/meta/items`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuery {
    pub large_code: Option<String>,
    pub mid_code: Option<String>,
    pub keyword: Option<String>,
}

impl<S: SecureStore, T: Transport> ApiClient<S, T> {
    /// Latest and previous price per item, unit and grade.
    ///
    /// # Errors
    ///
    /// Transport, status and storage errors from [`ApiClient::call`].
    pub async fn recent_price_sections(&self) -> Result<Vec<PriceSection>, Error> {
        let raw = self.call(endpoints::recent_prices()).await?;
        Ok(parse_recent_price_sections(&raw))
    }

    /// Search settlement prices. The filters are validated before any
    /// request is made; the raw page is returned as sent by the backend.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for invalid filters, plus the errors of
    /// [`ApiClient::call`].
    pub async fn search_prices(
        &self,
        filters: &MarketSearchFilters,
        page: SearchPage,
    ) -> Result<Value, Error> {
        filters.validate()?;
        let request = endpoints::search_prices()
            .with_query("startDate", &filters.start_date)
            .with_query("endDate", &filters.end_date)
            .with_optional_query("itemCode", filters.item_code.as_deref())
            .with_optional_query("grade", filters.grade.as_deref())
            .with_optional_query("unit", filters.unit_name.as_deref())
            .with_query("page", page.page)
            .with_query("count", page.count);
        let raw = self.call(request).await?;

        let records = raw
            .pointer("/data/result/records")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        tracing::debug!(records, page = page.page, "Market search page");
        Ok(raw)
    }

    /// Chart series for `query` relative to `today`.
    ///
    /// Returns `None` when the response carries no usable payload.
    ///
    /// # Errors
    ///
    /// Transport, status and storage errors from [`ApiClient::call`].
    pub async fn market_chart(
        &self,
        query: &ChartQuery,
        today: Date,
    ) -> Result<Option<MarketChartSeries>, Error> {
        let request = endpoints::average_prices()
            .with_query("itemCode", &query.item_code)
            .with_query("grade", &query.grade_name)
            .with_query("unitName", &query.unit_name);
        let raw = self.call(request).await?;

        let today = format_yyyymmdd(today);
        let fallback = ChartFallback {
            item_code: &query.item_code,
            item_name: query.item_name.as_deref().unwrap_or(&query.item_code),
            unit_name: &query.unit_name,
            grade_name: &query.grade_name,
            today: &today,
        };
        Ok(parse_market_chart_data(&raw, fallback))
    }

    /// Wholesale market list, as sent by the backend.
    ///
    /// # Errors
    ///
    /// Transport, status and storage errors from [`ApiClient::call`].
    pub async fn markets(&self) -> Result<Value, Error> {
        self.call(endpoints::markets()).await
    }

    /// Item catalogue, optionally narrowed by category codes or keyword.
    ///
    /// # Errors
    ///
    /// Transport, status and storage errors from [`ApiClient::call`].
    pub async fn items(&self, query: &ItemQuery) -> Result<Value, Error> {
        let request = endpoints::items()
            .with_optional_query("largeCode", query.large_code.as_deref())
            .with_optional_query("midCode", query.mid_code.as_deref())
            .with_optional_query("keyword", query.keyword.as_deref());
        self.call(request).await
    }
}

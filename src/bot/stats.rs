//! Country statistics: external source and pure rendering.
//!
//! The fetch side lives behind [`StatsSource`] so the engine can be driven
//! with fixed data in tests; the ranking and formatting are plain functions
//! over the fetched values.

use async_trait::async_trait;
use serde::Deserialize;

use crate::bot::graph::TransportError;

/// Default endpoint for the regional snapshot (Vietnam + global totals).
pub const SNAPSHOT_URL: &str = "https://code.junookyo.xyz/api/ncov-moh/data.json";
/// Default endpoint for the per-country summary list.
pub const SUMMARY_URL: &str = "https://api.covid19api.com/summary";

/// One country's running totals.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountrySummary {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "CountryCode", default)]
    pub country_code: String,
    #[serde(rename = "TotalConfirmed")]
    pub confirmed: u64,
    #[serde(rename = "TotalRecovered")]
    pub recovered: u64,
    #[serde(rename = "TotalDeaths")]
    pub deaths: u64,
}

/// Totals for one region of the snapshot endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionStat {
    pub cases: u64,
    pub recovered: u64,
    pub deaths: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalSnapshot {
    pub vietnam: RegionStat,
    pub global: RegionStat,
}

/// Metric a top-10 ranking sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    Cases,
    Recovered,
    Deaths,
}

impl RankMetric {
    fn value(self, country: &CountrySummary) -> u64 {
        match self {
            Self::Cases => country.confirmed,
            Self::Recovered => country.recovered,
            Self::Deaths => country.deaths,
        }
    }

    fn header(self) -> &'static str {
        match self {
            Self::Cases => "TOP CONFIRMED CASES",
            Self::Recovered => "TOP RECOVERED",
            Self::Deaths => "TOP DEATHS",
        }
    }
}

/// Display-layer name corrections applied after ranking.
fn display_name(country: &CountrySummary) -> &str {
    if country.country == "United States of America" {
        "United States"
    } else if country.country_code == "IR" {
        "Iran"
    } else {
        &country.country
    }
}

/// Render the ten highest entries by `metric`, descending, ties keeping
/// their original order, positions numbered from 1.
pub fn render_top10(countries: &[CountrySummary], metric: RankMetric) -> String {
    let mut ranked: Vec<&CountrySummary> = countries.iter().collect();
    ranked.sort_by(|a, b| metric.value(b).cmp(&metric.value(a)));

    let mut out = format!("{}\n\n", metric.header());
    for (index, country) in ranked.iter().take(10).enumerate() {
        out.push_str(&format!(
            "{}. {}: {}\n",
            index + 1,
            display_name(country),
            metric.value(country)
        ));
    }
    out
}

/// The country with the highest deaths/confirmed ratio. Entries without
/// confirmed cases are skipped; the first maximum wins on exact ties.
pub fn highest_fatality(countries: &[CountrySummary]) -> Option<(&CountrySummary, f64)> {
    let mut best: Option<(&CountrySummary, f64)> = None;
    for country in countries.iter().filter(|c| c.confirmed > 0) {
        let rate = country.deaths as f64 / country.confirmed as f64 * 100.0;
        if best.is_none_or(|(_, current)| rate > current) {
            best = Some((country, rate));
        }
    }
    best
}

pub fn render_fatality(country: &CountrySummary, rate: f64) -> String {
    format!(
        "Highest case-fatality rate: {} at {:.2}%\n\n{}\nConfirmed: {}\nRecovered: {}\nDeaths: {}",
        display_name(country),
        rate,
        display_name(country),
        country.confirmed,
        country.recovered,
        country.deaths
    )
}

pub fn render_region(label: &str, region: &RegionStat) -> String {
    format!(
        "{label}\nConfirmed: {}\nRecovered: {}\nDeaths: {}",
        region.cases, region.recovered, region.deaths
    )
}

/// External statistics fetches the keyword engine depends on.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn snapshot(&self) -> Result<RegionalSnapshot, TransportError>;
    async fn countries(&self) -> Result<Vec<CountrySummary>, TransportError>;
}

#[derive(Deserialize)]
struct SnapshotData {
    vietnam: RegionStat,
    global: RegionStat,
}

#[derive(Deserialize)]
struct SnapshotResponse {
    data: SnapshotData,
}

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(rename = "Countries")]
    countries: Vec<CountrySummary>,
}

/// Production source over the public statistics endpoints.
pub struct HttpStatsSource {
    http: reqwest::Client,
    snapshot_url: String,
    summary_url: String,
}

impl HttpStatsSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_urls(http, SNAPSHOT_URL.to_string(), SUMMARY_URL.to_string())
    }

    pub fn with_urls(http: reqwest::Client, snapshot_url: String, summary_url: String) -> Self {
        Self { http, snapshot_url, summary_url }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, TransportError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Api(format!("{}: {url}", response.status())));
        }
        // Unexpected shapes count as transport failures, never a crash.
        response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn snapshot(&self) -> Result<RegionalSnapshot, TransportError> {
        let body: SnapshotResponse = self.fetch_json(&self.snapshot_url).await?;
        Ok(RegionalSnapshot { vietnam: body.data.vietnam, global: body.data.global })
    }

    async fn countries(&self) -> Result<Vec<CountrySummary>, TransportError> {
        let body: SummaryResponse = self.fetch_json(&self.summary_url).await?;
        Ok(body.countries)
    }
}

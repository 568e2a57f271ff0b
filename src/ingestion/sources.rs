//! Source discovery: local archive directories and NOAA daily URLs

use crate::error::Result;
use crate::ingestion::archive::SourceLocator;
use chrono::{Datelike, NaiveDate};
use std::path::Path;

/// Base of the NOAA Marine Cadastre AIS daily archives.
pub const NOAA_AIS_BASE_URL: &str = "https://coast.noaa.gov/htdata/CMSP/AISDataHandler";

const ARCHIVE_SUFFIX: &str = ".csv.zst";

/// List `*.csv.zst` archives in `dir`, sorted by file name.
pub fn scan_directory(dir: impl AsRef<Path>) -> Result<Vec<SourceLocator>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        let is_archive = path
            .file_name()
            .map(|n| n.to_string_lossy().ends_with(ARCHIVE_SUFFIX))
            .unwrap_or(false);
        if is_archive && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths.into_iter().map(SourceLocator::Path).collect())
}

/// NOAA archive URL for one day.
pub fn noaa_daily_url(day: NaiveDate) -> String {
    format!(
        "{}/{}/ais-{}{}",
        NOAA_AIS_BASE_URL,
        day.year(),
        day.format("%Y-%m-%d"),
        ARCHIVE_SUFFIX
    )
}

/// NOAA archive URLs for every day in `start..=end`.
pub fn noaa_daily_urls(start: NaiveDate, end: NaiveDate) -> Vec<SourceLocator> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| SourceLocator::Url(noaa_daily_url(day)))
        .collect()
}

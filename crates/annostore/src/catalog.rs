//! Dataset and annotation listing for the bucket

use crate::Result;
use crate::transfer::Transfer;
use chrono::NaiveDateTime;
use serde::Serialize;

pub const DATASET_SUFFIX: &str = ".h5ad";
pub const CSV_SUFFIX: &str = ".csv";

/// One object line of a recursive listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<NaiveDateTime>,
}

/// Selectable objects, written as `{bucket}/{key}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub datasets: Vec<String>,
    pub csvs: Vec<String>,
}

fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], &s[end..])),
        None => Some((s, "")),
    }
}

/// Parse `aws s3 ls --recursive` output
///
/// Lines look like `2021-06-01 12:34:56      12345 some/key name.h5ad`.
/// Keys may contain spaces; `PRE` prefix lines and malformed lines are skipped.
pub fn parse_listing(text: &str) -> Vec<ListedObject> {
    text.lines()
        .filter_map(|line| {
            let (date, rest) = next_token(line)?;
            if date == "PRE" {
                return None;
            }
            let (time, rest) = next_token(rest)?;
            let (size, rest) = next_token(rest)?;
            let size = size.parse::<u64>().ok()?;
            let key = rest.trim_start().trim_end_matches(['\r', '\n']);
            if key.is_empty() {
                return None;
            }
            let last_modified =
                NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").ok();
            Some(ListedObject {
                key: key.to_string(),
                size,
                last_modified,
            })
        })
        .collect()
}

/// Sort listed objects into datasets and CSV files
pub fn build_catalog(bucket: &str, objects: &[ListedObject]) -> Catalog {
    let mut catalog = Catalog::default();
    for object in objects {
        let name = format!("{bucket}/{}", object.key);
        if object.key.ends_with(DATASET_SUFFIX) {
            catalog.datasets.push(name);
        } else if object.key.ends_with(CSV_SUFFIX) {
            catalog.csvs.push(name);
        }
    }
    catalog.datasets.sort();
    catalog.csvs.sort();
    catalog
}

/// List every `.h5ad` and `.csv` object in `bucket`
pub async fn list_catalog(transfer: &dyn Transfer, bucket: &str) -> Result<Catalog> {
    let listing = transfer.list(&format!("s3://{bucket}/")).await?;
    let objects = parse_listing(&listing);
    let catalog = build_catalog(bucket, &objects);

    let datasets = catalog.datasets.len();
    let csvs = catalog.csvs.len();
    diagnostics::debug!(
        "Catalog for {bucket}: {datasets} datasets, {csvs} csv files",
        bucket: bucket,
        datasets: datasets,
        csvs: csvs
    );
    Ok(catalog)
}

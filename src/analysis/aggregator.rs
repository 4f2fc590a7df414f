//! Fixed review statistics.
//!
//! Every report is a pure function of the table. Groupings keep the
//! first-seen order of their keys and all sorts are stable, so ties are
//! broken by the order in which a station (or vendor) first appears.

use crate::models::{
    Dashboard, DashboardMetadata, DistributionBucket, LongWaitStation, StationRating,
    StationRecord, StationVolume, Table, VendorRating, WaitMentions, ONE_STAR_COLUMN,
};
use std::collections::{HashMap, HashSet};

/// Default row limit for the top/worst station reports.
pub const DEFAULT_REPORT_ROWS: usize = 10;

/// Group records by `key`, folding each group with `fold`, in first-seen order.
fn group_by<'a, A: Default>(
    records: &'a [StationRecord],
    key: impl Fn(&'a StationRecord) -> &'a str,
    fold: impl Fn(&mut A, &'a StationRecord),
) -> Vec<(&'a str, A)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, A)> = Vec::new();

    for record in records {
        let k = key(record);
        let slot = *index.entry(k).or_insert_with(|| {
            groups.push((k, A::default()));
            groups.len() - 1
        });
        fold(&mut groups[slot].1, record);
    }

    groups
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Stations with the most reviews, summed across duplicate rows.
pub fn top_stations_by_volume(table: &Table, n: usize) -> Vec<StationVolume> {
    let mut volumes: Vec<StationVolume> = group_by(
        table.records(),
        |r| r.station_id.as_str(),
        |sum: &mut u64, r| *sum = sum.saturating_add(r.reviews_count),
    )
    .into_iter()
    .map(|(station_id, review_count)| StationVolume {
        station_id: station_id.to_string(),
        review_count,
    })
    .collect();

    volumes.sort_by_key(|v| std::cmp::Reverse(v.review_count));
    volumes.truncate(n);
    volumes
}

/// Stations with the lowest mean rating, worst first.
pub fn worst_stations_by_rating(table: &Table, n: usize) -> Vec<StationRating> {
    let mut ratings: Vec<StationRating> = group_by(
        table.records(),
        |r| r.station_id.as_str(),
        |mean: &mut Mean, r| mean.add(r.total_score),
    )
    .into_iter()
    .map(|(station_id, mean)| StationRating {
        station_id: station_id.to_string(),
        average_score: mean.value(),
    })
    .collect();

    ratings.sort_by(|a, b| a.average_score.total_cmp(&b.average_score));
    ratings.truncate(n);
    ratings
}

/// Mean rating per vendor, best first.
pub fn average_rating_by_vendor(table: &Table) -> Vec<VendorRating> {
    let mut ratings: Vec<VendorRating> = group_by(
        table.records(),
        |r| r.vendor.as_str(),
        |mean: &mut Mean, r| mean.add(r.total_score),
    )
    .into_iter()
    .map(|(vendor, mean)| VendorRating {
        vendor: vendor.to_string(),
        average_score: mean.value(),
    })
    .collect();

    ratings.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
    ratings
}

/// Value counts of the single-star bucket, by bucket value ascending.
///
/// Empty when the column is absent. Null and non-numeric cells are skipped.
pub fn review_distribution(table: &Table) -> Vec<DistributionBucket> {
    if !table.has_column(ONE_STAR_COLUMN) {
        return Vec::new();
    }

    let mut values: Vec<f64> = table
        .records()
        .iter()
        .filter_map(|r| r.field(ONE_STAR_COLUMN))
        .filter_map(|v| match v {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect();
    values.sort_by(f64::total_cmp);

    let mut buckets: Vec<DistributionBucket> = Vec::new();
    for value in values {
        match buckets.last_mut() {
            Some(bucket) if bucket.value == value => bucket.stations += 1,
            _ => buckets.push(DistributionBucket { value, stations: 1 }),
        }
    }

    buckets
}

fn mentions(record: &StationRecord, needle: &str) -> bool {
    record.reviews_text().to_lowercase().contains(needle)
}

/// Rows whose reviews mention "wait" (case-insensitive), and the rest.
pub fn wait_time_mentions(table: &Table) -> WaitMentions {
    let with = table
        .records()
        .iter()
        .filter(|r| mentions(r, "wait"))
        .count();

    WaitMentions {
        mentions: with,
        no_mentions: table.len() - with,
    }
}

/// Distinct stations whose reviews contain "long wait" (case-insensitive).
pub fn stations_with_long_wait(table: &Table) -> Vec<LongWaitStation> {
    let mut seen = HashSet::new();

    table
        .records()
        .iter()
        .filter(|r| mentions(r, "long wait"))
        .map(|r| LongWaitStation {
            station_id: r.station_id.clone(),
            address: r.address.clone(),
        })
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Run all six reports.
pub fn build_dashboard(
    table: &Table,
    metadata: DashboardMetadata,
    top_n: usize,
    worst_n: usize,
) -> Dashboard {
    Dashboard {
        metadata,
        top_stations: top_stations_by_volume(table, top_n),
        worst_stations: worst_stations_by_rating(table, worst_n),
        vendor_ratings: average_rating_by_vendor(table),
        review_distribution: review_distribution(table),
        wait_mentions: wait_time_mentions(table),
        long_wait_stations: stations_with_long_wait(table),
    }
}

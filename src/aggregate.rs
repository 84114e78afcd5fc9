use tracing::{debug, warn};

use crate::error::{AggregateError, Result};
use crate::models::{
    CategoryField, Gender, GroupMap, Metric, PassRatio, RankedStudent, StudentRecord,
    SCORE_RANGE,
};

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_PASS_THRESHOLD: f64 = 60.0;

/// Rank records by average score, highest first, keeping the first `top_n`
/// (default 10). Ties keep input order.
pub fn rank_by_average_score(
    records: &[StudentRecord],
    top_n: Option<usize>,
) -> Result<Vec<RankedStudent<'_>>> {
    rank_by(records, top_n.unwrap_or(DEFAULT_TOP_N), |record| {
        record.average_score()
    })
}

/// Same as [`rank_by_average_score`] with a caller-chosen ranking value.
pub fn rank_by<'a, R>(
    records: &'a [StudentRecord],
    top_n: usize,
    rank: R,
) -> Result<Vec<RankedStudent<'a>>>
where
    R: Fn(&StudentRecord) -> Result<f64>,
{
    if top_n == 0 {
        return Err(AggregateError::InvalidArgument(
            "top_n must be a positive integer".to_string(),
        ));
    }

    let mut ranked = records
        .iter()
        .map(|record| {
            Ok(RankedStudent {
                record,
                score: score_of(record, &rank)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    sort_descending(&mut ranked);
    ranked.truncate(top_n);

    debug!(records = records.len(), top_n, kept = ranked.len(), "ranked records");
    Ok(ranked)
}

pub fn rank_by_metric(
    records: &[StudentRecord],
    top_n: usize,
    metric: Metric,
) -> Result<Vec<RankedStudent<'_>>> {
    rank_by(records, top_n, |record| metric.value(record))
}

/// Count records per distinct key, in first-seen key order.
pub fn count_by_category<K>(records: &[StudentRecord], key_fn: K) -> Result<GroupMap<usize>>
where
    K: Fn(&StudentRecord) -> &str,
{
    let mut counts = GroupMap::new();
    for record in records {
        let key = key_of(record, &key_fn)?;
        *counts.entry_or_insert_with(key, || 0) += 1;
    }

    debug!(records = records.len(), groups = counts.len(), "counted records by category");
    Ok(counts)
}

pub fn count_by_field(records: &[StudentRecord], field: CategoryField) -> Result<GroupMap<usize>> {
    count_by_category(records, |record| field.key(record))
}

/// Tally, per gender, how many records clear `threshold` in all three
/// subjects. Genders outside male/female fail the whole call.
pub fn pass_ratio_by_gender(records: &[StudentRecord], threshold: f64) -> Result<PassRatio> {
    check_pass_threshold(threshold)?;

    let mut ratio = PassRatio::default();
    for record in records {
        let gender = Gender::parse(&record.gender).map_err(|err| {
            warn!(student_id = %record.student_id, error = %err, "record rejected from pass ratio");
            err
        })?;
        let passed = record.passes(threshold)?;

        let tally = ratio.get_mut(gender);
        tally.total_count += 1;
        if passed {
            tally.pass_count += 1;
        }
    }

    debug!(
        threshold,
        male_pass = ratio.male.pass_count,
        female_pass = ratio.female.pass_count,
        "tallied pass ratio by gender"
    );
    Ok(ratio)
}

/// Partition records by `group_key` and keep the `k` best of each group by
/// `rank`. Groups smaller than `k` come back whole.
pub fn top_k_per_group<'a, K, R>(
    records: &'a [StudentRecord],
    group_key: K,
    k: usize,
    rank: R,
) -> Result<GroupMap<Vec<RankedStudent<'a>>>>
where
    K: Fn(&StudentRecord) -> &str,
    R: Fn(&StudentRecord) -> Result<f64>,
{
    if k == 0 {
        return Err(AggregateError::InvalidArgument(
            "k must be a positive integer".to_string(),
        ));
    }

    let mut groups: GroupMap<Vec<RankedStudent<'a>>> = GroupMap::new();
    for record in records {
        let key = key_of(record, &group_key)?;
        let score = score_of(record, &rank)?;
        groups
            .entry_or_insert_with(key, Vec::new)
            .push(RankedStudent { record, score });
    }

    debug!(records = records.len(), groups = groups.len(), k, "selected top k per group");
    Ok(groups.map_values(|mut members| {
        sort_descending(&mut members);
        members.truncate(k);
        members
    }))
}

pub fn top_k_by_field(
    records: &[StudentRecord],
    field: CategoryField,
    k: usize,
    metric: Metric,
) -> Result<GroupMap<Vec<RankedStudent<'_>>>> {
    top_k_per_group(records, |record| field.key(record), k, |record| metric.value(record))
}

/// Sum of `value` per group.
pub fn group_totals<K, V>(records: &[StudentRecord], group_key: K, value: V) -> Result<GroupMap<f64>>
where
    K: Fn(&StudentRecord) -> &str,
    V: Fn(&StudentRecord) -> Result<f64>,
{
    Ok(accumulate(records, group_key, value)?.map_values(|(sum, _)| sum))
}

/// Mean of `value` per group. Only groups with members appear.
pub fn group_averages<K, V>(
    records: &[StudentRecord],
    group_key: K,
    value: V,
) -> Result<GroupMap<f64>>
where
    K: Fn(&StudentRecord) -> &str,
    V: Fn(&StudentRecord) -> Result<f64>,
{
    Ok(accumulate(records, group_key, value)?.map_values(|(sum, count)| sum / count as f64))
}

pub fn group_totals_by_field(
    records: &[StudentRecord],
    field: CategoryField,
    metric: Metric,
) -> Result<GroupMap<f64>> {
    group_totals(records, |record| field.key(record), |record| metric.value(record))
}

pub fn group_averages_by_field(
    records: &[StudentRecord],
    field: CategoryField,
    metric: Metric,
) -> Result<GroupMap<f64>> {
    group_averages(records, |record| field.key(record), |record| metric.value(record))
}

fn accumulate<K, V>(
    records: &[StudentRecord],
    group_key: K,
    value: V,
) -> Result<GroupMap<(f64, usize)>>
where
    K: Fn(&StudentRecord) -> &str,
    V: Fn(&StudentRecord) -> Result<f64>,
{
    let mut sums: GroupMap<(f64, usize)> = GroupMap::new();
    for record in records {
        let key = key_of(record, &group_key)?;
        let amount = score_of(record, &value)?;
        let entry = sums.entry_or_insert_with(key, || (0.0, 0));
        entry.0 += amount;
        entry.1 += 1;
    }

    debug!(records = records.len(), groups = sums.len(), "accumulated group sums");
    Ok(sums)
}

/// A pass mark has to be a reachable score.
pub(crate) fn check_pass_threshold(threshold: f64) -> Result<()> {
    let (low, high) = SCORE_RANGE;
    if !threshold.is_finite() || threshold < low || threshold > high {
        return Err(AggregateError::InvalidArgument(format!(
            "pass threshold must be within {low}..={high}, got {threshold}"
        )));
    }
    Ok(())
}

fn key_of<'r, K>(record: &'r StudentRecord, key_fn: &K) -> Result<&'r str>
where
    K: Fn(&StudentRecord) -> &str,
{
    let key = key_fn(record);
    if key.trim().is_empty() {
        warn!(student_id = %record.student_id, "record has an empty group key");
        return Err(AggregateError::InvalidData(format!(
            "student {}: group key is empty",
            record.student_id
        )));
    }
    Ok(key)
}

fn score_of<R>(record: &StudentRecord, rank: &R) -> Result<f64>
where
    R: Fn(&StudentRecord) -> Result<f64>,
{
    let score = rank(record).map_err(|err| {
        warn!(student_id = %record.student_id, error = %err, "record rejected from scoring");
        err
    })?;
    if !score.is_finite() {
        return Err(AggregateError::InvalidData(format!(
            "student {}: ranking value is not finite: {score}",
            record.student_id
        )));
    }
    Ok(score)
}

// Stable, so equal scores keep their input order.
fn sort_descending(ranked: &mut [RankedStudent<'_>]) {
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

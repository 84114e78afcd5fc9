use serde::Serialize;
use tracing::debug;

use crate::aggregate;
use crate::config::AggregationConfig;
use crate::error::Result;
use crate::models::{
    CategoryField, Gender, GroupMap, Metric, PassRatio, RankedStudent, StudentRecord,
};

/// Every derived view a slideshow render needs, computed from one borrowed
/// record set.
#[derive(Debug, Clone, Serialize)]
pub struct SlideViews<'a> {
    /// Overall ranking for the bar chart.
    pub top_students: Vec<RankedStudent<'a>>,
    /// Record count per gender for the pie chart.
    pub gender_counts: GroupMap<usize>,
    pub pass_ratio: PassRatio,
    /// Best students of each gender for the performer table.
    pub top_performers: GroupMap<Vec<RankedStudent<'a>>>,
    /// Record count per race/ethnicity for the bubble chart.
    pub ethnicity_counts: GroupMap<usize>,
    pub ethnicity_totals: GroupMap<f64>,
    pub ethnicity_averages: GroupMap<f64>,
    pub top_per_ethnicity: GroupMap<Vec<RankedStudent<'a>>>,
    pub test_prep_counts: GroupMap<usize>,
}

impl<'a> SlideViews<'a> {
    /// Compute every view, failing as a whole on the first bad record.
    ///
    /// A single unrecognized gender fails the pass ratio and with it the
    /// whole bundle. Callers that need the other charts to survive bad data
    /// call the functions in [`aggregate`] per chart instead.
    pub fn build(records: &'a [StudentRecord], config: &AggregationConfig) -> Result<Self> {
        config.validate()?;
        let metric = config.ranking_metric;

        let views = Self {
            top_students: aggregate::rank_by_metric(records, config.top_n, metric)?,
            gender_counts: aggregate::count_by_field(records, CategoryField::Gender)?,
            pass_ratio: aggregate::pass_ratio_by_gender(records, config.pass_threshold)?,
            top_performers: aggregate::top_k_by_field(
                records,
                CategoryField::Gender,
                config.top_k,
                metric,
            )?,
            ethnicity_counts: aggregate::count_by_field(records, CategoryField::RaceEthnicity)?,
            ethnicity_totals: aggregate::group_totals_by_field(
                records,
                CategoryField::RaceEthnicity,
                metric,
            )?,
            ethnicity_averages: aggregate::group_averages_by_field(
                records,
                CategoryField::RaceEthnicity,
                metric,
            )?,
            top_per_ethnicity: aggregate::top_k_by_field(
                records,
                CategoryField::RaceEthnicity,
                config.top_k,
                metric,
            )?,
            test_prep_counts: aggregate::count_by_field(records, CategoryField::TestPreparation)?,
        };

        debug!(
            records = records.len(),
            ethnicity_groups = views.ethnicity_counts.len(),
            "built slide views"
        );
        Ok(views)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Performer table for a single gender, as shown after a pie slice is
/// selected.
pub fn performers_for_gender<'a>(
    records: &'a [StudentRecord],
    gender: &str,
    k: usize,
    metric: Metric,
) -> Result<Vec<RankedStudent<'a>>> {
    let gender = Gender::parse(gender)?;
    let top = aggregate::top_k_by_field(records, CategoryField::Gender, k, metric)?;
    Ok(top.get(gender.as_str()).cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AggregateError;
    use crate::models::RawStudentRow;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn fixture_records() -> Vec<StudentRecord> {
        let mut reader =
            csv::Reader::from_reader(include_str!("../fixtures/students.csv").as_bytes());
        reader
            .deserialize::<RawStudentRow>()
            .map(|row| StudentRecord::from_row(row.unwrap()).unwrap())
            .collect()
    }

    fn ids(ranked: &[RankedStudent<'_>]) -> Vec<String> {
        ranked.iter().map(|r| r.record.student_id.clone()).collect()
    }

    #[test]
    fn builds_every_slide_view() {
        init_logging();
        let records = fixture_records();
        let views = SlideViews::build(&records, &AggregationConfig::default()).unwrap();

        assert_eq!(
            ids(&views.top_students),
            vec!["3", "7", "17", "2", "6", "5", "16", "14", "13", "1"]
        );
        assert_eq!(views.gender_counts.get("female"), Some(&11));
        assert_eq!(views.gender_counts.get("male"), Some(&9));

        assert_eq!(views.pass_ratio.female.pass_count, 7);
        assert_eq!(views.pass_ratio.male.pass_count, 4);
        assert_eq!(views.pass_ratio.total_count(), records.len());

        assert_eq!(ids(views.top_performers.get("female").unwrap()), vec!["3", "7", "2"]);
        assert_eq!(ids(views.top_performers.get("male").unwrap()), vec!["17", "5", "14"]);

        assert_eq!(
            views.ethnicity_counts.keys().collect::<Vec<_>>(),
            vec!["group B", "group C", "group A", "group D"]
        );
        assert_eq!(views.ethnicity_counts.total(), records.len());
        assert_eq!(views.test_prep_counts.get("completed"), Some(&4));
    }

    #[test]
    fn ethnicity_views_agree() {
        let records = fixture_records();
        let views = SlideViews::build(&records, &AggregationConfig::default()).unwrap();

        let total = views.ethnicity_totals.get("group D").copied().unwrap();
        let average = views.ethnicity_averages.get("group D").copied().unwrap();
        assert!((total - 110.0).abs() < 1e-9);
        assert!((average - 55.0).abs() < 1e-9);
        assert_eq!(ids(views.top_per_ethnicity.get("group D").unwrap()), vec!["9", "12"]);
        assert_eq!(
            ids(views.top_per_ethnicity.get("group A").unwrap()),
            vec!["14", "15", "4"]
        );
    }

    #[test]
    fn views_serialize_for_the_renderer() {
        let records = fixture_records();
        let views = SlideViews::build(&records, &AggregationConfig::default()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&views.to_json().unwrap()).unwrap();

        assert_eq!(json["top_students"][0]["record"]["student_id"], "3");
        assert_eq!(json["pass_ratio"]["male"]["total_count"], 9);
        assert_eq!(json["ethnicity_counts"]["group B"], 8);
    }

    #[test]
    fn build_rejects_invalid_config() {
        let records = fixture_records();
        let config = AggregationConfig {
            top_n: 0,
            ..AggregationConfig::default()
        };
        assert!(matches!(
            SlideViews::build(&records, &config),
            Err(AggregateError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_gender_fails_bundle_but_not_per_chart_views() {
        let mut records = fixture_records();
        records[4].gender = "other".to_string();

        assert!(matches!(
            SlideViews::build(&records, &AggregationConfig::default()),
            Err(AggregateError::InvalidData(_))
        ));

        let ethnicity = aggregate::count_by_field(&records, CategoryField::RaceEthnicity).unwrap();
        assert_eq!(ethnicity.total(), records.len());
        let genders = aggregate::count_by_field(&records, CategoryField::Gender).unwrap();
        assert_eq!(genders.get("other"), Some(&1));
    }

    #[test]
    fn performers_for_selected_gender() {
        let records = fixture_records();
        let male = performers_for_gender(&records, "Male", 3, Metric::Average).unwrap();
        assert_eq!(ids(&male), vec!["17", "5", "14"]);

        let female = performers_for_gender(&records, "female", 2, Metric::Math).unwrap();
        assert_eq!(ids(&female), vec!["3", "7"]);
    }

    #[test]
    fn performers_reject_unknown_gender() {
        let records = fixture_records();
        assert!(matches!(
            performers_for_gender(&records, "unknown", 3, Metric::Average),
            Err(AggregateError::InvalidData(_))
        ));
    }
}

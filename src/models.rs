use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{AggregateError, Result};

/// Lowest and highest score a subject can hold.
pub const SCORE_RANGE: (f64, f64) = (0.0, 100.0);

/// One dataset row exactly as the loader hands it over, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStudentRow {
    #[serde(rename = "student id")]
    pub student_id: String,
    pub gender: String,
    #[serde(rename = "race/ethnicity")]
    pub race_ethnicity: String,
    #[serde(rename = "parental level of education")]
    pub parental_level_of_education: String,
    pub lunch: String,
    #[serde(rename = "test preparation course")]
    pub test_preparation_course: String,
    #[serde(rename = "math score")]
    pub math_score: String,
    #[serde(rename = "reading score")]
    pub reading_score: String,
    #[serde(rename = "writing score")]
    pub writing_score: String,
}

/// A validated, normalized student row. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub gender: String,
    pub race_ethnicity: String,
    pub parental_level_of_education: String,
    pub lunch: String,
    pub test_preparation_course: String,
    pub math_score: f64,
    pub reading_score: f64,
    pub writing_score: f64,
}

impl StudentRecord {
    /// Normalize and validate a raw row.
    ///
    /// Strings are trimmed and gender is lowercased. Empty fields and scores
    /// that are not finite numbers in `[0, 100]` are rejected.
    pub fn from_row(row: RawStudentRow) -> Result<Self> {
        let student_id = row.student_id.trim().to_string();
        if student_id.is_empty() {
            return Err(AggregateError::InvalidData(
                "record is missing `student id`".to_string(),
            ));
        }

        Ok(Self {
            gender: required(&student_id, "gender", &row.gender)?.to_lowercase(),
            race_ethnicity: required(&student_id, "race/ethnicity", &row.race_ethnicity)?,
            parental_level_of_education: required(
                &student_id,
                "parental level of education",
                &row.parental_level_of_education,
            )?,
            lunch: required(&student_id, "lunch", &row.lunch)?,
            test_preparation_course: required(
                &student_id,
                "test preparation course",
                &row.test_preparation_course,
            )?,
            math_score: parse_score(&student_id, "math score", &row.math_score)?,
            reading_score: parse_score(&student_id, "reading score", &row.reading_score)?,
            writing_score: parse_score(&student_id, "writing score", &row.writing_score)?,
            student_id,
        })
    }

    /// Mean of the three subject scores, recomputed on every call.
    pub fn average_score(&self) -> Result<f64> {
        let (math, reading, writing) = self.scores()?;
        Ok((math + reading + writing) / 3.0)
    }

    /// True when every subject score reaches `threshold`.
    pub fn passes(&self, threshold: f64) -> Result<bool> {
        let (math, reading, writing) = self.scores()?;
        Ok(math >= threshold && reading >= threshold && writing >= threshold)
    }

    fn scores(&self) -> Result<(f64, f64, f64)> {
        Ok((
            check_score(&self.student_id, "math score", self.math_score)?,
            check_score(&self.student_id, "reading score", self.reading_score)?,
            check_score(&self.student_id, "writing score", self.writing_score)?,
        ))
    }
}

fn required(student_id: &str, field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AggregateError::InvalidData(format!(
            "student {student_id}: `{field}` is empty"
        )));
    }
    Ok(value.to_string())
}

fn parse_score(student_id: &str, field: &str, value: &str) -> Result<f64> {
    let parsed: f64 = value.trim().parse().map_err(|_| {
        AggregateError::InvalidData(format!(
            "student {student_id}: `{field}` is not a number: {value:?}"
        ))
    })?;
    check_score(student_id, field, parsed)
}

fn check_score(student_id: &str, field: &str, value: f64) -> Result<f64> {
    let (low, high) = SCORE_RANGE;
    if !value.is_finite() || value < low || value > high {
        return Err(AggregateError::InvalidData(format!(
            "student {student_id}: `{field}` is outside {low}..={high}: {value}"
        )));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Parse a gender value, case-insensitively. Anything outside the
    /// closed set is a data error.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(AggregateError::InvalidData(format!(
                "unrecognized gender: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical columns usable as a group key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    Gender,
    RaceEthnicity,
    ParentalEducation,
    Lunch,
    TestPreparation,
}

impl CategoryField {
    pub fn key<'a>(&self, record: &'a StudentRecord) -> &'a str {
        match self {
            CategoryField::Gender => &record.gender,
            CategoryField::RaceEthnicity => &record.race_ethnicity,
            CategoryField::ParentalEducation => &record.parental_level_of_education,
            CategoryField::Lunch => &record.lunch,
            CategoryField::TestPreparation => &record.test_preparation_course,
        }
    }

    /// Dataset header this field is read from.
    pub fn header(&self) -> &'static str {
        match self {
            CategoryField::Gender => "gender",
            CategoryField::RaceEthnicity => "race/ethnicity",
            CategoryField::ParentalEducation => "parental level of education",
            CategoryField::Lunch => "lunch",
            CategoryField::TestPreparation => "test preparation course",
        }
    }
}

impl FromStr for CategoryField {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gender" => Ok(CategoryField::Gender),
            "race/ethnicity" | "race_ethnicity" | "ethnicity" | "race" => {
                Ok(CategoryField::RaceEthnicity)
            }
            "parental level of education" | "parental_education" => {
                Ok(CategoryField::ParentalEducation)
            }
            "lunch" => Ok(CategoryField::Lunch),
            "test preparation course" | "test_preparation" | "test prep" => {
                Ok(CategoryField::TestPreparation)
            }
            other => Err(AggregateError::InvalidArgument(format!(
                "unknown category field: {other:?}"
            ))),
        }
    }
}

/// Numeric value a ranking or total is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Average,
    Math,
    Reading,
    Writing,
}

impl Metric {
    pub fn value(&self, record: &StudentRecord) -> Result<f64> {
        match self {
            Metric::Average => record.average_score(),
            Metric::Math => check_score(&record.student_id, "math score", record.math_score),
            Metric::Reading => {
                check_score(&record.student_id, "reading score", record.reading_score)
            }
            Metric::Writing => {
                check_score(&record.student_id, "writing score", record.writing_score)
            }
        }
    }
}

impl FromStr for Metric {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "average" | "avg" => Ok(Metric::Average),
            "math" | "math score" => Ok(Metric::Math),
            "reading" | "reading score" => Ok(Metric::Reading),
            "writing" | "writing score" => Ok(Metric::Writing),
            other => Err(AggregateError::InvalidArgument(format!(
                "unknown metric: {other:?}"
            ))),
        }
    }
}

/// A record paired with the value it was ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedStudent<'a> {
    pub record: &'a StudentRecord,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassTally {
    pub pass_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassRatio {
    pub male: PassTally,
    pub female: PassTally,
}

impl PassRatio {
    pub fn get(&self, gender: Gender) -> &PassTally {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
        }
    }

    pub(crate) fn get_mut(&mut self, gender: Gender) -> &mut PassTally {
        match gender {
            Gender::Male => &mut self.male,
            Gender::Female => &mut self.female,
        }
    }

    pub fn total_count(&self) -> usize {
        self.male.total_count + self.female.total_count
    }
}

/// Group key to value mapping that remembers first-seen key order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for GroupMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> GroupMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry_or_insert_with(
        &mut self,
        key: &str,
        default: impl FnOnce() -> V,
    ) -> &mut V {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.entries.push((key.to_string(), default()));
                let i = self.entries.len() - 1;
                self.index.insert(key.to_string(), i);
                i
            }
        };
        &mut self.entries[i].1
    }

    pub(crate) fn map_values<U>(self, mut f: impl FnMut(V) -> U) -> GroupMap<U> {
        GroupMap {
            entries: self.entries.into_iter().map(|(k, v)| (k, f(v))).collect(),
            index: self.index,
        }
    }
}

impl GroupMap<usize> {
    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }
}

impl<V: Serialize> Serialize for GroupMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

//! Aggregations over fetched insight rows
//!
//! Every function here is pure: it takes rows already loaded from the store
//! and returns a freshly computed summary. Nothing is cached between calls and
//! all statistics are relative to the batch passed in.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::dates;
use crate::models::{LikelihoodIntensityRow, RelevanceLikelihoodRow};

/// Number of standard deviations from the mean beyond which a point is an outlier
pub const OUTLIER_THRESHOLD: f64 = 2.0;

pub const UNTITLED: &str = "Untitled";
pub const NO_TOPIC: &str = "No Topic";
pub const UNKNOWN: &str = "Unknown";

/// Number of records carrying a given category label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

/// Number of records added in a calendar year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearlyCount {
    pub year: i32,
    pub count: i64,
}

/// A likelihood/intensity point annotated with its outlier flag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierPoint {
    pub likelihood: i64,
    pub intensity: i64,
    pub title: String,
    pub topic: String,
    pub sector: String,
    pub pestle: String,
    pub is_outlier: bool,
}

/// Mean relevance and likelihood of one sector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorAverage {
    pub sector: String,
    pub average_relevance: f64,
    pub average_likelihood: f64,
}

/// Mean and population standard deviation of a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub mean: f64,
    pub std_dev: f64,
}

impl Spread {
    /// Compute mean and population standard deviation (divisor N)
    ///
    /// Returns `None` for an empty sample.
    pub fn of(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    /// Whether `value` lies strictly more than `OUTLIER_THRESHOLD` deviations from the mean
    pub fn is_outlier(&self, value: f64) -> bool {
        (value - self.mean).abs() > OUTLIER_THRESHOLD * self.std_dev
    }
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Round to two decimal places, halves away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Count records per category label
///
/// `None` labels are skipped. Labels are compared exactly (no case folding)
/// and the output keeps the order in which each label was first seen.
pub fn count_by_category<I, S>(labels: I) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<CategoryCount> = Vec::new();

    for label in labels.into_iter().flatten() {
        let label = label.as_ref();
        match index.get(label) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(label.to_string(), counts.len());
                counts.push(CategoryCount {
                    name: label.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts
}

/// Count records per calendar year of their timestamp
///
/// Missing and unparseable timestamps are dropped. Years come back in
/// ascending order and only years with at least one record appear.
pub fn count_by_year<I, S>(timestamps: I) -> Vec<YearlyCount>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut years: BTreeMap<i32, i64> = BTreeMap::new();

    for year in timestamps
        .into_iter()
        .flatten()
        .filter_map(|ts| dates::year_of(ts.as_ref()))
    {
        *years.entry(year).or_insert(0) += 1;
    }

    years
        .into_iter()
        .map(|(year, count)| YearlyCount { year, count })
        .collect()
}

/// Flag points whose likelihood or intensity is far from the batch mean
pub fn flag_outliers(rows: &[LikelihoodIntensityRow]) -> Vec<OutlierPoint> {
    let likelihoods: Vec<f64> = rows.iter().map(|r| r.likelihood as f64).collect();
    let intensities: Vec<f64> = rows.iter().map(|r| r.intensity as f64).collect();

    let (Some(likelihood), Some(intensity)) = (Spread::of(&likelihoods), Spread::of(&intensities))
    else {
        return Vec::new();
    };

    rows.iter()
        .map(|row| OutlierPoint {
            likelihood: row.likelihood,
            intensity: row.intensity,
            title: row.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
            topic: row.title.clone().unwrap_or_else(|| NO_TOPIC.to_string()),
            sector: row.sector.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            pestle: row.pestle.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            is_outlier: likelihood.is_outlier(row.likelihood as f64)
                || intensity.is_outlier(row.intensity as f64),
        })
        .collect()
}

/// Average relevance and likelihood per sector, rounded to two decimals
///
/// Sectors are returned in the order they first appear.
pub fn average_by_sector(rows: &[RelevanceLikelihoodRow]) -> Vec<SectorAverage> {
    struct Totals<'a> {
        sector: &'a str,
        relevance: i64,
        likelihood: i64,
        count: i64,
    }

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<Totals> = Vec::new();

    for row in rows {
        let i = *index.entry(row.sector.as_str()).or_insert_with(|| {
            totals.push(Totals {
                sector: row.sector.as_str(),
                relevance: 0,
                likelihood: 0,
                count: 0,
            });
            totals.len() - 1
        });
        let entry = &mut totals[i];
        entry.relevance += row.relevance;
        entry.likelihood += row.likelihood;
        entry.count += 1;
    }

    totals
        .into_iter()
        .map(|t| SectorAverage {
            sector: t.sector.to_string(),
            average_relevance: round2(t.relevance as f64 / t.count as f64),
            average_likelihood: round2(t.likelihood as f64 / t.count as f64),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(likelihood: i64, intensity: i64) -> LikelihoodIntensityRow {
        LikelihoodIntensityRow {
            likelihood,
            intensity,
            title: None,
            sector: None,
            pestle: None,
        }
    }

    fn sector_row(sector: &str, relevance: i64, likelihood: i64) -> RelevanceLikelihoodRow {
        RelevanceLikelihoodRow {
            relevance,
            likelihood,
            sector: sector.to_string(),
        }
    }

    // ========== Category Counter ==========

    #[test]
    fn test_count_by_category_keeps_first_seen_order() {
        let labels = vec![
            Some("Energy"),
            Some("Retail"),
            None,
            Some("Energy"),
            Some("Aerospace"),
            Some("Retail"),
            Some("Energy"),
        ];

        let counts = count_by_category(labels);

        assert_eq!(
            counts,
            vec![
                CategoryCount {
                    name: "Energy".into(),
                    count: 3
                },
                CategoryCount {
                    name: "Retail".into(),
                    count: 2
                },
                CategoryCount {
                    name: "Aerospace".into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_count_by_category_is_case_sensitive() {
        let counts = count_by_category(vec![Some("energy"), Some("Energy"), Some("Energy ")]);
        assert_eq!(counts.len(), 3);
        assert!(counts.iter().all(|c| c.count == 1));
    }

    #[test]
    fn test_count_by_category_sum_matches_non_null_labels() {
        let labels: Vec<Option<String>> = (0..50)
            .map(|i| match i % 4 {
                0 => None,
                1 => Some("Asia".to_string()),
                2 => Some("Europe".to_string()),
                _ => Some(format!("Region {}", i % 7)),
            })
            .collect();
        let non_null = labels.iter().filter(|l| l.is_some()).count() as i64;

        let counts = count_by_category(labels.iter().map(|l| l.as_deref()));

        assert_eq!(counts.iter().map(|c| c.count).sum::<i64>(), non_null);
    }

    // ========== Time-Bucketer ==========

    #[test]
    fn test_count_by_year_sorted_and_sparse() {
        let dates = vec![
            Some("2018-03-01T10:00:00"),
            Some("January, 20 2016 03:51:25"),
            None,
            Some("garbage"),
            Some("2016-07-04"),
            Some("2020-01-01T00:00:00"),
        ];

        let years = count_by_year(dates);

        assert_eq!(
            years,
            vec![
                YearlyCount {
                    year: 2016,
                    count: 2
                },
                YearlyCount {
                    year: 2018,
                    count: 1
                },
                YearlyCount {
                    year: 2020,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_count_by_year_strictly_ascending_and_sums_to_parsed() {
        let dates: Vec<Option<String>> = (0..40)
            .map(|i| {
                if i % 5 == 0 {
                    None
                } else {
                    Some(format!("{}-06-15", 2025 - (i * 7) % 11))
                }
            })
            .collect();
        let parsed = dates.iter().filter(|d| d.is_some()).count() as i64;

        let years = count_by_year(dates.iter().map(|d| d.as_deref()));

        assert!(years.windows(2).all(|w| w[0].year < w[1].year));
        assert_eq!(years.iter().map(|y| y.count).sum::<i64>(), parsed);
    }

    // ========== Outlier Detector ==========

    #[test]
    fn test_flag_outliers_identical_values_never_flag() {
        let rows = vec![point(3, 6); 5];
        let points = flag_outliers(&rows);
        assert_eq!(points.len(), 5);
        assert!(points.iter().all(|p| !p.is_outlier));
    }

    #[test]
    fn test_flag_outliers_marks_extreme_point() {
        let mut rows = vec![point(1, 1); 9];
        rows.push(point(100, 100));
        let points = flag_outliers(&rows);
        assert!(points[9].is_outlier);
        assert!(points[..9].iter().all(|p| !p.is_outlier));
    }

    #[test]
    fn test_flag_outliers_small_batch_cannot_exceed_two_deviations() {
        // With N points the largest possible |z| is sqrt(N - 1), so nothing
        // in a batch of four can sit more than two deviations out.
        let rows = vec![point(1, 1), point(1, 1), point(1, 1), point(100, 100)];
        assert!(flag_outliers(&rows).iter().all(|p| !p.is_outlier));
    }

    #[test]
    fn test_flag_outliers_single_field_is_enough() {
        // likelihood never varies, intensity spikes on the last row
        let mut rows = vec![point(2, 5); 9];
        rows.push(point(2, 500));
        let points = flag_outliers(&rows);
        assert!(points[9].is_outlier);
        assert!(points[..9].iter().all(|p| !p.is_outlier));
    }

    #[test]
    fn test_flag_outliers_symmetric_in_fields() {
        let mut rows = vec![point(1, 1); 9];
        rows.push(point(90, 1));
        let swapped: Vec<_> = rows.iter().map(|r| point(r.intensity, r.likelihood)).collect();

        let a: Vec<bool> = flag_outliers(&rows).iter().map(|p| p.is_outlier).collect();
        let b: Vec<bool> = flag_outliers(&swapped).iter().map(|p| p.is_outlier).collect();
        assert_eq!(a, b);
        assert_eq!(a.iter().filter(|&&f| f).count(), 1);
        assert!(a[9]);
    }

    #[test]
    fn test_flag_outliers_fallback_labels() {
        let rows = vec![
            LikelihoodIntensityRow {
                likelihood: 2,
                intensity: 4,
                title: Some("Shale output".into()),
                sector: Some("Energy".into()),
                pestle: Some("Economic".into()),
            },
            point(3, 5),
        ];

        let points = flag_outliers(&rows);

        assert_eq!(points[0].title, "Shale output");
        assert_eq!(points[0].topic, "Shale output");
        assert_eq!(points[0].sector, "Energy");
        assert_eq!(points[0].pestle, "Economic");
        assert_eq!(points[1].title, UNTITLED);
        assert_eq!(points[1].topic, NO_TOPIC);
        assert_eq!(points[1].sector, UNKNOWN);
        assert_eq!(points[1].pestle, UNKNOWN);
    }

    #[test]
    fn test_flag_outliers_preserves_input_order() {
        let rows = vec![point(5, 1), point(1, 5), point(3, 3)];
        let points = flag_outliers(&rows);
        let pairs: Vec<(i64, i64)> = points.iter().map(|p| (p.likelihood, p.intensity)).collect();
        assert_eq!(pairs, vec![(5, 1), (1, 5), (3, 3)]);
    }

    #[test]
    fn test_outlier_point_serializes_camel_case() {
        let json = serde_json::to_value(&flag_outliers(&[point(1, 1)])[0]).unwrap();
        assert_eq!(json["isOutlier"], false);
        assert_eq!(json["topic"], NO_TOPIC);
    }

    #[test]
    fn test_spread_uses_population_std_dev() {
        let spread = Spread::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(spread.mean, 5.0);
        assert_eq!(spread.std_dev, 2.0);
        assert!(Spread::of(&[]).is_none());
    }

    // ========== Group Averager ==========

    #[test]
    fn test_average_by_sector_single_group() {
        let rows = vec![sector_row("Energy", 4, 2), sector_row("Energy", 6, 4)];
        assert_eq!(
            average_by_sector(&rows),
            vec![SectorAverage {
                sector: "Energy".into(),
                average_relevance: 5.00,
                average_likelihood: 3.00,
            }]
        );
    }

    #[test]
    fn test_average_by_sector_rounds_to_two_places() {
        let rows = vec![
            sector_row("Retail", 1, 1),
            sector_row("Retail", 1, 2),
            sector_row("Retail", 2, 2),
            sector_row("Energy", 3, 1),
        ];

        let averages = average_by_sector(&rows);

        assert_eq!(averages[0].sector, "Retail");
        assert_eq!(averages[0].average_relevance, 1.33);
        assert_eq!(averages[0].average_likelihood, 1.67);
        assert_eq!(averages[1].sector, "Energy");
        assert_eq!(averages[1].average_relevance, 3.0);
    }

    #[test]
    fn test_round2_half_rounds_up() {
        assert_eq!(round2(1.125), 1.13);
        assert_eq!(round2(2.5), 2.5);
        assert_eq!(round2(7.0 / 8.0), 0.88);
    }

    // ========== Shared properties ==========

    #[test]
    fn test_empty_inputs_yield_empty_outputs() {
        assert!(count_by_category(Vec::<Option<&str>>::new()).is_empty());
        assert!(count_by_year(Vec::<Option<&str>>::new()).is_empty());
        assert!(flag_outliers(&[]).is_empty());
        assert!(average_by_sector(&[]).is_empty());
    }

    #[test]
    fn test_aggregations_are_idempotent() {
        let labels = vec![Some("b"), Some("a"), Some("b")];
        assert_eq!(
            count_by_category(labels.clone()),
            count_by_category(labels)
        );

        let rows = vec![point(1, 9), point(4, 2), point(7, 7), point(10, 1)];
        assert_eq!(flag_outliers(&rows), flag_outliers(&rows));

        let sectors = vec![sector_row("x", 1, 3), sector_row("y", 2, 2)];
        let first = average_by_sector(&sectors);
        let second = average_by_sector(&sectors);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.average_relevance.to_bits(), b.average_relevance.to_bits());
            assert_eq!(a.average_likelihood.to_bits(), b.average_likelihood.to_bits());
        }
    }
}

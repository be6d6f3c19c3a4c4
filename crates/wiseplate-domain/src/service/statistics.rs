//! Waste statistics model and report rendering

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use wiseplate_types::{FoodCategory, Result, WasteStatus};

/// Wasted / not-wasted tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasteCounts {
    pub wasted: u64,
    pub not_wasted: u64,
}

impl WasteCounts {
    pub fn total(&self) -> u64 {
        self.wasted + self.not_wasted
    }

    /// Percentage of wasted items, `None` when nothing was counted
    pub fn wasted_percent(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.wasted as f64 / total as f64 * 100.0)
    }

    pub fn not_wasted_percent(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.not_wasted as f64 / total as f64 * 100.0)
    }

    /// Add `n` items with the given status; unknown status is ignored
    pub fn add(&mut self, status: WasteStatus, n: u64) {
        match status {
            WasteStatus::Wasted => self.wasted += n,
            WasteStatus::NotWasted => self.not_wasted += n,
            WasteStatus::Unknown => {}
        }
    }
}

impl std::ops::AddAssign for WasteCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.wasted += rhs.wasted;
        self.not_wasted += rhs.not_wasted;
    }
}

/// Counts for one category, broken down by sub-type name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatistics {
    pub category: FoodCategory,
    pub total: WasteCounts,
    pub types: BTreeMap<String, WasteCounts>,
}

impl CategoryStatistics {
    pub fn new(category: FoodCategory) -> Self {
        Self {
            category,
            total: WasteCounts::default(),
            types: BTreeMap::new(),
        }
    }

    /// Register a sub-type so it appears even with zero counts
    pub fn ensure_type(&mut self, sub_type: &str) -> &mut WasteCounts {
        self.types.entry(sub_type.to_string()).or_default()
    }

    /// Count items for a sub-type and roll them into the category total
    pub fn add(&mut self, sub_type: &str, status: WasteStatus, n: u64) {
        self.ensure_type(sub_type).add(status, n);
        self.total.add(status, n);
    }
}

/// Waste statistics for all categories, in fixed category order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteStatistics {
    pub categories: Vec<CategoryStatistics>,
}

impl Default for WasteStatistics {
    fn default() -> Self {
        Self {
            categories: FoodCategory::ALL
                .into_iter()
                .map(CategoryStatistics::new)
                .collect(),
        }
    }
}

impl WasteStatistics {
    pub fn category(&self, category: FoodCategory) -> &CategoryStatistics {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .unwrap_or(&self.categories[0])
    }

    pub fn category_mut(&mut self, category: FoodCategory) -> &mut CategoryStatistics {
        let index = FoodCategory::ALL
            .iter()
            .position(|c| *c == category)
            .unwrap_or_default();
        &mut self.categories[index]
    }

    /// Sum across all categories
    pub fn grand_total(&self) -> WasteCounts {
        let mut total = WasteCounts::default();
        for c in &self.categories {
            total += c.total;
        }
        total
    }
}

/// Anything that can produce waste statistics
///
/// Implemented by the output-tree walker and the record-store aggregator so
/// the report does not depend on which one is used.
pub trait StatisticsSource {
    /// Short name for log lines and report headers
    fn name(&self) -> &'static str;

    fn collect(&self) -> Result<WasteStatistics>;
}

/// Render the human-readable waste report
pub fn generate_waste_report(
    stats: &WasteStatistics,
    analysis_date: Option<NaiveDate>,
    generated_at: DateTime<Utc>,
) -> String {
    let rule = "=".repeat(50);
    let mut report = String::new();
    report.push('\n');
    report.push_str(&rule);
    report.push('\n');
    report.push_str("İSTATİSTİK RAPORU / Waste Statistics Report\n");
    report.push_str(&format!(
        "Tarih/Saat (UTC): {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    if let Some(date) = analysis_date {
        report.push_str(&format!("Analiz Tarihi: {}\n", date));
    }
    report.push_str(&rule);
    report.push('\n');

    for category in &stats.categories {
        let total = category.total.total();
        if total == 0 {
            continue;
        }

        report.push_str(&format!(
            "\n{} ÖZET / Summary:\n",
            category.category.label().to_uppercase()
        ));
        push_counts(&mut report, "", &category.total);

        report.push_str("\nTür bazında dağılım / By type:\n");
        for (name, counts) in &category.types {
            if counts.total() == 0 {
                continue;
            }
            report.push_str(&format!("\n{}:\n", name));
            push_counts(&mut report, "  ", counts);
        }
    }

    report.push('\n');
    report.push_str(&rule);
    report.push('\n');
    report
}

fn push_counts(report: &mut String, indent: &str, counts: &WasteCounts) {
    report.push_str(&format!("{}Toplam: {} örnek\n", indent, counts.total()));
    report.push_str(&format!(
        "{}İsraf Var: {} ({:.1}%)\n",
        indent,
        counts.wasted,
        counts.wasted_percent().unwrap_or(0.0)
    ));
    report.push_str(&format!(
        "{}İsraf Yok: {} ({:.1}%)\n",
        indent,
        counts.not_wasted,
        counts.not_wasted_percent().unwrap_or(0.0)
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> WasteStatistics {
        let mut stats = WasteStatistics::default();
        let soup = stats.category_mut(FoodCategory::Soup);
        soup.add("tarhana-corbasi", WasteStatus::NotWasted, 3);
        soup.add("tarhana-corbasi", WasteStatus::Wasted, 1);
        soup.add("mercimek-corbasi", WasteStatus::Wasted, 4);
        stats
            .category_mut(FoodCategory::SideDish)
            .ensure_type("eriste");
        stats
    }

    #[test]
    fn test_rollup() {
        let stats = sample();
        let soup = stats.category(FoodCategory::Soup);
        assert_eq!(soup.total, WasteCounts { wasted: 5, not_wasted: 3 });
        assert_eq!(soup.types["tarhana-corbasi"].total(), 4);
        assert_eq!(stats.grand_total().total(), 8);
    }

    #[test]
    fn test_unknown_status_not_counted() {
        let mut counts = WasteCounts::default();
        counts.add(WasteStatus::Unknown, 3);
        assert_eq!(counts.total(), 0);
        assert_eq!(counts.wasted_percent(), None);
    }

    #[test]
    fn test_report_omits_empty_categories() {
        let generated = Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 6);
        let report = generate_waste_report(&sample(), date, generated);

        assert!(report.contains("Tarih/Saat (UTC): 2024-05-06 12:00:00"));
        assert!(report.contains("Analiz Tarihi: 2024-05-06"));
        assert!(report.contains("CORBA ÖZET"));
        assert!(report.contains("Toplam: 8 örnek"));
        assert!(report.contains("İsraf Var: 5 (62.5%)"));
        assert!(report.contains("İsraf Yok: 3 (37.5%)"));
        assert!(report.contains("  İsraf Yok: 3 (75.0%)"));
        assert!(!report.contains("YAN-YEMEK"));
        assert!(!report.contains("eriste"));
    }

    #[test]
    fn test_statistics_serialize() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"corba\""));
        assert!(json.contains("\"mercimek-corbasi\""));
    }
}

//! Human-readable reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use uuid::Uuid;

use ft_engine::ClockStatistics;
use ft_types::{ClockReportEntry, ParameterSet};

const RULE_WIDTH: usize = 86;

/// Fixed-width `Min/Max/Avg/Med` table, one row per clock in name order.
pub fn render_statistics(stats: &BTreeMap<String, ClockStatistics>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(
        out,
        "{:50} {:>8} {:>8} {:>8} {:>8}",
        "Clk", "Min", "Max", "Avg", "Med"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for (clock, s) in stats {
        let _ = writeln!(
            out,
            "{:50} {:8.2} {:8.2} {:8.2} {:8.2}",
            clock, s.min, s.max, s.mean, s.median
        );
    }
    out
}

/// Everything worth recording about a finished optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub run_id: Uuid,
    pub finished_at: DateTime<Utc>,
    pub target_mhz: f64,
    pub score: f64,
    pub evaluations: usize,
    pub parameters: ParameterSet,
    pub clocks: Vec<ClockReportEntry>,
}

impl OptimizationReport {
    /// Report as plain lines, suitable both for the terminal and as the
    /// comment block of the persisted arguments.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "fmaxtune run {} finished {}",
                self.run_id,
                self.finished_at.to_rfc3339()
            ),
            format!(
                "best score {:.2} after {} evaluations (target {:.2} MHz)",
                self.score, self.evaluations, self.target_mhz
            ),
            format!("parameters: {}", self.parameters),
            String::new(),
            format!("{:50} {:>8} {:>8} {:>8}", "Clk", "Freq", "Target", "Tracked"),
            "-".repeat(77),
        ];
        for entry in &self.clocks {
            let (target, tracked) = if entry.tracked {
                (format!("{:8.2}", self.target_mhz), "yes")
            } else {
                (format!("{:>8}", "-"), "no")
            };
            lines.push(format!(
                "{:50} {:8.2} {} {:>8}",
                entry.clock, entry.frequency_mhz, target, tracked
            ));
        }
        lines
    }
}

/// Achieved frequencies of a single trial.
pub fn render_frequencies(entries: &[ClockReportEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{:50} {:8.2} MHz", entry.clock, entry.frequency_mhz);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_types::SearchSpace;

    #[test]
    fn statistics_table_is_sorted_and_two_decimal() {
        let mut stats = BTreeMap::new();
        stats.insert(
            "pix_clk".to_string(),
            ClockStatistics::from_samples(&[90.0, 95.0]).unwrap(),
        );
        stats.insert(
            "clk$glb_clk".to_string(),
            ClockStatistics::from_samples(&[100.0, 105.0, 110.0]).unwrap(),
        );

        let table = render_statistics(&stats);
        let rows: Vec<&str> = table.lines().skip(3).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("clk$glb_clk"));
        assert!(rows[0].ends_with("  100.00   110.00   105.00   105.00"));
        assert!(rows[1].starts_with("pix_clk"));
        assert!(rows[1].contains("92.50"));
    }

    #[test]
    fn report_marks_untracked_clocks() {
        let report = OptimizationReport {
            run_id: Uuid::new_v4(),
            finished_at: Utc::now(),
            target_mhz: 130.0,
            score: -40.0,
            evaluations: 24,
            parameters: SearchSpace::default().default_parameters().unwrap(),
            clocks: vec![
                ClockReportEntry {
                    clock: "A".into(),
                    frequency_mhz: 140.0,
                    tracked: true,
                },
                ClockReportEntry {
                    clock: "aux".into(),
                    frequency_mhz: 40.0,
                    tracked: false,
                },
            ],
        };

        let lines = report.lines();
        assert!(lines[1].contains("-40.00"));
        assert!(lines[2].contains("critexp=3"));
        let a = lines.iter().find(|l| l.starts_with("A ")).unwrap();
        assert!(a.contains("140.00") && a.contains("130.00") && a.ends_with("yes"));
        let aux = lines.iter().find(|l| l.starts_with("aux")).unwrap();
        assert!(aux.ends_with("no"));
    }
}

use std::collections::BTreeMap;

/// Achieved frequency in MHz per clock name for one trial.
pub type ClockFrequencyMap = BTreeMap<String, f64>;

/// One row of a per-clock report: what a clock achieved and whether it
/// counted toward the optimization objective.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClockReportEntry {
    pub clock: String,
    pub frequency_mhz: f64,
    pub tracked: bool,
}

/// Build report rows for every clock in `freqs`, in clock-name order.
pub fn clock_report(freqs: &ClockFrequencyMap, tracked: &[String]) -> Vec<ClockReportEntry> {
    freqs
        .iter()
        .map(|(clock, freq)| ClockReportEntry {
            clock: clock.clone(),
            frequency_mhz: *freq,
            tracked: tracked.iter().any(|t| t == clock),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_marks_tracked_clocks() {
        let mut freqs = ClockFrequencyMap::new();
        freqs.insert("pix_clk".to_string(), 95.5);
        freqs.insert("clk$glb_clk".to_string(), 131.2);

        let rows = clock_report(&freqs, &["clk$glb_clk".to_string()]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].clock, "clk$glb_clk");
        assert!(rows[0].tracked);
        assert!(!rows[1].tracked);
    }
}

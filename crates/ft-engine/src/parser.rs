//! Timing extraction from place-and-route log output.
//!
//! nextpnr reports `Max frequency for clock '<name>': <f> MHz` once after
//! placement and once after routing, for every clock. All pre-routing lines
//! come before any post-routing line, so the post-routing figures are simply
//! the second half of the matching lines.

use ft_types::{ClockFrequencyMap, ParseError};

/// Phrase identifying a clock frequency diagnostic.
pub const CLOCK_LINE_MARKER: &str = ": Max frequency for clock";

/// Extract post-routing clock frequencies from one trial's output.
///
/// With `filter`, clocks outside it are dropped; filtered clocks that never
/// appear are simply absent.
pub fn parse_clock_frequencies<S: AsRef<str>>(
    lines: &[S],
    filter: Option<&[String]>,
) -> Result<ClockFrequencyMap, ParseError> {
    let matches: Vec<&str> = lines
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| l.contains(CLOCK_LINE_MARKER))
        .collect();

    if matches.len() % 2 != 0 {
        return Err(ParseError::OddMatchCount {
            count: matches.len(),
        });
    }

    let mut freqs = ClockFrequencyMap::new();
    for line in &matches[matches.len() / 2..] {
        let (clock, freq) = parse_clock_line(line)?;
        let wanted = filter.map_or(true, |f| f.iter().any(|c| *c == clock));
        if wanted {
            freqs.insert(clock, freq);
        }
    }

    Ok(freqs)
}

/// Split one diagnostic line into clock name and frequency.
pub fn parse_clock_line(line: &str) -> Result<(String, f64), ParseError> {
    let quoted: Vec<&str> = line.split('\'').collect();
    if quoted.len() != 3 {
        return Err(ParseError::MissingQuotedName {
            line: line.to_string(),
        });
    }
    let clock = quoted[1].to_string();

    let fields: Vec<&str> = line.split(':').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(ParseError::BadFieldCount {
            line: line.to_string(),
        });
    }

    let mut tokens = fields[2].split_whitespace();
    let value = tokens.next().unwrap_or_default();
    let unit = tokens.next().unwrap_or_default();
    if unit != "MHz" {
        return Err(ParseError::BadUnit {
            unit: unit.to_string(),
            line: line.to_string(),
        });
    }

    let freq = value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .ok_or_else(|| ParseError::BadFrequency {
            value: value.to_string(),
            line: line.to_string(),
        })?;

    Ok((clock, freq))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_line(name: &str, freq: &str) -> String {
        format!("Info: Max frequency for clock '{name}': {freq} MHz (PASS at 12.00 MHz)")
    }

    #[test]
    fn keeps_second_occurrence_per_clock() {
        let lines = vec![
            "Info: Packing constants..".to_string(),
            clock_line("clk$glb_clk", "140.11"),
            clock_line("pix_clk", "90.00"),
            "Info: Routing..".to_string(),
            "Info: Max delay <async> -> posedge clk: 2.3 ns".to_string(),
            clock_line("pix_clk", "95.42"),
            clock_line("clk$glb_clk", "131.20"),
        ];

        let freqs = parse_clock_frequencies(&lines, None).unwrap();
        assert_eq!(freqs.len(), 2);
        assert_eq!(freqs["clk$glb_clk"], 131.20);
        assert_eq!(freqs["pix_clk"], 95.42);
    }

    #[test]
    fn interleaving_never_changes_result() {
        let names = ["a", "b", "c"];
        let pre: Vec<String> = names.iter().map(|n| clock_line(n, "1.0")).collect();
        let orders = [[0, 1, 2], [2, 0, 1], [1, 2, 0]];

        for order in orders {
            let mut lines = pre.clone();
            for &i in &order {
                lines.push(clock_line(names[i], &format!("{}.5", 100 + i)));
            }
            let freqs = parse_clock_frequencies(&lines, None).unwrap();
            assert_eq!(freqs.len(), 3);
            for (i, name) in names.iter().enumerate() {
                assert_eq!(freqs[*name], 100.5 + i as f64);
            }
        }
    }

    #[test]
    fn odd_match_count_is_rejected() {
        let lines = vec![
            clock_line("a", "10.0"),
            clock_line("b", "20.0"),
            clock_line("a", "11.0"),
        ];
        assert_eq!(
            parse_clock_frequencies(&lines, None),
            Err(ParseError::OddMatchCount { count: 3 })
        );
    }

    #[test]
    fn filter_drops_untracked_and_tolerates_missing() {
        let lines = vec![
            clock_line("a", "10.0"),
            clock_line("b", "20.0"),
            clock_line("a", "11.0"),
            clock_line("b", "21.0"),
        ];
        let filter = vec!["b".to_string(), "never_seen".to_string()];
        let freqs = parse_clock_frequencies(&lines, Some(&filter)).unwrap();
        assert_eq!(freqs.len(), 1);
        assert_eq!(freqs["b"], 21.0);
    }

    #[test]
    fn no_clock_lines_yields_empty_map() {
        let lines = vec!["Info: nothing to see".to_string()];
        assert!(parse_clock_frequencies(&lines, None).unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(matches!(
            parse_clock_line("Info: Max frequency for clock clk: 10.0 MHz"),
            Err(ParseError::MissingQuotedName { .. })
        ));
        assert!(matches!(
            parse_clock_line("Info: Max frequency for clock 'clk' 10.0 MHz"),
            Err(ParseError::BadFieldCount { .. })
        ));
        assert!(matches!(
            parse_clock_line("Info: Max frequency for clock 'clk': fast MHz"),
            Err(ParseError::BadFrequency { .. })
        ));
        assert!(matches!(
            parse_clock_line("Info: Max frequency for clock 'clk': 10.0 kHz"),
            Err(ParseError::BadUnit { .. })
        ));
        assert!(matches!(
            parse_clock_line("Info: Max frequency for clock 'clk': 10.0"),
            Err(ParseError::BadUnit { .. })
        ));
    }

    #[test]
    fn malformed_post_routing_line_fails_whole_parse() {
        let lines = vec![
            clock_line("a", "10.0"),
            "Info: Max frequency for clock 'a': ?? MHz".to_string(),
        ];
        assert!(parse_clock_frequencies(&lines, None).is_err());
    }
}

//! Extracts the stage table from successful simulator output.

use crate::model::EvolutionRecord;
use regex::Regex;
use std::sync::OnceLock;

/// `<stage label> Time <number> Mass <number>`; the label ends on a word boundary.
const STAGE_PATTERN: &str = r"(.+\b)\s+Time\s+([\d.]+)\s+Mass\s+([\d.]+)";

static STAGE_RE: OnceLock<Regex> = OnceLock::new();

fn stage_regex() -> &'static Regex {
    STAGE_RE.get_or_init(|| Regex::new(STAGE_PATTERN).expect("STAGE_PATTERN is a valid regex"))
}

/// Every stage line in `raw`, in order of appearance.
///
/// No matches is a valid result; deciding whether that is a problem is up to
/// the caller. Lines whose numbers do not parse (e.g. `1.2.3`) are skipped.
pub fn parse_records(raw: &str) -> Vec<EvolutionRecord> {
    stage_regex()
        .captures_iter(raw)
        .filter_map(|caps| {
            let stage = caps[1].trim();
            let time = caps[2].parse::<f64>();
            let mass = caps[3].parse::<f64>();
            match (time, mass) {
                (Ok(time), Ok(mass)) => Some(EvolutionRecord {
                    stage: stage.to_string(),
                    time,
                    mass,
                    time_text: caps[2].to_string(),
                    mass_text: caps[3].to_string(),
                }),
                _ => {
                    tracing::warn!(line = &caps[0], "skipping stage line with malformed numbers");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Main sequence Star            Time        0.0 Mass   5.000
Hertzsprung Gap               Time       87.8 Mass   5.000
Core Helium Burning           Time       88.3 Mass   4.999
First AGB                     Time       98.8 Mass   4.961
Second AGB                    Time       99.2 Mass   4.935
Carbon/Oxygen WD              Time      100.1 Mass   1.200
Carbon/Oxygen WD              Time    12000.0 Mass   1.200
";

    fn rec(stage: &str, time: &str, mass: &str) -> EvolutionRecord {
        EvolutionRecord {
            stage: stage.into(),
            time: time.parse().unwrap(),
            mass: mass.parse().unwrap(),
            time_text: time.into(),
            mass_text: mass.into(),
        }
    }

    #[test]
    fn parses_reference_sample_in_order() {
        let records = parse_records(SAMPLE);
        assert_eq!(records.len(), 7);
        assert_eq!(records[0], rec("Main sequence Star", "0.0", "5.000"));
        assert_eq!(records[2], rec("Core Helium Burning", "88.3", "4.999"));
        assert_eq!(records[6], rec("Carbon/Oxygen WD", "12000.0", "1.200"));
        let stages: Vec<&str> = records.iter().map(|r| r.stage.as_str()).collect();
        assert_eq!(
            stages,
            [
                "Main sequence Star",
                "Hertzsprung Gap",
                "Core Helium Burning",
                "First AGB",
                "Second AGB",
                "Carbon/Oxygen WD",
                "Carbon/Oxygen WD",
            ]
        );
    }

    #[test]
    fn ignores_surrounding_noise_and_indentation() {
        let raw = " SSE v1\n   Naked Helium Star MS   Time  1.5 Mass 0.9\nsome footer\n";
        assert_eq!(parse_records(raw), vec![rec("Naked Helium Star MS", "1.5", "0.9")]);
    }

    #[test]
    fn no_matches_is_empty_not_an_error() {
        assert!(parse_records("").is_empty());
        assert!(parse_records("nothing to see here\n").is_empty());
    }

    #[test]
    fn malformed_numbers_are_skipped() {
        let raw = "Bad Stage   Time 1.2.3 Mass 1.0\nGood Stage  Time 2.0 Mass 1.0\n";
        assert_eq!(parse_records(raw), vec![rec("Good Stage", "2.0", "1.0")]);
    }

    #[test]
    fn printed_precision_is_kept() {
        let records = parse_records("Hertzsprung Gap   Time 87.8123 Mass 4.99912\n");
        assert_eq!(records, vec![rec("Hertzsprung Gap", "87.8123", "4.99912")]);
        assert_eq!(records[0].time, 87.8123);
    }
}

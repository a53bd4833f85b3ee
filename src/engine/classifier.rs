/// Marker the shipped SSE build prints when EVOLV1 gives up.
pub const DEFAULT_SENTINEL: &str = "ERROR";

pub const FAILURE_REASON: &str = "An error occurred in EVOLV1; try using different parameters";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    Failure { sentinel: String, reason: String },
}

/// Decides success or failure from raw simulator output.
///
/// Exact, case-sensitive substring search; any configured sentinel anywhere in
/// the text means failure, whatever else the text contains.
#[derive(Debug, Clone)]
pub struct OutputClassifier {
    sentinels: Vec<String>,
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::new(vec![DEFAULT_SENTINEL.to_string()])
    }
}

impl OutputClassifier {
    /// An empty list falls back to the default sentinel. Repeats are dropped,
    /// keeping the first occurrence.
    pub fn new(sentinels: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(sentinels.len());
        for s in sentinels {
            if !s.is_empty() && !unique.contains(&s) {
                unique.push(s);
            }
        }
        if unique.is_empty() {
            unique.push(DEFAULT_SENTINEL.to_string());
        }
        Self { sentinels: unique }
    }

    /// The default sentinel followed by `extra`. Extra markers never replace it.
    pub fn with_extra(extra: impl IntoIterator<Item = String>) -> Self {
        Self::new(
            std::iter::once(DEFAULT_SENTINEL.to_string())
                .chain(extra)
                .collect(),
        )
    }

    /// First configured sentinel; used to mark synthetic failures.
    pub fn primary_sentinel(&self) -> &str {
        &self.sentinels[0]
    }

    pub fn sentinels(&self) -> &[String] {
        &self.sentinels
    }

    pub fn classify(&self, raw: &str) -> Classification {
        match self.sentinels.iter().find(|s| raw.contains(s.as_str())) {
            Some(sentinel) => Classification::Failure {
                sentinel: sentinel.clone(),
                reason: FAILURE_REASON.to_string(),
            },
            None => Classification::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "Main sequence Star   Time 0.0 Mass 5.000\n";

    #[test]
    fn sentinel_anywhere_means_failure() {
        let c = OutputClassifier::default();
        let raw = format!("{GOOD} EVOLV1 ERROR: timestep too small\n{GOOD}");
        assert!(matches!(c.classify(&raw), Classification::Failure { .. }));
    }

    #[test]
    fn no_sentinel_means_success() {
        let c = OutputClassifier::default();
        assert_eq!(c.classify(GOOD), Classification::Success);
        assert_eq!(c.classify(""), Classification::Success);
    }

    #[test]
    fn match_is_case_sensitive() {
        let c = OutputClassifier::default();
        assert_eq!(c.classify("error in lower case\n"), Classification::Success);
    }

    #[test]
    fn several_sentinels_can_be_configured() {
        let c = OutputClassifier::new(vec!["ERROR".into(), "STOP".into()]);
        match c.classify("STOP 0 in EVOLV1\n") {
            Classification::Failure { sentinel, reason } => {
                assert_eq!(sentinel, "STOP");
                assert_eq!(reason, FAILURE_REASON);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn extra_sentinels_keep_the_default() {
        let c = OutputClassifier::with_extra(vec!["STOP".into(), "ERROR".into(), "STOP".into()]);
        assert_eq!(c.sentinels(), ["ERROR".to_string(), "STOP".to_string()]);
        assert!(matches!(
            c.classify(" ERROR: EVOLV1 failed\n"),
            Classification::Failure { .. }
        ));
    }

    #[test]
    fn repeats_are_dropped_even_when_not_adjacent() {
        let c = OutputClassifier::new(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(c.sentinels(), ["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn empty_configuration_falls_back_to_default() {
        let c = OutputClassifier::new(vec![String::new()]);
        assert_eq!(c.sentinels(), ["ERROR".to_string()]);
        assert_eq!(c.primary_sentinel(), "ERROR");
    }

    #[test]
    fn classification_is_deterministic() {
        let c = OutputClassifier::default();
        for raw in [GOOD, "ERROR", "xxERRORxx", "\n\n"] {
            assert_eq!(c.classify(raw), c.classify(raw));
        }
    }
}

//! Post-hoc source attribution.
//!
//! Decides which retrieved passages plausibly contributed to a generated
//! answer. The default [`LexicalOverlapAttributor`] is a coarse lexical
//! proxy: it counts how many of a passage's long words also occur in the
//! answer. It does not check entailment, so paraphrased use is missed and
//! passages that merely share vocabulary with the answer are cited.

use crate::types::CandidatePassage;
use roleflow_core::config::AttributionConfig;

/// Top-1 result of a per-department similarity search.
#[derive(Debug, Clone)]
pub struct ProbeHit {
    /// Department whose index was searched
    pub department: String,
    pub candidate: CandidatePassage,
}

impl ProbeHit {
    pub fn new(department: impl Into<String>, candidate: CandidatePassage) -> Self {
        Self {
            department: department.into(),
            candidate,
        }
    }
}

/// Supplies per-department top-1 hits, in scope order, for the fallback.
///
/// Only invoked when the primary heuristic cites nothing.
pub trait SimilarityProbe {
    fn top_hits(&self) -> Vec<ProbeHit>;
}

/// Chooses the source files to cite for an answer.
pub trait SourceAttributor: Send + Sync {
    /// Ordered, duplicate-free source file names.
    fn attribute(
        &self,
        candidates: &[CandidatePassage],
        answer: &str,
        probe: &dyn SimilarityProbe,
    ) -> Vec<String>;
}

/// Word-overlap attribution with a distance-gated fallback.
#[derive(Debug, Clone)]
pub struct LexicalOverlapAttributor {
    min_word_len: usize,
    overlap_threshold: f64,
    distance_threshold: f32,
    max_fallback_sources: usize,
}

impl LexicalOverlapAttributor {
    pub fn from_config(config: &AttributionConfig) -> Self {
        Self {
            min_word_len: config.min_word_len,
            overlap_threshold: config.overlap_threshold,
            distance_threshold: config.distance_threshold,
            max_fallback_sources: config.max_fallback_sources,
        }
    }

    /// Share of the passage's long words that occur in the answer.
    ///
    /// `None` when the passage has no word longer than `min_word_len`.
    pub fn overlap(&self, content: &str, answer_lower: &str) -> Option<f64> {
        let content = content.to_lowercase();
        let words: Vec<&str> = content
            .split_whitespace()
            .filter(|w| w.chars().count() > self.min_word_len)
            .collect();

        if words.is_empty() {
            return None;
        }

        let matches = words.iter().filter(|w| answer_lower.contains(*w)).count();
        Some(matches as f64 / words.len() as f64)
    }

    fn primary(&self, candidates: &[CandidatePassage], answer: &str) -> Vec<String> {
        let answer_lower = answer.to_lowercase();
        let mut sources = Vec::new();

        for candidate in candidates {
            let used = self
                .overlap(candidate.content(), &answer_lower)
                .is_some_and(|share| share > self.overlap_threshold);
            if used {
                push_unique(&mut sources, candidate.source_file());
            }
        }

        sources
    }

    fn fallback(&self, probe: &dyn SimilarityProbe) -> Vec<String> {
        let mut sources = Vec::new();
        if self.max_fallback_sources == 0 {
            return sources;
        }

        for hit in probe.top_hits() {
            if hit.candidate.department() != hit.department
                || hit.candidate.distance >= self.distance_threshold
            {
                continue;
            }

            push_unique(&mut sources, hit.candidate.source_file());
            if sources.len() >= self.max_fallback_sources {
                break;
            }
        }

        sources
    }
}

impl Default for LexicalOverlapAttributor {
    fn default() -> Self {
        Self::from_config(&AttributionConfig::default())
    }
}

impl SourceAttributor for LexicalOverlapAttributor {
    fn attribute(
        &self,
        candidates: &[CandidatePassage],
        answer: &str,
        probe: &dyn SimilarityProbe,
    ) -> Vec<String> {
        let sources = self.primary(candidates, answer);
        if !sources.is_empty() {
            return sources;
        }

        let sources = self.fallback(probe);
        tracing::debug!("No lexical overlap; fallback cited {} sources", sources.len());
        sources
    }
}

fn push_unique(sources: &mut Vec<String>, source: &str) {
    if !sources.iter().any(|s| s == source) {
        sources.push(source.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileType, PassageChunk};
    use std::cell::Cell;

    fn candidate(content: &str, department: &str, source: &str, distance: f32) -> CandidatePassage {
        let chunk = PassageChunk::new(
            content,
            department,
            source,
            FileType::Text,
            format!("data/{}/{}", department, source),
        );
        CandidatePassage::new(chunk, distance)
    }

    struct FixedProbe {
        hits: Vec<ProbeHit>,
        calls: Cell<usize>,
    }

    impl FixedProbe {
        fn new(hits: Vec<ProbeHit>) -> Self {
            Self {
                hits,
                calls: Cell::new(0),
            }
        }
    }

    impl SimilarityProbe for FixedProbe {
        fn top_hits(&self) -> Vec<ProbeHit> {
            self.calls.set(self.calls.get() + 1);
            self.hits.clone()
        }
    }

    // Five long words: alpha1 bravo2 charl3 delta4 echo55
    const FIVE_WORDS: &str = "alpha1 bravo2 charl3 delta4 echo55 a an the";

    #[test]
    fn test_overlap_counts_only_long_words() {
        let attributor = LexicalOverlapAttributor::default();
        // "four" and "tiny" have four characters and are ignored
        let share = attributor.overlap("four tiny revenue growth", "revenue fell");
        assert_eq!(share, Some(0.5));
        assert_eq!(attributor.overlap("a b tiny", "anything"), None);
    }

    #[test]
    fn test_exactly_twenty_percent_is_excluded() {
        let attributor = LexicalOverlapAttributor::default();
        let probe = FixedProbe::new(vec![]);
        let passages = vec![candidate(FIVE_WORDS, "finance", "q3.md", 0.1)];

        // 1 of 5 long words
        let sources = attributor.attribute(&passages, "We saw ALPHA1 only.", &probe);
        assert!(sources.is_empty());
    }

    #[test]
    fn test_above_threshold_is_included() {
        let attributor = LexicalOverlapAttributor::default();
        let probe = FixedProbe::new(vec![]);
        let passages = vec![candidate(FIVE_WORDS, "finance", "q3.md", 0.1)];

        // 2 of 5 long words
        let sources = attributor.attribute(&passages, "alpha1 and bravo2", &probe);
        assert_eq!(sources, vec!["q3.md"]);
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn test_substring_matches_count() {
        let attributor = LexicalOverlapAttributor::default();
        let probe = FixedProbe::new(vec![]);
        let passages = vec![candidate("budget", "finance", "budget.md", 0.1)];

        let sources = attributor.attribute(&passages, "The budgets were cut.", &probe);
        assert_eq!(sources, vec!["budget.md"]);
    }

    #[test]
    fn test_sources_keep_first_acceptance_order_without_duplicates() {
        let attributor = LexicalOverlapAttributor::default();
        let probe = FixedProbe::new(vec![]);
        let passages = vec![
            candidate("marketing campaign launch", "marketing", "plan.md", 0.3),
            candidate("quarterly revenue", "finance", "q3.md", 0.1),
            candidate("campaign launch budget", "marketing", "plan.md", 0.4),
        ];

        let answer = "The campaign launch follows quarterly revenue targets.";
        let sources = attributor.attribute(&passages, answer, &probe);
        assert_eq!(sources, vec!["plan.md", "q3.md"]);
    }

    #[test]
    fn test_fallback_caps_at_two_in_scope_order() {
        let attributor = LexicalOverlapAttributor::default();
        let probe = FixedProbe::new(vec![
            ProbeHit::new("engineering", candidate("x", "engineering", "arch.md", 0.2)),
            ProbeHit::new("finance", candidate("y", "finance", "q3.md", 0.5)),
            ProbeHit::new("hr", candidate("z", "hr", "leave.md", 0.1)),
        ]);

        let sources = attributor.attribute(&[], "unrelated answer", &probe);
        assert_eq!(sources, vec!["arch.md", "q3.md"]);
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn test_fallback_requires_distance_below_threshold() {
        let attributor = LexicalOverlapAttributor::default();
        let probe = FixedProbe::new(vec![
            ProbeHit::new("finance", candidate("y", "finance", "q3.md", 0.7)),
            ProbeHit::new("general", candidate("z", "general", "handbook.md", 1.4)),
        ]);

        let sources = attributor.attribute(&[], "unrelated answer", &probe);
        assert!(sources.is_empty());
    }

    #[test]
    fn test_fallback_rejects_mistagged_hits() {
        let attributor = LexicalOverlapAttributor::default();
        let probe = FixedProbe::new(vec![
            ProbeHit::new("finance", candidate("salary bands", "hr", "salaries.csv", 0.05)),
            ProbeHit::new("general", candidate("z", "general", "handbook.md", 0.3)),
        ]);

        let sources = attributor.attribute(&[], "unrelated answer", &probe);
        assert_eq!(sources, vec!["handbook.md"]);
    }

    #[test]
    fn test_fallback_distinct_sources_only() {
        let attributor = LexicalOverlapAttributor::default();
        let probe = FixedProbe::new(vec![
            ProbeHit::new("finance", candidate("a", "finance", "shared.md", 0.1)),
            ProbeHit::new("general", candidate("b", "general", "shared.md", 0.1)),
            ProbeHit::new("hr", candidate("c", "hr", "leave.md", 0.1)),
        ]);

        let sources = attributor.attribute(&[], "unrelated answer", &probe);
        assert_eq!(sources, vec!["shared.md", "leave.md"]);
    }
}

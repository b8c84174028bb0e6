//! Interview plan: which domains to cover, in what order, and at which difficulty.
//!
//! Pure functions only. The same summary and question count always give the same plan,
//! so a plan lost from a persisted state can be rebuilt exactly.

use serde::{Deserialize, Serialize};

use crate::models::domain::{Difficulty, Domain};
use crate::models::resume::ResumeSummary;

pub const MAX_PLANNED_DOMAINS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewPlan {
    pub domains: Vec<Domain>,
    pub difficulty_sequence: Vec<Difficulty>,
}

/// Recommended domains first (already ranked by relevance), then any key strength that
/// names a domain. Deduplicated and capped; the default triple when nothing qualifies.
pub fn build_plan(summary: &ResumeSummary, total_questions: usize) -> InterviewPlan {
    let mut domains: Vec<Domain> = Vec::new();
    let candidates = summary.recommended_domains.iter().copied().chain(
        summary
            .key_strengths
            .iter()
            .filter_map(|strength| Domain::parse(strength)),
    );
    for domain in candidates {
        if domains.len() == MAX_PLANNED_DOMAINS {
            break;
        }
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    if domains.is_empty() {
        domains = Domain::DEFAULT_TRIPLE.to_vec();
    }

    InterviewPlan {
        domains,
        difficulty_sequence: difficulty_sequence(total_questions),
    }
}

/// Easy block, then medium, then hard. Known lengths use a fixed table; any other length
/// takes 30% easy and 30% medium (rounded down), the remainder hard.
pub fn difficulty_sequence(total_questions: usize) -> Vec<Difficulty> {
    let (easy, medium, hard) = match total_questions {
        10 => (3, 3, 4),
        7 => (2, 3, 2),
        5 => (1, 2, 2),
        n => {
            let easy = n * 3 / 10;
            let medium = n * 3 / 10;
            (easy, medium, n - easy - medium)
        }
    };

    std::iter::repeat(Difficulty::Easy)
        .take(easy)
        .chain(std::iter::repeat(Difficulty::Medium).take(medium))
        .chain(std::iter::repeat(Difficulty::Hard).take(hard))
        .collect()
}

/// Domain for the technical question at `technical_index` (0-based).
pub fn round_robin(domains: &[Domain], technical_index: usize) -> Domain {
    if domains.is_empty() {
        return Domain::DEFAULT_TRIPLE[technical_index % Domain::DEFAULT_TRIPLE.len()];
    }
    domains[technical_index % domains.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::Difficulty::{Easy, Hard, Medium};

    fn summary(recommended: Vec<Domain>, strengths: Vec<&str>) -> ResumeSummary {
        ResumeSummary {
            recommended_domains: recommended,
            key_strengths: strengths.into_iter().map(String::from).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_plan_two_domains_five_questions() {
        let plan = build_plan(&summary(vec![Domain::Python, Domain::Sql], vec![]), 5);
        assert_eq!(plan.domains, vec![Domain::Python, Domain::Sql]);
        assert_eq!(
            plan.difficulty_sequence,
            vec![Easy, Medium, Medium, Hard, Hard]
        );
    }

    #[test]
    fn test_difficulty_sequence_for_ten_ignores_summary() {
        let expected = vec![Easy, Easy, Easy, Medium, Medium, Medium, Hard, Hard, Hard, Hard];
        assert_eq!(build_plan(&ResumeSummary::default(), 10).difficulty_sequence, expected);
        assert_eq!(
            build_plan(&summary(Domain::ALL.to_vec(), vec!["SQL"]), 10).difficulty_sequence,
            expected
        );
    }

    #[test]
    fn test_difficulty_table_for_seven() {
        assert_eq!(
            difficulty_sequence(7),
            vec![Easy, Easy, Medium, Medium, Medium, Hard, Hard]
        );
    }

    #[test]
    fn test_difficulty_proportional_lengths_sum_and_stay_monotonic() {
        for n in 0..=25 {
            let seq = difficulty_sequence(n);
            assert_eq!(seq.len(), n);
            let tiers: Vec<u8> = seq
                .iter()
                .map(|d| match d {
                    Easy => 0,
                    Medium => 1,
                    Hard => 2,
                })
                .collect();
            assert!(tiers.windows(2).all(|w| w[0] <= w[1]), "n={n}");
        }
        assert_eq!(difficulty_sequence(4), vec![Easy, Medium, Hard, Hard]);
    }

    #[test]
    fn test_empty_summary_uses_default_triple() {
        let plan = build_plan(&ResumeSummary::default(), 5);
        assert_eq!(plan.domains, Domain::DEFAULT_TRIPLE.to_vec());
    }

    #[test]
    fn test_strengths_extend_and_dedup() {
        let plan = build_plan(
            &summary(
                vec![Domain::Sql],
                vec!["SQL", "Machine Learning", "team leadership"],
            ),
            5,
        );
        assert_eq!(plan.domains, vec![Domain::Sql, Domain::MachineLearning]);
    }

    #[test]
    fn test_plan_caps_at_six_domains() {
        let plan = build_plan(&summary(Domain::ALL.to_vec(), vec![]), 10);
        assert_eq!(plan.domains.len(), MAX_PLANNED_DOMAINS);
        assert_eq!(plan.domains, Domain::ALL[..6].to_vec());
    }

    #[test]
    fn test_round_robin_order_and_fairness() {
        let domains = [Domain::Python, Domain::Sql, Domain::Statistics];
        let assigned: Vec<Domain> = (0..9).map(|t| round_robin(&domains, t)).collect();
        assert_eq!(
            assigned,
            [domains, domains, domains].concat()
        );
        for domain in domains {
            assert_eq!(assigned.iter().filter(|d| **d == domain).count(), 3);
        }
    }
}

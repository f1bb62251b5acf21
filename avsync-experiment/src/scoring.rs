use crate::sink::BatchPayload;
use avsync_core::{ParticipantRecord, Questionnaire, TrialResult, TrialSpec, UserResponse};
use serde::Serialize;

/// How a response is judged, fixed by whether the SOA set has a zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringRule {
    /// Zero SOAs exist: "together" is right for them, "delay" for the rest.
    TwoSided,
    /// Every trial is offset, so only "delay" is right.
    OffsetOnly,
}

impl ScoringRule {
    pub fn for_soas(soas: &[i32]) -> Self {
        if soas.contains(&0) {
            ScoringRule::TwoSided
        } else {
            ScoringRule::OffsetOnly
        }
    }

    pub fn score(&self, spec: &TrialSpec, response: UserResponse) -> bool {
        match self {
            ScoringRule::TwoSided => match response {
                UserResponse::Delay => spec.had_offset(),
                UserResponse::Together => !spec.had_offset(),
            },
            ScoringRule::OffsetOnly => response == UserResponse::Delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub completed: usize,
    pub correct: usize,
    pub total: usize,
    /// Percentage rounded to one decimal.
    pub accuracy_pct: f64,
}

impl SessionSummary {
    pub fn lines(&self) -> [String; 3] {
        [
            format!("Completed: {} trials", self.completed),
            format!("Correct: {} / {}", self.correct, self.total),
            format!("Accuracy: {:.1}%", self.accuracy_pct),
        ]
    }
}

/// Turns the ordered trial results into the summary and outbound batch.
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    rule: ScoringRule,
    total: usize,
}

impl SessionAggregator {
    pub fn new(rule: ScoringRule, total: usize) -> Self {
        Self { rule, total }
    }

    pub fn for_soas(soas: &[i32]) -> Self {
        Self::new(ScoringRule::for_soas(soas), soas.len())
    }

    pub fn rule(&self) -> ScoringRule {
        self.rule
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn score(&self, spec: &TrialSpec, response: UserResponse) -> bool {
        self.rule.score(spec, response)
    }

    pub fn summarize(&self, results: &[TrialResult]) -> SessionSummary {
        let correct = results.iter().filter(|r| r.correct()).count();
        let accuracy_pct = if self.total == 0 {
            0.0
        } else {
            (1000.0 * correct as f64 / self.total as f64).round() / 10.0
        };
        SessionSummary {
            completed: results.len(),
            correct,
            total: self.total,
            accuracy_pct,
        }
    }

    pub fn batch(
        &self,
        participant: &ParticipantRecord,
        questionnaire: Option<&Questionnaire>,
        results: &[TrialResult],
    ) -> BatchPayload {
        BatchPayload {
            participant: participant.clone(),
            questionnaire: questionnaire.map(|q| q.answers().to_vec()).unwrap_or_default(),
            trials: results.to_vec(),
        }
    }
}

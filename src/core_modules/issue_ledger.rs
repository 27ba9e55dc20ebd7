// THEORY:
// The `IssueLedger` is the memory of the aggregator. A form problem that persists
// for two seconds shows up on sixty consecutive frames, yet it is one mistake and
// must cost the athlete once. The ledger folds the raw per-frame stream into one
// entry per issue code.
//
// Key architectural principles:
// 1.  **One entry per code**: Each code keeps the worst severity it was ever raised
//     at. On equal severity the larger deduction wins, and after that the message
//     first seen is kept.
// 2.  **Score from distinct codes**: `form_score = 100 − Σ deduction` over the
//     entries, clamped to [0, 100]. Repetition never deducts twice.
// 3.  **Stable feedback order**: Feedback is sorted by severity (worst first) and
//     then by when the code was first seen, so replaying a stream reproduces the
//     same list.

use std::collections::HashMap;

use crate::core_modules::form_rules::{FormIssue, Severity};

pub const MAX_SCORE: u32 = 100;

/// One deduplicated issue code and what the ledger knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub issue: FormIssue,
    pub occurrences: u64,
    first_seen: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IssueLedger {
    entries: HashMap<&'static str, LedgerEntry>,
}

impl IssueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, issue: FormIssue) {
        let next_order = self.entries.len();
        let entry = self.entries.entry(issue.code).or_insert(LedgerEntry {
            issue,
            occurrences: 0,
            first_seen: next_order,
        });
        entry.occurrences += 1;

        let current = &entry.issue;
        let worse = issue.severity > current.severity
            || (issue.severity == current.severity && issue.deduction > current.deduction);
        if worse {
            entry.issue = issue;
        }
    }

    pub fn record_all<'a>(&mut self, issues: impl IntoIterator<Item = &'a FormIssue>) {
        for issue in issues {
            self.record(*issue);
        }
    }

    /// `100 − Σ deduction` over distinct codes, clamped to [0, 100].
    pub fn form_score(&self) -> u8 {
        let total: u32 = self.entries.values().map(|entry| entry.issue.deduction).sum();
        // Clamped to 100, so the cast cannot truncate.
        MAX_SCORE.saturating_sub(total) as u8
    }

    /// Entries ordered by severity (worst first), then by first occurrence.
    pub fn ordered(&self) -> Vec<&LedgerEntry> {
        let mut entries: Vec<&LedgerEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            b.issue
                .severity
                .cmp(&a.issue.severity)
                .then(a.first_seen.cmp(&b.first_seen))
        });
        entries
    }

    /// Distinct feedback messages in report order.
    pub fn feedback(&self) -> Vec<String> {
        self.ordered()
            .into_iter()
            .map(|entry| entry.issue.message.to_string())
            .collect()
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.entries.values().map(|entry| entry.issue.severity).max()
    }
}

/// Score of a single frame: 100 minus that frame's deductions, clamped.
pub fn frame_score(issues: &[FormIssue]) -> u8 {
    let total: u32 = issues.iter().map(|issue| issue.deduction).sum();
    MAX_SCORE.saturating_sub(total) as u8
}

//! Output-parameter recovery for declare-and-select calls.
//!
//! The batch produces, in order: one echo result set per INOUT parameter,
//! the procedure's own result sets, then one single-row result set per
//! output variable. [`OutputRecovery`] is fed each result set in order and
//! classifies it. When the number of sets is known up front, only the
//! trailing sets can be outputs, so a procedure's own one-row set that
//! happens to share a parameter name stays with the caller.

use crate::core::value::{ResultSet, SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// INOUT echo result sets still to skip.
    AwaitingInoutEcho(usize),
    /// Output parameters still pending.
    AwaitingOutputRow,
    /// Every output recovered; remaining sets belong to the caller.
    Draining,
}

/// What to do with one result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Discard.
    Skip,
    /// Output values by parameter name; not returned to the caller.
    Output(Vec<(String, SqlValue)>),
    /// Caller-visible result set.
    Keep,
}

#[derive(Debug, Clone)]
pub struct OutputRecovery {
    state: RecoveryState,
    pending: Vec<String>,
    /// Sets not yet fed, when the batch size is known.
    remaining: Option<usize>,
}

impl OutputRecovery {
    /// `inout_echoes` sets are skipped before classification starts;
    /// `pending` lists the OUT/INOUT parameter names.
    pub fn new(inout_echoes: usize, pending: Vec<String>) -> Self {
        let state = if inout_echoes > 0 {
            RecoveryState::AwaitingInoutEcho(inout_echoes)
        } else if pending.is_empty() {
            RecoveryState::Draining
        } else {
            RecoveryState::AwaitingOutputRow
        };
        Self {
            state,
            pending,
            remaining: None,
        }
    }

    /// Declare how many result sets the batch returned in total.
    #[must_use]
    pub fn with_total(mut self, total: usize) -> Self {
        self.remaining = Some(total);
        self
    }

    /// Whether the current set lies in the trailing output block.
    fn in_output_tail(&self) -> bool {
        self.remaining.map_or(true, |n| n <= self.pending.len())
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Output parameters not recovered so far.
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    fn after_outputs(&self) -> RecoveryState {
        if self.pending.is_empty() {
            RecoveryState::Draining
        } else {
            RecoveryState::AwaitingOutputRow
        }
    }

    /// Classify the next result set.
    pub fn feed(&mut self, rs: &ResultSet) -> Disposition {
        let in_tail = self.in_output_tail();
        if let Some(n) = self.remaining.as_mut() {
            *n = n.saturating_sub(1);
        }
        match self.state {
            RecoveryState::AwaitingInoutEcho(n) => {
                self.state = if n > 1 {
                    RecoveryState::AwaitingInoutEcho(n - 1)
                } else {
                    self.after_outputs()
                };
                Disposition::Skip
            }
            RecoveryState::Draining => Disposition::Keep,
            RecoveryState::AwaitingOutputRow if !in_tail => Disposition::Keep,
            RecoveryState::AwaitingOutputRow => match self.match_output(rs) {
                Some(values) => {
                    self.pending
                        .retain(|p| !values.iter().any(|(name, _)| name.eq_ignore_ascii_case(p)));
                    self.state = self.after_outputs();
                    Disposition::Output(values)
                }
                None => Disposition::Keep,
            },
        }
    }

    /// A single-row set whose columns all name pending parameters.
    fn match_output(&self, rs: &ResultSet) -> Option<Vec<(String, SqlValue)>> {
        if rs.len() != 1 || rs.columns.is_empty() {
            return None;
        }
        let all_pending = rs
            .columns
            .iter()
            .all(|c| self.pending.iter().any(|p| p.eq_ignore_ascii_case(c)));
        if !all_pending {
            return None;
        }
        let row = &rs.rows[0];
        Some(
            rs.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }
}

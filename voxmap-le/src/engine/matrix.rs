//! Opinion matrix builder
//!
//! Turns raw votes into a dense voters × statements matrix with
//! missing-value semantics. A Pass vote (0) is treated as missing, not as a
//! neutral position: it records abstention, and imputing it as zero would
//! pull voters toward the center of the map. The builder performs no
//! statistics; it feeds PCA directly.

use crate::db::statements::ApprovedStatement;
use crate::db::votes::Vote;
use std::collections::HashMap;
use uuid::Uuid;

/// Cached per-voter vote tallies, carried through to VoterPosition
#[derive(Debug, Clone, Copy, Default)]
pub struct VoteTally {
    pub agree: usize,
    pub disagree: usize,
    pub pass: usize,
}

impl VoteTally {
    pub fn total(&self) -> usize {
        self.agree + self.disagree + self.pass
    }
}

/// Voters × statements matrix; cell = Some(+1.0 | -1.0) or None (missing)
#[derive(Debug, Clone)]
pub struct OpinionMatrix {
    /// Voter ids, one per row, in first-seen order
    pub voters: Vec<Uuid>,
    /// Statement ids, one per column, in the poll's approved order
    pub statements: Vec<Uuid>,
    /// Row-major cells; rows.len() == voters.len(), each row has
    /// statements.len() cells
    pub rows: Vec<Vec<Option<f64>>>,
    /// Per-voter tallies aligned with `voters`
    pub tallies: Vec<VoteTally>,
}

impl OpinionMatrix {
    /// Build the matrix from a poll's approved statements and their votes
    ///
    /// One row per distinct voter who cast at least one vote on an approved
    /// statement. Votes on unknown statements are ignored.
    pub fn build(statements: &[ApprovedStatement], votes: &[Vote]) -> Self {
        let statement_index: HashMap<Uuid, usize> = statements
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();

        let mut voter_index: HashMap<Uuid, usize> = HashMap::new();
        let mut voters = Vec::new();
        let mut rows: Vec<Vec<Option<f64>>> = Vec::new();
        let mut tallies: Vec<VoteTally> = Vec::new();

        for vote in votes {
            let Some(&col) = statement_index.get(&vote.statement_id) else {
                continue;
            };

            let row = *voter_index.entry(vote.voter_id).or_insert_with(|| {
                voters.push(vote.voter_id);
                rows.push(vec![None; statements.len()]);
                tallies.push(VoteTally::default());
                voters.len() - 1
            });

            match vote.value {
                1 => {
                    rows[row][col] = Some(1.0);
                    tallies[row].agree += 1;
                }
                -1 => {
                    rows[row][col] = Some(-1.0);
                    tallies[row].disagree += 1;
                }
                // Pass: counted in the tally, missing in the matrix
                0 => {
                    tallies[row].pass += 1;
                }
                other => {
                    tracing::warn!(value = other, "Ignoring vote with out-of-range value");
                }
            }
        }

        Self {
            voters,
            statements: statements.iter().map(|s| s.id).collect(),
            rows,
            tallies,
        }
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stmt(n: u128) -> ApprovedStatement {
        ApprovedStatement {
            id: Uuid::from_u128(n),
            created_at: Utc::now(),
        }
    }

    fn vote(voter: u128, statement: u128, value: i32) -> Vote {
        Vote {
            voter_id: Uuid::from_u128(voter),
            statement_id: Uuid::from_u128(statement),
            value,
        }
    }

    #[test]
    fn one_row_per_distinct_voter() {
        let statements = vec![stmt(1), stmt(2)];
        let votes = vec![vote(10, 1, 1), vote(10, 2, -1), vote(11, 1, -1)];

        let matrix = OpinionMatrix::build(&statements, &votes);
        assert_eq!(matrix.voter_count(), 2);
        assert_eq!(matrix.statement_count(), 2);
        assert_eq!(matrix.rows[0], vec![Some(1.0), Some(-1.0)]);
        assert_eq!(matrix.rows[1], vec![Some(-1.0), None]);
    }

    #[test]
    fn pass_is_missing_but_tallied() {
        let statements = vec![stmt(1)];
        let votes = vec![vote(10, 1, 0)];

        let matrix = OpinionMatrix::build(&statements, &votes);
        // A Pass still creates the voter's row
        assert_eq!(matrix.voter_count(), 1);
        assert_eq!(matrix.rows[0][0], None);
        assert_eq!(matrix.tallies[0].pass, 1);
        assert_eq!(matrix.tallies[0].total(), 1);
    }

    #[test]
    fn votes_on_unknown_statements_ignored() {
        let statements = vec![stmt(1)];
        let votes = vec![vote(10, 99, 1)];

        let matrix = OpinionMatrix::build(&statements, &votes);
        assert_eq!(matrix.voter_count(), 0);
    }

    #[test]
    fn tallies_count_all_three_kinds() {
        let statements = vec![stmt(1), stmt(2), stmt(3)];
        let votes = vec![vote(10, 1, 1), vote(10, 2, -1), vote(10, 3, 0)];

        let matrix = OpinionMatrix::build(&statements, &votes);
        let tally = matrix.tallies[0];
        assert_eq!(tally.agree, 1);
        assert_eq!(tally.disagree, 1);
        assert_eq!(tally.pass, 1);
        assert_eq!(tally.total(), 3);
    }
}

//! Vote counting for a closed election.
//!
//! Counts are always recomputed from the stored [`Vote`] rows rather than
//! read from any running counter.

use std::collections::HashMap;

use log::warn;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    model::{
        db::{Candidate, Partylist, Position, Vote},
        mongodb::Id,
    },
};

/// Everything cast and contested in one election.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BallotBox {
    pub partylists: Vec<Partylist>,
    pub positions: Vec<Position>,
    pub candidates: Vec<Candidate>,
    pub votes: Vec<Vote>,
}

/// Counts for every position of an election, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElectionTally {
    pub positions: Vec<PositionTally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionTally {
    pub id: Id,
    pub name: String,
    /// Votes recorded against the position with no candidate chosen.
    pub abstain: u64,
    pub candidates: Vec<CandidateTally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateTally {
    pub id: Id,
    /// Display name, see [`candidate_display_name`].
    pub name: String,
    pub votes: u64,
}

impl ElectionTally {
    /// Total number of votes counted, abstentions included.
    pub fn total_votes(&self) -> u64 {
        self.positions
            .iter()
            .map(|p| p.abstain + p.candidates.iter().map(|c| c.votes).sum::<u64>())
            .sum()
    }
}

/// `Last, First M. (ACRONYM)`, or `Last, First (ACRONYM)` without a middle name.
pub fn candidate_display_name(
    last: &str,
    first: &str,
    middle: Option<&str>,
    acronym: &str,
) -> String {
    match middle.and_then(|m| m.chars().next()) {
        Some(initial) => format!("{last}, {first} {initial}. ({acronym})"),
        None => format!("{last}, {first} ({acronym})"),
    }
}

/// Count the ballot box.
///
/// Positions are ordered by their `order` field and candidates by creation,
/// so the same votes always produce the same tally. Ties are kept as equal
/// counts.
pub fn tally(ballot_box: &BallotBox) -> Result<ElectionTally> {
    let acronyms: HashMap<Id, &str> = ballot_box
        .partylists
        .iter()
        .map(|p| (p.id, p.acronym.as_str()))
        .collect();

    let mut candidate_votes: HashMap<Id, u64> = HashMap::new();
    let mut abstentions: HashMap<Id, u64> = HashMap::new();
    for vote in &ballot_box.votes {
        match vote.candidate_id {
            Some(candidate) => *candidate_votes.entry(candidate).or_default() += 1,
            None => *abstentions.entry(vote.position_id).or_default() += 1,
        }
    }

    let mut positions: Vec<&Position> = ballot_box.positions.iter().collect();
    positions.sort_by_key(|p| (p.order, p.id));

    let mut counted = 0;
    let mut tallies = Vec::with_capacity(positions.len());
    for position in positions {
        let mut candidates: Vec<&Candidate> = ballot_box
            .candidates
            .iter()
            .filter(|c| c.position_id == position.id)
            .collect();
        candidates.sort_by_key(|c| c.id);

        let mut candidate_tallies = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let acronym = acronyms.get(&candidate.partylist_id).ok_or_else(|| {
                Error::Inconsistent(format!(
                    "candidate {} belongs to unknown partylist {}",
                    candidate.id, candidate.partylist_id
                ))
            })?;
            let votes = candidate_votes.get(&candidate.id).copied().unwrap_or(0);
            counted += votes;
            candidate_tallies.push(CandidateTally {
                id: candidate.id,
                name: candidate_display_name(
                    &candidate.last_name,
                    &candidate.first_name,
                    candidate.middle_name.as_deref(),
                    acronym,
                ),
                votes,
            });
        }

        let abstain = abstentions.get(&position.id).copied().unwrap_or(0);
        counted += abstain;
        tallies.push(PositionTally {
            id: position.id,
            name: position.name.clone(),
            abstain,
            candidates: candidate_tallies,
        });
    }

    let cast = ballot_box.votes.len() as u64;
    if counted != cast {
        warn!(
            "{} of {cast} votes reference positions or candidates outside this election",
            cast - counted
        );
    }

    Ok(ElectionTally { positions: tallies })
}

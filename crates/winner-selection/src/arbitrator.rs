//! Auction winner selection.
//!
//! A single linear scan over the scored participants keeps track of the best
//! and second best positive score. Ties are resolved in favour of the
//! participant seen first so the outcome only depends on the input order.

use crate::{
    participant::Participant,
    state::{RankType, Ranked, RankedItem, Scored, ScoredItem},
};

/// Picks the winner of an auction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Arbitrator;

impl Arbitrator {
    /// Ranks all participants. The returned ranking preserves the input
    /// order.
    pub fn arbitrate<T>(&self, participants: Vec<Participant<T, Scored<f64>>>) -> Ranking<T> {
        let mut best: Option<(usize, f64)> = None;
        let mut second: Option<(usize, f64)> = None;

        for (index, participant) in participants.iter().enumerate() {
            let score = ScoredItem::score(participant);
            if !is_eligible(score) {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {
                    if second.is_none_or(|(_, second_score)| score > second_score) {
                        second = Some((index, score));
                    }
                }
                _ => {
                    second = best;
                    best = Some((index, score));
                }
            }
        }

        let winner = best.map(|(index, _)| index);
        let runner_up = second.map(|(index, _)| index);
        let ranked = participants
            .into_iter()
            .enumerate()
            .map(|(index, participant)| {
                let rank_type = if Some(index) == winner {
                    RankType::Winner
                } else if Some(index) == runner_up {
                    RankType::RunnerUp
                } else if is_eligible(ScoredItem::score(&participant)) {
                    RankType::NonWinner
                } else {
                    RankType::FilteredOut
                };
                participant.rank(rank_type)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            participants = ranked.len(),
            ?winner,
            ?runner_up,
            "arbitrated auction"
        );

        Ranking {
            ranked,
            winner,
            runner_up,
        }
    }
}

/// Scores that are not strictly positive never win and are never reported
/// as runner-up.
fn is_eligible(score: f64) -> bool {
    score > 0.
}

pub type RankedParticipant<T> = Participant<T, Ranked<f64>>;

/// Final ranking of all participants of one auction.
#[derive(Debug)]
pub struct Ranking<T> {
    ranked: Vec<RankedParticipant<T>>,
    winner: Option<usize>,
    runner_up: Option<usize>,
}

impl<T> Ranking<T> {
    pub fn winner(&self) -> Option<&RankedParticipant<T>> {
        self.winner.map(|index| &self.ranked[index])
    }

    pub fn runner_up(&self) -> Option<&RankedParticipant<T>> {
        self.runner_up.map(|index| &self.ranked[index])
    }

    pub fn filtered_out(&self) -> impl Iterator<Item = &RankedParticipant<T>> {
        self.ranked
            .iter()
            .filter(|participant| participant.is_filtered_out())
    }

    /// Consumes the ranking returning the winner and the runner-up.
    pub fn into_winners(self) -> (Option<RankedParticipant<T>>, Option<RankedParticipant<T>>) {
        let mut winner = None;
        let mut runner_up = None;
        for participant in self.ranked {
            match participant.rank_type() {
                RankType::Winner => winner = Some(participant),
                RankType::RunnerUp => runner_up = Some(participant),
                RankType::NonWinner | RankType::FilteredOut => (),
            }
        }
        (winner, runner_up)
    }
}

//! Winner selection over scored bids.
//!
//! Both the on-device auction and any reporting that needs the runner-up go
//! through the same [`Arbitrator`] so that the outcome for a given ordered
//! list of scores is always the same.

pub mod arbitrator;
pub mod participant;
pub mod state;

pub use {
    arbitrator::{Arbitrator, RankedParticipant, Ranking},
    participant::Participant,
    state::{RankType, Ranked, RankedItem, Scored, ScoredItem, Unscored, UnscoredItem},
};

pub mod auction;
pub mod payload;

pub use {
    auction::{AuctionParameters, AuctionWinner, Error, Orchestrator, ReportingContext},
    payload::PayloadGenerator,
};

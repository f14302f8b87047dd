//! Contains models that are shared between the on-device auction and the
//! buyer input packer.

pub mod bid;
pub mod buyer;
pub mod candidate;

pub use {
    bid::{AdWithBid, BidResult, DebugReport},
    buyer::{BuyerId, EncodedSignals},
    candidate::{Ad, Candidate},
};

//! Privacy preserving ad auctions.
//!
//! [`domain::Orchestrator`] runs auctions on the device: candidates of the
//! participating buyers are collected, filtered, bid for in parallel per
//! buyer, scored and a single winner is selected and persisted.
//! [`domain::PayloadGenerator`] instead packs candidates into a size bounded
//! payload for auctions running on a remote auction service.

pub mod arguments;
pub mod config;
pub mod domain;
pub mod infra;
mod run;

pub use {
    domain::Error,
    run::{run, start},
};

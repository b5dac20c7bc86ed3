//! Team domain module
//!
//! A team is stored as one item: a string key, a string name, a list of
//! numbers (the batting order) and a number set (the reserve).

mod entity;
mod repository;

pub use entity::{attributes, Team};
pub use repository::TeamRepository;

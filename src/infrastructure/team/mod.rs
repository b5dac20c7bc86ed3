//! Team repository implementations

mod repository;

pub use repository::KeyValueTeamRepository;

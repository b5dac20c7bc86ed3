//! Infrastructure layer - Store adapters, repositories and logging

pub mod logging;
pub mod storage;
pub mod team;

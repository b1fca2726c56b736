#![allow(dead_code)]

pub mod fixtures;
pub mod pg_fixtures;
pub mod utils;

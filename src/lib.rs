#![deny(clippy::all)]

pub mod curation;
pub mod media;
pub mod menu;

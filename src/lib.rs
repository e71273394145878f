//! batchcheck: feed a batch of text records through a checker one at a time,
//! with pause, resume, stop and live progress.

pub mod banner;
pub mod checker;
pub mod commands;
pub mod consts;
pub mod controller;
pub mod events;
pub mod spinner;

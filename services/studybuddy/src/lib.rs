//! StudyBuddy Service Library Crate
//!
//! Everything around the adaptive core that touches the outside world:
//! configuration, the SQLite store, prompt templates, student input, terminal
//! output and the tutoring loop. The `studybuddy` binary is a thin wrapper
//! around this library.

pub mod cli;
pub mod config;
pub mod db;
pub mod display;
pub mod prompts;
pub mod transcriber;
pub mod tutor;

//! Shared fixtures for the integration tests
//!
//! A synthetic novel plus a mock completion client scripted with one
//! well-formed answer per stage.

#![allow(dead_code)]

pub mod book;
pub mod mock_llm;

pub use book::{sample_book, BookBuilder};
pub use mock_llm::{scripted_client, scripted_responses};

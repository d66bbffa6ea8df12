//! HTTP clients for bookscout.
//!
//! This crate implements the two external interfaces the discovery layer
//! depends on: a book metadata provider backed by the Google Books API and
//! an AI completion capability backed by OpenAI chat completions.

pub mod google_books;
pub mod openai;

pub use google_books::{GoogleBooksClient, GoogleBooksConfig, GoogleBooksError};
pub use openai::{OpenAiClient, OpenAiConfig, OpenAiError};

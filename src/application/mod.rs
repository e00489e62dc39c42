//! Application services: page documents and the errors surfaced to callers.

pub mod document;
pub mod error;
pub mod pages;

//! LLM provider implementations for Newsloom.
//!
//! All providers implement the `newsloom_core::Provider` trait.
//! The digest pipeline is provider-agnostic; Gemini is the default backend.

pub mod gemini;

pub use gemini::GeminiProvider;

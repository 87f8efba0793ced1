//! Intake side of the extractor contract.
//!
//! An upstream extractor (OCR, language model, form parser) turns prescription
//! text into a structured drug list. This crate reads that structured output
//! and maps it onto catalog-backed prescription entries. It performs no text
//! recognition of its own.

pub mod extraction;

pub use extraction::*;

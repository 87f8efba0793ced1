//! Domain models for the prescription safety engine.

mod dosage;
mod drug;
mod finding;
mod patient;
mod prescription;
mod recommendation;

pub use dosage::*;
pub use drug::*;
pub use finding::*;
pub use patient::*;
pub use prescription::*;
pub use recommendation::*;

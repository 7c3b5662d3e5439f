// Core moderation module - lexicon filtering and contact-leak detection.
//
// Everything a user types (or uploads as an image - OCR text arrives through
// the same entry point) passes through the gate in this module before it is
// persisted or forwarded anywhere.

pub mod contact_leak;
pub mod fuzzy;
pub mod gate;
pub mod lexicon;
pub mod moderation_models;
pub mod normalizer;

pub use gate::*;
pub use lexicon::*;
pub use moderation_models::*;

// Core dispatch module - eligibility matching and targeted broadcast of new
// listings to workers.

pub mod dispatch_models;
pub mod dispatch_service;

pub use dispatch_models::*;
pub use dispatch_service::*;

pub mod catalog;
pub mod conjunctions;
pub mod error;
pub mod maneuver;

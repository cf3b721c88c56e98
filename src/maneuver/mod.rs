mod optimizer;
mod service;
mod simplex;
mod types;

pub use service::calculate_maneuver;
pub use types::{ManeuverError, ManeuverParams, ManeuverProposal, ManeuverRequest};

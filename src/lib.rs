#![crate_name = "rofl_ofp"]
#![crate_type = "lib"]

//! OpenFlow 1.0, 1.2 and 1.3 wire objects.

mod bits;
pub mod action;
pub mod action_list;
pub mod bucket;
pub mod experimental;
pub mod flow_mod;
pub mod group_mod;
pub mod instruction;
pub mod meter;
pub mod ofp_error;
pub mod ofp_header;
pub mod ofp_match;
pub mod ofp_message;
pub mod ofp_wire;
pub mod oxm;
pub mod port;
pub mod queue;
pub mod stats;

pub use crate::ofp_error::{OfpError, Result};
pub use crate::ofp_header::OfpVersion;
pub use crate::ofp_wire::{OfpWire, Versioned};

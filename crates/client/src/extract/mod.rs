//! Destination extraction from tracker responses.
//!
//! Trackers that do not expose their target in a query parameter render a
//! redirect page instead; [`script`] recovers the target from that page.

pub mod script;

pub use script::{collect_scripts, fetch_script_redirect, find_script_redirect};

//! Shared types for the afr development notification server.
//!
//! This crate holds the two values every other afr crate passes around:
//!
//! - [`Message`]: the JSON notification pushed to connected browser tabs
//! - [`Dir`]: a directory descriptor (root path plus allow filter) that acts
//!   as the trust boundary for both file serving and change-event filtering
//!
//! # Example
//!
//! ```ignore
//! use afr_core::{Dir, Filter, Message};
//!
//! let dir = Dir::new("target").with_filter(Filter::glob("**/*.css")?);
//! assert!(dir.allow("css/site.css"));
//! assert!(dir.resolve("../etc/passwd").is_none());
//!
//! let msg = Message::change("css/site.css");
//! assert_eq!(msg.to_json()?, r#"{"type":"change","path":"css/site.css"}"#);
//! ```

mod dir;
mod message;

pub use dir::{Dir, Filter, FilterError, has_parent_segment, normalize_relative};
pub use message::Message;

//! The streaming protocol-translation core (spec §2, §4).
//!
//! `pipeline` is the only module the rest of the crate talks to; the
//! others are its collaborators and are unit-tested independently.

pub mod extractor;
pub mod params;
pub mod pipeline;
pub mod remap;
pub mod sanitize;
pub mod sse;
pub mod transducer;

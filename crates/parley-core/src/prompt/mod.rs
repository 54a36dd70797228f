//! Transcript-style prompt framing.

pub mod framer;

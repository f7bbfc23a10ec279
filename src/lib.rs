//! Slidecast - narrated slide videos in many languages
//!
//! Turns a directory of slides and one narration file into a video per output
//! language: narration is translated, synthesized to speech, rendered onto the
//! slides with ffmpeg and joined with optional transitions. Every stage reuses
//! its cached artifacts while the narration they came from is unchanged.

pub mod cache;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod hashing;
pub mod language;
pub mod layout;
pub mod media;
pub mod narration;
pub mod openai;
pub mod progress;
pub mod slides;
pub mod speech;
pub mod transition;
pub mod translate;
pub mod video;
pub mod workflow;

//! facecheck-rekognition — AWS Rekognition comparison client.
//!
//! Implements [`facecheck_core::FaceComparer`] by calling the Rekognition
//! `CompareFaces` action over its JSON protocol, signing each request with
//! AWS Signature Version 4.

pub mod client;
pub mod config;
pub mod sigv4;
mod wire;

pub use client::RekognitionClient;
pub use config::{Credentials, QualityFilter, RekognitionConfig, DEFAULT_REGION};

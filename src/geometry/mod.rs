// src/geometry/mod.rs
//
// Road model and feature extraction. Both stages are pure functions of a
// single test case, which is what lets pipeline::extraction fan them out
// across the pool.

pub mod features;
pub mod road_model;

pub use features::{
    extract, extract_sequence, FeatureConfig, FeatureVector, SequenceFeatures, FEATURE_DIM,
    SEQUENCE_CHANNELS,
};
pub use road_model::{analyze, GeometryConfig, RoadGeometry};

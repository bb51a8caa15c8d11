#![allow(dead_code)]

pub mod fixtures;

use hearth_core::PolicyRegistry;
use hearth_processing::MediaPipeline;
use std::sync::Arc;

pub fn registry() -> Arc<PolicyRegistry> {
    Arc::new(PolicyRegistry::builtin())
}

pub fn pipeline() -> MediaPipeline {
    MediaPipeline::new(registry())
}

//! Per-asset processing: checksum -> metadata -> validation -> derivatives.
//!
//! Stages run strictly in order on the calling thread. The batch coordinator runs many
//! of these concurrently on the blocking pool.

use hearth_core::{JobStatus, MediaAsset, PipelineConfig, PolicyRegistry, ProcessingJob};
use std::sync::Arc;
use std::time::Instant;

use crate::checksum;
use crate::derivatives::{standard_specs, DerivativeGenerator, VariantSpec};
use crate::metadata::MetadataExtractor;
use crate::validator::Validator;

#[derive(Clone)]
pub struct MediaPipeline {
    policies: Arc<PolicyRegistry>,
    extractor: MetadataExtractor,
    generator: DerivativeGenerator,
    specs: Vec<VariantSpec>,
}

impl MediaPipeline {
    pub fn new(policies: Arc<PolicyRegistry>) -> Self {
        Self {
            policies,
            extractor: MetadataExtractor::default(),
            generator: DerivativeGenerator::default(),
            specs: standard_specs(),
        }
    }

    pub fn from_config(policies: Arc<PolicyRegistry>, config: &PipelineConfig) -> Self {
        Self::new(policies).with_extractor(MetadataExtractor::from_config(config))
    }

    pub fn with_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_generator(mut self, generator: DerivativeGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_specs(mut self, specs: Vec<VariantSpec>) -> Self {
        self.specs = specs;
        self
    }

    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    pub fn generator(&self) -> &DerivativeGenerator {
        &self.generator
    }

    /// Run every stage for one asset and return the finished job.
    pub fn process(&self, index: usize, asset: Arc<MediaAsset>) -> ProcessingJob {
        let start = Instant::now();
        let mut job = ProcessingJob::new(index, asset);
        let asset = Arc::clone(&job.asset);
        let policy = self.policies.resolve(asset.media_type());

        let mut metadata = self.extractor.extract(asset.data(), asset.content_type());
        metadata.checksum = Some(checksum::digest(asset.data()));

        let validation = Validator::validate(&asset, &metadata, policy);
        job.metadata = Some(metadata);

        if !validation.valid() {
            let errors = validation.errors().to_vec();
            job.validation = Some(validation);
            tracing::debug!(
                job_id = %job.id,
                filename = %asset.original_filename(),
                errors = ?errors,
                "Asset rejected by validation"
            );
            job.finish(JobStatus::Rejected { errors });
            return job;
        }
        job.validation = Some(validation);

        let status = if policy.generate_derivatives && asset.is_image() {
            match self.generator.generate(&asset, &self.specs) {
                Ok(set) if set.variants.is_empty() && !set.failures.is_empty() => {
                    job.variant_failures = set.failures;
                    JobStatus::Failed {
                        reason: "no variant could be produced".to_string(),
                    }
                }
                Ok(set) => {
                    job.variants = set.variants;
                    job.variant_failures = set.failures;
                    JobStatus::Completed
                }
                Err(e) => JobStatus::Failed {
                    reason: e.to_string(),
                },
            }
        } else {
            JobStatus::Completed
        };

        tracing::info!(
            job_id = %job.id,
            index = index,
            filename = %asset.original_filename(),
            media_type = %asset.media_type(),
            variants = job.variants.len(),
            variant_failures = job.variant_failures.len(),
            success = status.is_success(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Asset processed"
        );

        job.finish(status);
        job
    }
}

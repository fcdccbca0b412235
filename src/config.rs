use alloc::string::String;

use crate::distortion::DistortionMeasure;
use crate::error::{CoreError, Result};

/// Injected configuration for one run of the codebook generator (spec.md
/// §6.2).
///
/// `clusters` is carried here purely so `Config` is a faithful mirror of
/// the documented external interface; the k-means pre-pass that partitions
/// training lines into classes is explicitly out of scope (spec.md §1), and
/// each class's generator invocation gets its own `Config` with `clusters`
/// left at whatever the caller is iterating over — this crate itself never
/// reads the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub alphabet_size: u8,
    pub distortion_measure: DistortionMeasure,
    pub comp: f64,
    pub clusters: u32,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.alphabet_size == 0 || self.alphabet_size > 64 {
            return Err(CoreError::ConfigurationInvalid {
                message: String::from("alphabet_size must be in 1..=64"),
            });
        }
        if !(self.comp >= 0.0) {
            return Err(CoreError::ConfigurationInvalid {
                message: String::from("comp must be non-negative"),
            });
        }
        if self.clusters == 0 {
            return Err(CoreError::ConfigurationInvalid {
                message: String::from("clusters must be >= 1"),
            });
        }
        Ok(())
    }
}

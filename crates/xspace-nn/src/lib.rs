#![doc = include_str!("../README.md")]

pub mod dataset;
pub mod nnet;
mod source;

pub use dataset::{Dataset, DatasetError, Sample};
pub use nnet::{classification_label, ModelError, NNet};

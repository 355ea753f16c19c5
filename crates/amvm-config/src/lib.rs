//! Parameter tree and process-level setup for the analog MVM simulator.
//!
//! The parameters mirror the hardware description consumed by
//! `amvm-core`: array sizes, weight/input range constraints, partitioning
//! preferences, and simulation switches. Everything deserialises from partial
//! JSON or TOML documents with defaults filled in.

pub mod params;
pub mod tracing;

pub use params::{
    AnalogParams, BackendKind, ConfigError, ConvolutionParams, CoreParams, CoreStyle,
    InputMapping, InputsMapping, MappingParams, PartitionStrategy, SimulationOptions,
    WeightMapping,
};
pub use self::tracing::{init_tracing, InitError};

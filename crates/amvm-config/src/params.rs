use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Errors raised while loading or validating a parameter tree.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse JSON parameters: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse TOML parameters: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unsupported parameter file format {0:?} (expected .json or .toml)")]
    UnknownFormat(PathBuf),
    #[error("core type {0} is unknown: should be OFFSET, BALANCED, or BITSLICED")]
    UnknownCoreStyle(String),
    #[error("unknown backend {0} (expected ndarray, cpu_dense, or faer)")]
    UnknownBackend(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("environment variable {var} has unusable value {value:?}")]
    Env { var: &'static str, value: String },
}

/// Physical topology used to realise signed weights on a crossbar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreStyle {
    /// A single array with a bias column subtracted digitally.
    Offset,
    /// Two arrays holding the positive and negative parts.
    #[default]
    Balanced,
    /// Weights split across several arrays by digit significance.
    Bitsliced,
}

impl FromStr for CoreStyle {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OFFSET" => Ok(CoreStyle::Offset),
            "BALANCED" => Ok(CoreStyle::Balanced),
            "BITSLICED" => Ok(CoreStyle::Bitsliced),
            _ => Err(ConfigError::UnknownCoreStyle(raw.to_string())),
        }
    }
}

impl fmt::Display for CoreStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CoreStyle::Offset => "OFFSET",
            CoreStyle::Balanced => "BALANCED",
            CoreStyle::Bitsliced => "BITSLICED",
        };
        f.write_str(label)
    }
}

/// How an axis that does not divide evenly is split across cores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionStrategy {
    /// Fill every core up to the configured maximum; the last core takes the rest.
    #[default]
    Max,
    /// Split into (rounded) equal parts; the last core takes the rest.
    Even,
}

/// Numeric backend used by every grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Ndarray,
    CpuDense,
    Faer,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ndarray" => Ok(BackendKind::Ndarray),
            "cpu_dense" | "cpu-dense" | "cpu" => Ok(BackendKind::CpuDense),
            "faer" => Ok(BackendKind::Faer),
            _ => Err(ConfigError::UnknownBackend(raw.to_string())),
        }
    }
}

/// Weight programming constraints shared by every core of a matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightMapping {
    /// Clip programmed values to `[min, max]`.
    pub clipping: bool,
    pub min: f64,
    pub max: f64,
    /// When set, `min`/`max` are re-estimated from the data on every full write.
    pub percentile: Option<f64>,
    pub row_partition_priority: Vec<u32>,
    pub col_partition_priority: Vec<u32>,
    pub row_partition_strategy: PartitionStrategy,
    pub col_partition_strategy: PartitionStrategy,
}

impl Default for WeightMapping {
    fn default() -> Self {
        Self {
            clipping: true,
            min: -1.0,
            max: 1.0,
            percentile: Some(1.0),
            row_partition_priority: Vec::new(),
            col_partition_priority: Vec::new(),
            row_partition_strategy: PartitionStrategy::Max,
            col_partition_strategy: PartitionStrategy::Max,
        }
    }
}

/// Input (DAC) range constraints for one multiply orientation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputMapping {
    /// Clip inputs to the fixed `[min, max]` range when no percentile is set.
    pub clipping: bool,
    pub min: f64,
    pub max: f64,
    pub percentile: Option<f64>,
}

impl Default for InputMapping {
    fn default() -> Self {
        Self {
            clipping: false,
            min: -1.0,
            max: 1.0,
            percentile: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsMapping {
    pub mvm: InputMapping,
    pub vmm: InputMapping,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingParams {
    pub weights: WeightMapping,
    pub inputs: InputsMapping,
}

/// Per-core hardware description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreParams {
    pub style: CoreStyle,
    /// Maximum physical rows of one array, i.e. the largest number of matrix
    /// columns a single core can take. `0` means unbounded.
    pub rows_max: usize,
    /// Maximum physical columns of one array, i.e. the largest number of
    /// matrix rows a single core can take. `0` means unbounded.
    pub cols_max: usize,
    pub complex_matrix: bool,
    pub complex_input: bool,
    /// Number of slices used by the bit-sliced topology.
    pub bit_slices: u32,
    /// Bits carried by every slice but the last.
    pub bits_per_slice: u32,
    pub mapping: MappingParams,
}

impl Default for CoreParams {
    fn default() -> Self {
        Self {
            style: CoreStyle::Balanced,
            rows_max: 512,
            cols_max: 512,
            complex_matrix: false,
            complex_input: false,
            bit_slices: 2,
            bits_per_slice: 4,
            mapping: MappingParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvolutionParams {
    pub x_par: usize,
    pub y_par: usize,
}

impl Default for ConvolutionParams {
    fn default() -> Self {
        Self { x_par: 1, y_par: 1 }
    }
}

impl ConvolutionParams {
    /// Number of input vectors packed into one simulated MVM.
    pub fn copies(&self) -> usize {
        self.x_par.max(1) * self.y_par.max(1)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Run 2-D operands as one batched multiply instead of column by column.
    pub fast_matmul: bool,
    pub backend: BackendKind,
    pub convolution: ConvolutionParams,
}

/// Root of the parameter tree consumed by the analog core.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalogParams {
    pub core: CoreParams,
    pub simulation: SimulationOptions,
}

impl AnalogParams {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let params: AnalogParams = serde_json::from_str(raw)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let params: AnalogParams = toml::from_str(raw)?;
        params.validate()?;
        Ok(params)
    }

    /// Loads a parameter file, picking the parser from the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            Some("toml") => Self::from_toml_str(&raw),
            _ => Err(ConfigError::UnknownFormat(path.to_path_buf())),
        }
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether matrices or inputs are expanded into the real block encoding.
    pub fn complex_valued(&self) -> bool {
        self.core.complex_matrix || self.core.complex_input
    }

    /// Applies `AMVM_FAST_MATMUL` and `AMVM_BACKEND` on top of the loaded values.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(raw) = std::env::var("AMVM_FAST_MATMUL") {
            self.simulation.fast_matmul = match raw.as_str() {
                "1" | "true" | "True" | "on" | "ON" => true,
                "0" | "false" | "False" | "off" | "OFF" => false,
                _ => {
                    return Err(ConfigError::Env {
                        var: "AMVM_FAST_MATMUL",
                        value: raw,
                    })
                }
            };
        }
        if let Ok(raw) = std::env::var("AMVM_BACKEND") {
            self.simulation.backend = raw.parse().map_err(|_| ConfigError::Env {
                var: "AMVM_BACKEND",
                value: raw.clone(),
            })?;
        }
        Ok(self)
    }

    /// Structural checks only; device-level parameters are not interpreted here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = &self.core.mapping.weights;
        check_range("core.mapping.weights", weights.min, weights.max, weights.percentile)?;
        for (field, divisors) in [
            ("core.mapping.weights.row_partition_priority", &weights.row_partition_priority),
            ("core.mapping.weights.col_partition_priority", &weights.col_partition_priority),
        ] {
            if divisors.iter().any(|&d| d == 0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "partition priority divisors must be non-zero".to_string(),
                });
            }
        }
        let inputs = &self.core.mapping.inputs;
        check_range("core.mapping.inputs.mvm", inputs.mvm.min, inputs.mvm.max, inputs.mvm.percentile)?;
        check_range("core.mapping.inputs.vmm", inputs.vmm.min, inputs.vmm.max, inputs.vmm.percentile)?;
        if self.core.style == CoreStyle::Bitsliced {
            if self.core.bit_slices == 0 {
                return Err(ConfigError::Invalid {
                    field: "core.bit_slices",
                    reason: "at least one slice is required".to_string(),
                });
            }
            if self.core.bits_per_slice == 0 || self.core.bits_per_slice > 16 {
                return Err(ConfigError::Invalid {
                    field: "core.bits_per_slice",
                    reason: format!("expected 1..=16, got {}", self.core.bits_per_slice),
                });
            }
        }
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    min: f64,
    max: f64,
    percentile: Option<f64>,
) -> Result<(), ConfigError> {
    if !(min.is_finite() && max.is_finite()) || min >= max {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("expected finite min < max, got [{min}, {max}]"),
        });
    }
    if let Some(p) = percentile {
        if !(p.is_finite() && p > 0.0) {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("percentile must be positive, got {p}"),
            });
        }
    }
    Ok(())
}

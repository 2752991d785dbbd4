use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("l2w_mask_smooth_sigma must be positive, got {0}")]
    SmoothSigma(f64),

    #[error("{name} should be between 0 and 30, got {value}")]
    FlagExponent { name: &'static str, value: u32 },

    #[error("l2w_mask_negative_wave_range must be ordered, got [{0}, {1}]")]
    WaveRange(f64, f64),

    #[error("Invalid bbox: {0}")]
    Bbox(String),

    #[error("Coefficient table {table}: {message}")]
    Coefficients { table: &'static str, message: String },
}

use std::path::PathBuf;

/// Maximum embedding distance for a match to count as recognized.
/// Tuned for L2-normalized ArcFace embeddings.
const DEFAULT_MATCH_THRESHOLD: f32 = 1.1;

/// Process configuration, loaded from `ROLLCALL_*` environment variables.
pub struct Config {
    /// Directory of reference images, one per identity.
    pub faces_dir: PathBuf,
    /// Path to the attendance table.
    pub ledger_path: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// V4L2 device path for camera mode.
    pub camera_device: String,
    /// Acceptance threshold for the recognition engine.
    pub match_threshold: f32,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Config {
        Config {
            faces_dir: env_path("ROLLCALL_FACES_DIR", "faces"),
            ledger_path: env_path("ROLLCALL_LEDGER_PATH", "attendance.csv"),
            model_dir: env_path("ROLLCALL_MODEL_DIR", "models"),
            camera_device: std::env::var("ROLLCALL_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            match_threshold: env_f32("ROLLCALL_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
        }
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

//! Environment-safety profile for constrained hosts.

use super::pipeline::PipelineConfig;

/// Environment variable checked by [`EnvironmentProfile::detect`].
pub const CI_ENV_VAR: &str = "CI";

/// Settings forced when running on a CI host.
///
/// CI machines have no hardware encoder, little memory for large speech
/// models, and short-lived disks where backup cleanup is pointless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvironmentProfile {
    ci: bool,
}

impl EnvironmentProfile {
    /// Profile that changes nothing.
    pub fn standard() -> Self {
        Self { ci: false }
    }

    /// Profile with CI-safe settings.
    pub fn ci() -> Self {
        Self { ci: true }
    }

    /// Detect from the process environment (`CI=true`, case-insensitive).
    pub fn detect() -> Self {
        let ci = std::env::var(CI_ENV_VAR)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self { ci }
    }

    pub fn is_ci(&self) -> bool {
        self.ci
    }

    /// Apply the profile to a merged config, returning a new config.
    ///
    /// Applying twice gives the same result as applying once.
    pub fn apply(&self, config: &PipelineConfig) -> PipelineConfig {
        let mut safe = config.clone();
        if self.ci {
            safe.set("video", "hardware_acceleration", false);
            safe.set("captions", "whisper_model", "tiny");
            safe.set("backup", "retention_days", 999);
        }
        safe
    }
}

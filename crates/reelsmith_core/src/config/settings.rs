//! Config sections and built-in defaults.
//!
//! Each section maps to one TOML table. Stages read their own table through
//! a [`StageConfig`](super::StageConfig) snapshot, so unknown keys are kept
//! rather than rejected.

use toml::Table;

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Backup,
    Audio,
    Captions,
    Video,
    Thumbnails,
    Pipeline,
    Logging,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 7] = [
        ConfigSection::Backup,
        ConfigSection::Audio,
        ConfigSection::Captions,
        ConfigSection::Video,
        ConfigSection::Thumbnails,
        ConfigSection::Pipeline,
        ConfigSection::Logging,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Backup => "backup",
            ConfigSection::Audio => "audio",
            ConfigSection::Captions => "captions",
            ConfigSection::Video => "video",
            ConfigSection::Thumbnails => "thumbnails",
            ConfigSection::Pipeline => "pipeline",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Backup => "Pre-processing backup of the input file",
            ConfigSection::Audio => "Audio clean-up and two-pass loudness correction",
            ConfigSection::Captions => "Speech-to-text captions (SRT)",
            ConfigSection::Video => "Color grading and re-encode",
            ConfigSection::Thumbnails => "Thumbnail frame extraction",
            ConfigSection::Pipeline => "Stage sequencing",
            ConfigSection::Logging => "Per-run log output",
        }
    }

    /// Look up a section by table name.
    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.table_name() == name)
    }
}

/// Built-in defaults for every section.
///
/// Loaded files are merged on top of these, so a partial file is valid.
pub fn default_sections() -> Table {
    toml::toml! {
        [backup]
        enabled = true
        backup_dir = ".backups"
        retention_days = 7

        [audio]
        target_loudness_lufs = -16.0
        peak_mode = "auto"
        true_peak_db = -1.0
        dual_mono = false
        tolerance_lu = 0.5
        highpass_hz = 80
        lowpass_hz = 12000
        presence_boost_hz = 3000
        presence_boost_db = 2.0
        compression_threshold_db = -20.0
        compression_ratio = 3.0

        [captions]
        whisper_model = "base"
        language = "en"
        max_words_per_line = 10
        max_chars_per_line = 42
        burn_captions = false
        font_size = 24

        [video]
        hardware_acceleration = true
        hardware_encoder = "h264_videotoolbox"
        hardware_bitrate = "10M"
        software_encoder = "libx264"
        crf = 18
        lut_path = ""
        brightness = 0.0
        contrast = 1.0
        saturation = 1.0
        denoise = false
        upscale = false

        [thumbnails]
        count = 6
        width = 1280
        height = 720
        format = "jpg"
        quality = 95

        [pipeline]
        fail_fast = false

        [logging]
        output_dir = "logs"
        level = "info"
        compact = true
        error_tail = 20
        progress_step = 20
    }
}

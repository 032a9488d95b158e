//! Second pass: linear loudness correction.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::meter::LoudnessMeter;
use super::types::{CorrectionTarget, LoudnessError, LoudnessMeasurement, LoudnessResult};
use crate::logging::JobLogger;
use crate::tool::{timeouts, MediaTool, ToolInvocation, FFMPEG};

/// Quieter targets get more peak headroom.
const QUIET_TARGET_LUFS: f64 = -16.0;

/// Lowest loudness-range target loudnorm accepts in linear mode.
const DEFAULT_TARGET_LRA: f64 = 7.0;
/// Highest loudness-range target loudnorm accepts.
const MAX_TARGET_LRA: f64 = 50.0;

/// True-peak ceiling chosen automatically for a loudness target.
///
/// -2.0 dBTP at or below -16 LUFS, -1.0 dBTP above it.
pub fn auto_true_peak(target_lufs: f64) -> f64 {
    if target_lufs <= QUIET_TARGET_LUFS {
        -2.0
    } else {
        -1.0
    }
}

/// Output encoder chosen from the output file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCodec {
    /// `.mp3` - libmp3lame at 256k.
    Mp3,
    /// `.m4a` / `.aac` - AAC at 256k.
    Aac,
    /// `.flac` - lossless.
    Flac,
    /// `.wav` - 16-bit PCM.
    Wav,
    /// Anything else - let the container pick.
    ContainerDefault,
}

impl OutputCodec {
    /// Look up the codec for `path` by extension (case-insensitive).
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" => OutputCodec::Mp3,
            "m4a" | "aac" => OutputCodec::Aac,
            "flac" => OutputCodec::Flac,
            "wav" => OutputCodec::Wav,
            _ => OutputCodec::ContainerDefault,
        }
    }

    /// Encoder arguments for ffmpeg.
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            OutputCodec::Mp3 => &["-c:a", "libmp3lame", "-b:a", "256k"],
            OutputCodec::Aac => &["-c:a", "aac", "-b:a", "256k"],
            OutputCodec::Flac => &["-c:a", "flac"],
            OutputCodec::Wav => &["-c:a", "pcm_s16le"],
            OutputCodec::ContainerDefault => &[],
        }
    }
}

/// Measures an input and writes a loudness-corrected copy.
#[derive(Clone)]
pub struct LoudnessNormalizer {
    meter: LoudnessMeter,
    tool: Arc<dyn MediaTool>,
    timeout: Duration,
    logger: Option<Arc<JobLogger>>,
}

impl LoudnessNormalizer {
    /// Create a normalizer using the given tool for both passes.
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self {
            meter: LoudnessMeter::new(Arc::clone(&tool)),
            tool,
            timeout: timeouts::AUDIO_RENDER,
            logger: None,
        }
    }

    /// Send degradation notices to a job logger as well as `tracing`.
    pub fn with_logger(mut self, logger: Arc<JobLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Override the correction pass timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The meter used for the first pass.
    pub fn meter(&self) -> &LoudnessMeter {
        &self.meter
    }

    /// Measure `input`, then write a linearly corrected copy to `output`.
    ///
    /// Returns the pre-correction measurement.
    pub fn correct(
        &self,
        input: &Path,
        output: &Path,
        target: &CorrectionTarget,
    ) -> LoudnessResult<LoudnessMeasurement> {
        let measured = self.meter.measure(input)?;
        if !measured.is_correctable() {
            return Err(LoudnessError::MeasurementParse(format!(
                "input {} has no measurable loudness (I={})",
                input.display(),
                measured.integrated_lufs
            )));
        }

        if target.dual_mono {
            self.warn("Dual mono requested but not supported; using coupled stereo correction");
        }

        let filter = linear_filter(target, &measured);
        let invocation = ToolInvocation::new(FFMPEG, self.timeout)
            .args(["-y", "-hide_banner", "-nostats", "-i"])
            .path(input)
            .args(["-af", filter.as_str()])
            .args(OutputCodec::for_path(output).args().iter())
            .path(output);

        if let Some(ref logger) = self.logger {
            logger.command(&invocation.command_line());
        }
        self.tool.run_checked(&invocation)?;

        if !output.is_file() {
            return Err(LoudnessError::OutputNotProduced(output.to_path_buf()));
        }

        Ok(measured)
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
        if let Some(ref logger) = self.logger {
            logger.warn(message);
        }
    }
}

/// Build the second-pass loudnorm filter from a target and measurement.
///
/// The range target is raised to the measured range so loudnorm stays in
/// linear mode.
fn linear_filter(target: &CorrectionTarget, measured: &LoudnessMeasurement) -> String {
    let lra = measured
        .loudness_range_lu
        .clamp(DEFAULT_TARGET_LRA, MAX_TARGET_LRA);
    format!(
        "loudnorm=I={:.2}:TP={:.2}:LRA={:.2}:measured_I={:.2}:measured_TP={:.2}:\
         measured_LRA={:.2}:measured_thresh={:.2}:offset={:.2}:linear=true:print_format=summary",
        target.target_lufs,
        target.target_true_peak_db,
        lra,
        measured.integrated_lufs,
        measured.true_peak_db,
        measured.loudness_range_lu,
        measured.threshold_lufs,
        measured.target_offset_lu,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loudness::PeakMode;
    use crate::tool::testing::{read_fake_lufs, ScriptedTool};
    use std::fs;

    #[test]
    fn auto_peak_follows_target() {
        assert_eq!(auto_true_peak(-16.0), -2.0);
        assert_eq!(auto_true_peak(-23.0), -2.0);
        assert_eq!(auto_true_peak(-14.0), -1.0);
        assert_eq!(auto_true_peak(-15.9), -1.0);
        assert_eq!(PeakMode::Auto.resolve(-16.0), -2.0);
        assert_eq!(PeakMode::Auto.resolve(-14.0), -1.0);
    }

    #[test]
    fn codec_lookup_by_extension() {
        assert_eq!(OutputCodec::for_path(Path::new("a.MP3")), OutputCodec::Mp3);
        assert_eq!(OutputCodec::for_path(Path::new("a.m4a")), OutputCodec::Aac);
        assert_eq!(OutputCodec::for_path(Path::new("a.flac")), OutputCodec::Flac);
        assert_eq!(OutputCodec::for_path(Path::new("a.wav")), OutputCodec::Wav);
        assert_eq!(
            OutputCodec::for_path(Path::new("a.ogg")),
            OutputCodec::ContainerDefault
        );
        assert_eq!(OutputCodec::Mp3.args(), &["-c:a", "libmp3lame", "-b:a", "256k"]);
        assert!(OutputCodec::ContainerDefault.args().is_empty());
    }

    #[test]
    fn filter_carries_all_measured_values() {
        let target = CorrectionTarget::new(-14.0, PeakMode::Auto, false);
        let measured = LoudnessMeasurement {
            integrated_lufs: -27.61,
            true_peak_db: -4.47,
            loudness_range_lu: 18.06,
            threshold_lufs: -39.2,
            target_offset_lu: 0.58,
        };
        let filter = linear_filter(&target, &measured);
        assert_eq!(
            filter,
            "loudnorm=I=-14.00:TP=-1.00:LRA=18.06:measured_I=-27.61:measured_TP=-4.47:\
             measured_LRA=18.06:measured_thresh=-39.20:offset=0.58:linear=true:print_format=summary"
        );
    }

    #[test]
    fn narrow_range_uses_default_lra() {
        let target = CorrectionTarget::new(-16.0, PeakMode::Auto, false);
        let measured = LoudnessMeasurement {
            integrated_lufs: -20.0,
            true_peak_db: -6.0,
            loudness_range_lu: 3.2,
            threshold_lufs: -30.0,
            target_offset_lu: 0.0,
        };
        assert!(linear_filter(&target, &measured).contains(":LRA=7.00:"));
    }

    #[test]
    fn correction_measures_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.mp3");
        fs::write(&input, "-30.0").unwrap();

        let tool = Arc::new(ScriptedTool::new());
        let normalizer = LoudnessNormalizer::new(tool.clone());
        let target = CorrectionTarget::new(-16.0, PeakMode::Auto, false);
        let before = normalizer.correct(&input, &output, &target).unwrap();

        assert_eq!(before.integrated_lufs, -30.0);
        let calls = tool.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].mentions("print_format=json"));
        assert!(calls[1].mentions("linear=true"));
        assert!(calls[1].mentions("libmp3lame"));
        assert_eq!(calls[1].args.last().unwrap(), &output.display().to_string());
    }

    #[test]
    fn round_trip_lands_on_target() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(ScriptedTool::new());
        let normalizer = LoudnessNormalizer::new(tool.clone());

        for (i, (source, target_lufs)) in [(-31.4, -16.0), (-9.8, -14.0), (-23.0, -23.0), (-18.25, -24.0)]
            .into_iter()
            .enumerate()
        {
            let input = dir.path().join(format!("in_{}.wav", i));
            let output = dir.path().join(format!("out_{}.wav", i));
            fs::write(&input, format!("{:.2}", source)).unwrap();

            let target = CorrectionTarget::new(target_lufs, PeakMode::Auto, false);
            normalizer.correct(&input, &output, &target).unwrap();
            let after = normalizer.meter().measure(&output).unwrap();

            assert!(
                after.within(target_lufs, 0.5),
                "source {} -> {} landed at {}",
                source,
                target_lufs,
                after.integrated_lufs
            );
            assert!((read_fake_lufs(&output) - target_lufs).abs() < 0.01);
        }
    }

    #[test]
    fn dual_mono_falls_back_to_coupled() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        fs::write(&input, "-20.0").unwrap();

        let tool = Arc::new(ScriptedTool::new());
        let logger = Arc::new(
            JobLogger::new("dual_mono", dir.path(), Default::default(), None).unwrap(),
        );
        let normalizer = LoudnessNormalizer::new(tool.clone()).with_logger(logger.clone());
        let target = CorrectionTarget::new(-16.0, PeakMode::Auto, true);
        normalizer.correct(&input, &output, &target).unwrap();
        logger.flush();

        let log = fs::read_to_string(logger.log_path()).unwrap();
        assert!(log.contains("[WARNING] Dual mono requested"));
        // Same single coupled loudnorm pass, no channel split.
        assert!(!tool.calls()[1].mentions("channelsplit"));
    }

    #[test]
    fn missing_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        fs::write(&input, "-20.0").unwrap();

        let tool = Arc::new(ScriptedTool::new().withhold_output_when("ffmpeg", "linear=true"));
        let normalizer = LoudnessNormalizer::new(tool);
        let target = CorrectionTarget::new(-16.0, PeakMode::Auto, false);
        let err = normalizer
            .correct(&input, &dir.path().join("out.wav"), &target)
            .unwrap_err();
        assert!(matches!(err, LoudnessError::OutputNotProduced(_)));
    }

    #[test]
    fn silent_input_is_rejected_before_second_pass() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("silence.wav");
        fs::write(&input, "-inf").unwrap();

        let tool = Arc::new(ScriptedTool::new());
        let normalizer = LoudnessNormalizer::new(tool.clone());
        let target = CorrectionTarget::new(-16.0, PeakMode::Auto, false);
        let err = normalizer
            .correct(&input, &dir.path().join("out.wav"), &target)
            .unwrap_err();

        assert!(matches!(err, LoudnessError::MeasurementParse(_)));
        assert_eq!(tool.call_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    #[ignore = "requires ffmpeg on PATH"]
    fn real_ffmpeg_round_trip() {
        use crate::tool::ProcessTool;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tone.wav");
        let output = dir.path().join("tone_norm.wav");

        let tool: Arc<dyn MediaTool> = Arc::new(ProcessTool::new().unwrap());
        let generate = ToolInvocation::new(FFMPEG, timeouts::AUDIO_RENDER)
            .args(["-y", "-hide_banner", "-f", "lavfi", "-i"])
            .arg("sine=frequency=440:sample_rate=48000:duration=10,volume=0.1")
            .args(["-ac", "2"])
            .path(&input);
        tool.run_checked(&generate).unwrap();

        let normalizer = LoudnessNormalizer::new(Arc::clone(&tool));
        let target = CorrectionTarget::new(-16.0, PeakMode::Auto, false);
        normalizer.correct(&input, &output, &target).unwrap();
        let after = normalizer.meter().measure(&output).unwrap();
        assert!(after.within(-16.0, 0.5), "landed at {}", after.integrated_lufs);
    }
}

//! Scripted media tool for tests.
//!
//! Simulates just enough of ffmpeg, ffprobe and the whisper CLI for the
//! stages to run end to end:
//! - fake media files contain their integrated loudness as text;
//! - loudnorm analysis passes print a JSON block derived from that value;
//! - linear loudnorm passes write `input + (I - measured_I)`;
//! - any other ffmpeg call copies its first input to its last argument.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::types::{ToolError, ToolInvocation, ToolOutput, ToolResult};
use super::MediaTool;

/// Loudness assumed for fake media whose content is not a number.
pub(crate) const DEFAULT_FAKE_LUFS: f64 = -23.0;

#[derive(Debug, Clone)]
enum Failure {
    Exit(i32),
    Timeout,
    NoOutput,
    Panic,
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    needle: String,
    failure: Failure,
}

/// Recording, rule-driven stand-in for the external tools.
pub(crate) struct ScriptedTool {
    calls: Mutex<Vec<ToolInvocation>>,
    rules: Mutex<Vec<Rule>>,
    duration_secs: f64,
    encoders: Vec<String>,
}

impl ScriptedTool {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            duration_secs: 10.0,
            encoders: vec!["libx264".to_string()],
        }
    }

    /// Report this duration from ffprobe.
    pub(crate) fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Advertise an extra encoder in `ffmpeg -encoders`.
    pub(crate) fn with_encoder(mut self, name: &str) -> Self {
        self.encoders.push(name.to_string());
        self
    }

    /// Exit with code 1 when `program` is called with an argument containing `needle`.
    pub(crate) fn fail_when(self, program: &str, needle: &str) -> Self {
        self.add_rule(program, needle, Failure::Exit(1))
    }

    /// Time out when `program` is called with an argument containing `needle`.
    pub(crate) fn time_out_when(self, program: &str, needle: &str) -> Self {
        self.add_rule(program, needle, Failure::Timeout)
    }

    /// Exit 0 without writing the output artifact.
    pub(crate) fn withhold_output_when(self, program: &str, needle: &str) -> Self {
        self.add_rule(program, needle, Failure::NoOutput)
    }

    /// Panic inside `run`, as a buggy tool adapter would.
    pub(crate) fn panic_when(self, program: &str, needle: &str) -> Self {
        self.add_rule(program, needle, Failure::Panic)
    }

    fn add_rule(self, program: &str, needle: &str, failure: Failure) -> Self {
        self.rules.lock().push(Rule {
            program: program.to_string(),
            needle: needle.to_string(),
            failure,
        });
        self
    }

    /// Every invocation seen so far, in order.
    pub(crate) fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Invocations whose arguments mention `needle`.
    pub(crate) fn calls_mentioning(&self, needle: &str) -> Vec<ToolInvocation> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.mentions(needle))
            .cloned()
            .collect()
    }

    fn matching_failure(&self, invocation: &ToolInvocation) -> Option<Failure> {
        self.rules
            .lock()
            .iter()
            .find(|r| r.program == invocation.program && invocation.mentions(&r.needle))
            .map(|r| r.failure.clone())
    }

    fn simulate_ffmpeg(&self, inv: &ToolInvocation, write_output: bool) -> ToolOutput {
        if inv.mentions("-encoders") {
            let listing: Vec<String> = self
                .encoders
                .iter()
                .map(|e| format!(" V....D {:<20} {} encoder", e, e))
                .collect();
            return ok(&listing.join("\n"), "");
        }
        if inv.mentions("-version") {
            return ok("ffmpeg version 6.1-scripted", "");
        }

        let input = inv.value_of("-i").map(PathBuf::from);
        let input_lufs = input.as_deref().map(read_fake_lufs).unwrap_or(DEFAULT_FAKE_LUFS);

        if inv.mentions("loudnorm=print_format=json") {
            return ok("", &loudnorm_report(input_lufs));
        }

        let Some(output) = inv.args.last().map(PathBuf::from) else {
            return ok("", "");
        };
        if write_output {
            let content = match inv.value_of("-af").and_then(linear_gain) {
                Some(gain) => format!("{:.2}", input_lufs + gain),
                None => input
                    .as_deref()
                    .and_then(|p| fs::read_to_string(p).ok())
                    .unwrap_or_else(|| "frame".to_string()),
            };
            write_artifact(&output, &content);
        }
        ok("", "size=N/A time=00:00:10.00 bitrate=N/A speed=512x")
    }

    fn simulate_whisper(&self, inv: &ToolInvocation, write_output: bool) -> ToolOutput {
        let Some(audio) = inv.args.first().map(PathBuf::from) else {
            return ToolOutput {
                status_code: Some(2),
                stdout: String::new(),
                stderr: "usage: whisper audio".to_string(),
            };
        };
        if inv.args[0].starts_with('-') {
            return ok("usage: whisper [-h] [--model MODEL] audio [audio ...]", "");
        }
        if write_output {
            let dir = inv
                .value_of("--output_dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let stem = audio
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            write_artifact(&dir.join(format!("{}.json", stem)), WHISPER_FIXTURE);
        }
        ok("Detected language: English", "")
    }
}

impl MediaTool for ScriptedTool {
    fn run(&self, invocation: &ToolInvocation) -> ToolResult<ToolOutput> {
        self.calls.lock().push(invocation.clone());

        let failure = self.matching_failure(invocation);
        match failure {
            Some(Failure::Exit(code)) => {
                return Ok(ToolOutput {
                    status_code: Some(code),
                    stdout: String::new(),
                    stderr: format!("{}: simulated failure", invocation.program),
                })
            }
            Some(Failure::Timeout) => {
                return Err(ToolError::timeout(&invocation.program, invocation.timeout))
            }
            Some(Failure::Panic) => panic!("{}: simulated panic", invocation.program),
            _ => {}
        }
        let write_output = !matches!(failure, Some(Failure::NoOutput));

        let output = match invocation.program.as_str() {
            "ffprobe" => ok(&format!("{:.6}\n", self.duration_secs), ""),
            "ffmpeg" => self.simulate_ffmpeg(invocation, write_output),
            "whisper" => self.simulate_whisper(invocation, write_output),
            other => ToolOutput {
                status_code: Some(127),
                stdout: String::new(),
                stderr: format!("{}: command not found", other),
            },
        };
        Ok(output)
    }
}

fn ok(stdout: &str, stderr: &str) -> ToolOutput {
    ToolOutput {
        status_code: Some(0),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

fn write_artifact(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = fs::write(path, content);
}

/// Integrated loudness stored in a fake media file.
pub(crate) fn read_fake_lufs(path: &Path) -> f64 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(DEFAULT_FAKE_LUFS)
}

/// Gain applied by a linear loudnorm pass: `I - measured_I`.
fn linear_gain(filter: &str) -> Option<f64> {
    let params = filter.strip_prefix("loudnorm=")?;
    let mut target = None;
    let mut measured = None;
    for pair in params.split(':') {
        match pair.split_once('=') {
            Some(("I", v)) => target = v.parse::<f64>().ok(),
            Some(("measured_I", v)) => measured = v.parse::<f64>().ok(),
            _ => {}
        }
    }
    Some(target? - measured?)
}

/// Stderr of an analysis pass, with the JSON block among log noise.
fn loudnorm_report(input_lufs: f64) -> String {
    format!(
        "Input #0, wav, from 'input.wav':\n  Duration: 00:00:10.00, bitrate: 1536 kb/s\n\
         size=N/A time=00:00:10.00 bitrate=N/A speed= 612x\n\
         [Parsed_loudnorm_0 @ 0x55d1c2a0] \n\
         {{\n\
         \t\"input_i\" : \"{:.2}\",\n\
         \t\"input_tp\" : \"{:.2}\",\n\
         \t\"input_lra\" : \"7.10\",\n\
         \t\"input_thresh\" : \"{:.2}\",\n\
         \t\"output_i\" : \"-16.02\",\n\
         \t\"output_tp\" : \"-1.50\",\n\
         \t\"output_lra\" : \"6.40\",\n\
         \t\"output_thresh\" : \"-26.20\",\n\
         \t\"normalization_type\" : \"dynamic\",\n\
         \t\"target_offset\" : \"0.02\"\n\
         }}\n\
         [out#0/null @ 0x55d1c2b0] video:0kB audio:1875kB\n",
        input_lufs,
        input_lufs + 9.5,
        input_lufs - 10.3,
    )
}

const WHISPER_FIXTURE: &str = r#"{
  "text": " Welcome back to the channel. Today we cut a short film.",
  "language": "en",
  "segments": [
    {
      "id": 0,
      "start": 0.0,
      "end": 2.4,
      "text": " Welcome back to the channel.",
      "words": [
        {"word": " Welcome", "start": 0.0, "end": 0.5},
        {"word": " back", "start": 0.5, "end": 0.8},
        {"word": " to", "start": 0.8, "end": 0.9},
        {"word": " the", "start": 0.9, "end": 1.1},
        {"word": " channel.", "start": 1.1, "end": 2.4}
      ]
    },
    {
      "id": 1,
      "start": 2.6,
      "end": 5.0,
      "text": " Today we cut a short film.",
      "words": []
    }
  ]
}"#;

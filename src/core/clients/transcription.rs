//! Transcription adapter: split a video's audio into bounded segments at
//! silence points, transcribe each segment independently, and concatenate the
//! results in exact segment order (naive append, no punctuation repair).

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::multipart;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::info;

/// Target segment length. Chosen so segments stay well under the
/// speech-to-text service's payload limit.
const TARGET_SEGMENT_SECS: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone)]
pub struct AudioProbe {
    pub duration_secs: f64,
    /// Silence midpoints in seconds, ascending.
    pub silences: Vec<f64>,
}

/// Plan cut points: prefer the latest silence at or before each target
/// boundary so segments never cut mid-sentence; fall back to a hard cut at
/// the boundary when no usable silence exists.
pub fn plan_segments(duration_secs: f64, silences: &[f64], target_secs: f64) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut start = 0.0;
    while start < duration_secs {
        let boundary = start + target_secs;
        if boundary >= duration_secs {
            segments.push(Segment {
                start,
                end: duration_secs,
            });
            break;
        }
        // Latest silence inside (start, boundary], ignoring ones so early
        // they would produce a degenerate segment.
        let cut = silences
            .iter()
            .copied()
            .filter(|s| *s > start + 1.0 && *s <= boundary)
            .fold(None::<f64>, |best, s| Some(best.map_or(s, |b| b.max(s))))
            .unwrap_or(boundary);
        segments.push(Segment { start, end: cut });
        start = cut;
    }
    segments
}

#[async_trait]
pub trait AudioSplitter: Send + Sync {
    async fn probe(&self, video: &Path) -> Result<AudioProbe>;
    /// Extract one segment's audio to a scratch file.
    async fn extract(&self, video: &Path, segment: Segment, index: usize) -> Result<PathBuf>;
}

#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<String>;
}

pub struct TranscriptionAdapter {
    splitter: Arc<dyn AudioSplitter>,
    api: Arc<dyn TranscriptionApi>,
}

impl TranscriptionAdapter {
    pub fn new(splitter: Arc<dyn AudioSplitter>, api: Arc<dyn TranscriptionApi>) -> Self {
        Self { splitter, api }
    }

    pub async fn transcribe_video(&self, video: &Path) -> Result<String> {
        let probe = self.splitter.probe(video).await?;
        let segments = plan_segments(probe.duration_secs, &probe.silences, TARGET_SEGMENT_SECS);
        info!(
            "Transcribing {} in {} segments",
            video.display(),
            segments.len()
        );

        let mut full = String::new();
        for (index, segment) in segments.into_iter().enumerate() {
            let audio_path = self.splitter.extract(video, segment, index).await?;
            let text = self
                .api
                .transcribe(&audio_path)
                .await
                .with_context(|| format!("Transcribing segment {}", index))?;
            full.push_str(&text);
            let _ = tokio::fs::remove_file(&audio_path).await;
        }
        Ok(full)
    }
}

// --- ffmpeg-backed splitter ---

pub struct FfmpegSplitter {
    scratch_dir: PathBuf,
}

impl FfmpegSplitter {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self { scratch_dir }
    }
}

async fn run_checked(cmd: &mut Command, what: &str) -> Result<std::process::Output> {
    let output = cmd.output().await.with_context(|| what.to_string())?;
    if !output.status.success() {
        return Err(anyhow!(
            "{} failed: {}",
            what,
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(output)
}

/// Parse `silencedetect` filter output into silence midpoints.
fn parse_silences(ffmpeg_stderr: &str) -> Vec<f64> {
    static START_RE: std::sync::LazyLock<Regex> =
        std::sync::LazyLock::new(|| Regex::new(r"silence_start:\s*([0-9.]+)").unwrap());
    static END_RE: std::sync::LazyLock<Regex> =
        std::sync::LazyLock::new(|| Regex::new(r"silence_end:\s*([0-9.]+)").unwrap());

    let starts: Vec<f64> = START_RE
        .captures_iter(ffmpeg_stderr)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    let ends: Vec<f64> = END_RE
        .captures_iter(ffmpeg_stderr)
        .filter_map(|c| c[1].parse().ok())
        .collect();

    starts
        .iter()
        .zip(ends.iter())
        .map(|(s, e)| (s + e) / 2.0)
        .collect()
}

#[async_trait]
impl AudioSplitter for FfmpegSplitter {
    async fn probe(&self, video: &Path) -> Result<AudioProbe> {
        let output = run_checked(
            Command::new("ffprobe").args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(video),
            "Probing video duration",
        )
        .await?;
        let duration_secs: f64 = String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .context("Parsing ffprobe duration")?;

        // silencedetect writes its findings to stderr; the null muxer
        // discards the media itself.
        let output = Command::new("ffmpeg")
            .arg("-i")
            .arg(video)
            .args(["-af", "silencedetect=noise=-30dB:d=0.5", "-f", "null", "-"])
            .output()
            .await
            .context("Detecting silences")?;
        let silences = parse_silences(&String::from_utf8_lossy(&output.stderr));

        Ok(AudioProbe {
            duration_secs,
            silences,
        })
    }

    async fn extract(&self, video: &Path, segment: Segment, index: usize) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "segment".to_string());
        let out = self.scratch_dir.join(format!("{}_{}.wav", stem, index));

        run_checked(
            Command::new("ffmpeg")
                .arg("-y")
                .arg("-i")
                .arg(video)
                .args([
                    "-ss",
                    &segment.start.to_string(),
                    "-to",
                    &segment.end.to_string(),
                    "-vn",
                    "-ar",
                    "16000",
                    "-ac",
                    "1",
                ])
                .arg(&out),
            "Extracting audio segment",
        )
        .await?;
        Ok(out)
    }
}

// --- HTTP speech-to-text client ---

pub struct WhisperClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl WhisperClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl TranscriptionApi for WhisperClient {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .text("model", "whisper-1")
            .text("language", "en")
            .text("response_format", "text")
            .part("file", part);

        let res = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Transcription API error (HTTP {}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        Ok(res.text().await?)
    }
}

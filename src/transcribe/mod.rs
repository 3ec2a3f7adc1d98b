use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::captions::{parse_vtt, MalformedCuePolicy, Normalizer, TranscriptEntry};
use crate::config::TranscriptionConfig;
use crate::output;
use crate::utils::{run_tool, spinner};

/// Speaker-diarized transcription through the whisperx CLI
pub struct WhisperxTranscriber {
    binary: String,
    settings: TranscriptionConfig,
    show_progress: bool,
}

impl WhisperxTranscriber {
    pub fn new(binary: impl Into<String>, settings: TranscriptionConfig, show_progress: bool) -> Self {
        Self {
            binary: binary.into(),
            settings,
            show_progress,
        }
    }

    /// Caption file whisperx writes for `audio` into `out_dir`
    pub fn vtt_path(audio: &Path, out_dir: &Path) -> Result<PathBuf> {
        let stem = audio
            .file_stem()
            .context("Audio path has no file name")?;
        let mut name = stem.to_os_string();
        name.push(".vtt");
        Ok(out_dir.join(name))
    }

    /// whisperx command line for `audio`
    pub fn args(&self, audio: &Path, out_dir: &Path) -> Vec<OsString> {
        let s = &self.settings;
        let mut args: Vec<OsString> = Vec::new();

        if let Some(token) = &s.hf_token {
            args.push("--hf_token".into());
            args.push(token.into());
        }
        args.push("--model".into());
        args.push(s.model.as_str().into());
        args.push("--language".into());
        args.push(s.language.as_str().into());
        if s.diarize {
            args.push("--diarize".into());
            args.push("--min_speakers".into());
            args.push(s.min_speakers.to_string().into());
            args.push("--max_speakers".into());
            args.push(s.max_speakers.to_string().into());
        }
        args.push("--compute_type".into());
        args.push(s.compute_type.as_str().into());
        args.push("--output_dir".into());
        args.push(out_dir.as_os_str().to_owned());
        args.push("--print_progress".into());
        args.push("True".into());
        args.push(audio.as_os_str().to_owned());

        args
    }

    /// Transcribe `audio` into a WebVTT file in `out_dir`, unless it is already
    /// there. Other whisperx outputs for the same audio are removed.
    pub async fn transcribe(&self, audio: &Path, out_dir: &Path) -> Result<PathBuf> {
        let vtt = Self::vtt_path(audio, out_dir)?;

        if vtt.exists() {
            tracing::debug!("Captions already present: {}", vtt.display());
        } else {
            if self.settings.diarize && self.settings.hf_token.is_none() {
                tracing::warn!("No Hugging Face token configured; whisperx diarization will likely fail");
            }

            fs_err::create_dir_all(out_dir)?;
            tracing::info!("Transcribing {} with whisperx ({})", audio.display(), self.settings.model);
            let progress = spinner("Transcribing with whisperx...", self.show_progress);

            run_tool(&self.binary, self.args(audio, out_dir))
                .await
                .context("Transcription failed")?;

            progress.finish_with_message("Transcription completed!");
        }

        remove_extra_outputs(audio, out_dir)?;

        if !vtt.exists() {
            anyhow::bail!("whisperx produced no captions at {}", vtt.display());
        }
        Ok(vtt)
    }
}

/// Delete `<stem>.*` files other than the `.vtt` captions
fn remove_extra_outputs(audio: &Path, out_dir: &Path) -> Result<()> {
    let Some(stem) = audio.file_stem().and_then(|s| s.to_str()) else {
        return Ok(());
    };
    if !out_dir.exists() {
        return Ok(());
    }

    for entry in fs_err::read_dir(out_dir)? {
        let path = entry?.path();
        let same_stem = path.file_stem().and_then(|s| s.to_str()) == Some(stem);
        let is_vtt = path.extension().and_then(|e| e.to_str()) == Some("vtt");
        if same_stem && !is_vtt && path.is_file() {
            tracing::debug!("Removing {}", path.display());
            fs_err::remove_file(&path)?;
        }
    }

    Ok(())
}

/// Convert a WebVTT caption file into a JSON transcript
pub fn convert_captions(vtt: &Path, json: &Path, policy: MalformedCuePolicy) -> Result<Vec<TranscriptEntry>> {
    let content = fs_err::read_to_string(vtt)?;
    let cues = parse_vtt(&content)
        .with_context(|| format!("Failed to parse {}", vtt.display()))?;
    let entries = Normalizer::new(policy)
        .normalize(&cues)
        .with_context(|| format!("Failed to convert {}", vtt.display()))?;

    output::write_json(json, &entries)?;
    tracing::info!("Wrote {} transcript entries to {}", entries.len(), json.display());

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn transcriber(hf_token: Option<&str>) -> WhisperxTranscriber {
        let mut settings = crate::config::Config::default().transcription;
        settings.hf_token = hf_token.map(str::to_string);
        WhisperxTranscriber::new("whisperx", settings, false)
    }

    #[test]
    fn test_args() {
        let args: Vec<String> = transcriber(Some("hf_abc"))
            .args(Path::new("audio/debate.mp3"), Path::new("out"))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(&args[..2], &["--hf_token", "hf_abc"]);
        assert!(args.windows(2).any(|w| w == ["--model", "large-v2"]));
        assert!(args.windows(2).any(|w| w == ["--language", "pt"]));
        assert!(args.windows(2).any(|w| w == ["--min_speakers", "2"]));
        assert!(args.windows(2).any(|w| w == ["--max_speakers", "4"]));
        assert!(args.windows(2).any(|w| w == ["--compute_type", "int8"]));
        assert!(args.contains(&"--diarize".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("audio/debate.mp3"));
    }

    #[test]
    fn test_args_without_token() {
        let args = transcriber(None).args(Path::new("a.mp3"), Path::new("out"));
        assert!(!args.iter().any(|a| a == "--hf_token"));
    }

    #[tokio::test]
    async fn test_existing_captions_are_reused_and_extras_removed() {
        let dir = TempDir::new().unwrap();
        for name in ["debate.vtt", "debate.srt", "debate.json", "debate.txt", "other.srt"] {
            fs_err::write(dir.path().join(name), b"").unwrap();
        }

        let vtt = transcriber(None)
            .transcribe(Path::new("audio/debate.mp3"), dir.path())
            .await
            .unwrap();

        assert_eq!(vtt, dir.path().join("debate.vtt"));
        assert!(vtt.exists());
        assert!(!dir.path().join("debate.srt").exists());
        assert!(!dir.path().join("debate.json").exists());
        assert!(!dir.path().join("debate.txt").exists());
        assert!(dir.path().join("other.srt").exists());
    }

    #[test]
    fn test_convert_captions() {
        let dir = TempDir::new().unwrap();
        let vtt = dir.path().join("d.vtt");
        let json = dir.path().join("d.json");
        fs_err::write(
            &vtt,
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n[SPEAKER_00]: Olá\n\n00:00:02.000 --> 00:00:03.000\n[SPEAKER_00]: Olá\n",
        )
        .unwrap();

        let entries = convert_captions(&vtt, &json, MalformedCuePolicy::Abort).unwrap();
        assert_eq!(entries.len(), 1);

        let written = fs_err::read_to_string(&json).unwrap();
        assert!(written.contains("\"speaker\": \"[SPEAKER_00]\""));
        assert!(written.contains("Olá"));
    }
}

use async_process::Command;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to launch frame extractor: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("frame extractor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("frame extractor produced no output at {0}")]
    NoOutput(String),
}

/// Writes a single still image taken from `source` to `dest`.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn generate_preview(&self, source: &Path, dest: &Path) -> Result<(), ExtractError>;
}

/// Frame extractor backed by the `ffmpeg` binary.
pub struct FfmpegExtractor {
    pub bin: String,
    pub seek: String,
    pub width: u32,
    pub quality: u8,
}

impl FfmpegExtractor {
    pub fn new(bin: impl Into<String>, seek: impl Into<String>, width: u32) -> Self {
        Self {
            bin: bin.into(),
            seek: seek.into(),
            width,
            quality: 2,
        }
    }

    pub fn args(&self, source: &Path, dest: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            self.seek.clone(),
            "-i".to_string(),
            source.to_string_lossy().into_owned(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:-1", self.width), // keep aspect ratio
            "-q:v".to_string(),
            self.quality.to_string(),
            dest.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn generate_preview(&self, source: &Path, dest: &Path) -> Result<(), ExtractError> {
        let args = self.args(source, dest);
        debug!("Running {} {}", self.bin, args.join(" "));

        let output = Command::new(&self.bin).args(&args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Failed {
                status: output.status.to_string(),
                stderr: stderr.trim().lines().last().unwrap_or_default().to_string(),
            });
        }

        if tokio::fs::metadata(dest).await.is_err() {
            return Err(ExtractError::NoOutput(dest.display().to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn ffmpeg_arguments_follow_the_fixed_template() {
        let extractor = FfmpegExtractor::new("ffmpeg", "00:00:01", 320);
        let args = extractor.args(
            &PathBuf::from("/data/videos/a.mp4"),
            &PathBuf::from("/data/thumbs/a.jpg"),
        );

        assert_eq!(
            args,
            [
                "-y",
                "-ss",
                "00:00:01",
                "-i",
                "/data/videos/a.mp4",
                "-frames:v",
                "1",
                "-vf",
                "scale=320:-1",
                "-q:v",
                "2",
                "/data/thumbs/a.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FfmpegExtractor::new("/nonexistent/ffmpeg-binary", "00:00:01", 320);

        let err = extractor
            .generate_preview(&dir.path().join("in.mp4"), &dir.path().join("out.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FfmpegExtractor::new("false", "00:00:01", 320);

        let err = extractor
            .generate_preview(&dir.path().join("in.mp4"), &dir.path().join("out.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Failed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_without_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FfmpegExtractor::new("true", "00:00:01", 320);

        let err = extractor
            .generate_preview(&dir.path().join("in.mp4"), &dir.path().join("out.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoOutput(_)));
    }
}

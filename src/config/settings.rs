use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub struct Config {
    pub data_path: String,
    pub videos_dir: String,
    pub thumbs_dir: String,
    pub catalog_path: String,
    pub host: String,
    pub port: u16,
    pub ffmpeg_bin: String,
    pub thumbnail_width: u32,
    pub thumbnail_seek: String,
    pub content_type: String,
    pub stream_chunk_size: usize,
    pub thumbnail_prewarm: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_path = env::var("DATA_PATH").unwrap_or(".".to_string());
        let videos_dir = format!("{}/videos", data_path);
        let thumbs_dir = format!("{}/thumbs", data_path);
        let catalog_path =
            env::var("CATALOG_PATH").unwrap_or(format!("{}/videos.json", data_path));

        let host = env::var("WEBSERVER_HOST").unwrap_or("127.0.0.1".to_string());
        let port = parse_var("WEBSERVER_PORT", 3001)?;

        let ffmpeg_bin = env::var("FFMPEG_BIN").unwrap_or("ffmpeg".to_string());
        let thumbnail_width = parse_var("THUMBNAIL_WIDTH", 320)?;
        let thumbnail_seek = env::var("THUMBNAIL_SEEK").unwrap_or("00:00:01".to_string());

        let content_type = env::var("VIDEO_CONTENT_TYPE").unwrap_or("video/mp4".to_string());
        let stream_chunk_size = parse_var("STREAM_CHUNK_SIZE", 1024 * 1024)?;
        if stream_chunk_size == 0 {
            anyhow::bail!("STREAM_CHUNK_SIZE must be greater than zero");
        }
        let thumbnail_prewarm = parse_var("THUMBNAIL_PREWARM", false)?;

        Ok(Self {
            data_path,
            videos_dir,
            thumbs_dir,
            catalog_path,
            host,
            port,
            ffmpeg_bin,
            thumbnail_width,
            thumbnail_seek,
            content_type,
            stream_chunk_size,
            thumbnail_prewarm,
        })
    }

    pub fn videos_path(&self) -> PathBuf {
        PathBuf::from(&self.videos_dir)
    }

    pub fn thumbs_path(&self) -> PathBuf {
        PathBuf::from(&self.thumbs_dir)
    }

    pub fn catalog_file(&self) -> &Path {
        Path::new(&self.catalog_path)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default_when_unset() {
        let port: u16 = parse_var("VIDSERVE_TEST_UNSET_PORT", 3001).unwrap();
        assert_eq!(port, 3001);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        env::set_var("VIDSERVE_TEST_BAD_PORT", "not-a-port");
        let err = parse_var::<u16>("VIDSERVE_TEST_BAD_PORT", 3001).unwrap_err();
        assert!(err.to_string().contains("VIDSERVE_TEST_BAD_PORT"));
    }
}

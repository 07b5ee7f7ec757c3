//! Recognition through a locally installed engine executable. The image is
//! piped to the engine as PNG and the text is read back from its stdout.

use super::{encode_png, BackendError, EngineStatus, Language, Recognizer};
use crate::config::{LocalSettings, ENGINE_BINARY};
use async_trait::async_trait;
use image::DynamicImage;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Runs the engine binary once per request
#[derive(Debug, Clone)]
pub struct LocalRecognizer {
    binary: PathBuf,
}

impl LocalRecognizer {
    pub fn new(binary: PathBuf) -> Self {
        LocalRecognizer { binary }
    }

    /// Resolve the engine location from settings and check the system
    pub fn from_settings(settings: &LocalSettings) -> Self {
        let binary = resolve_binary(settings);
        info!("using local OCR engine at {}", binary.display());
        Self::new(binary)
    }
}

/// Pick the engine executable: the configured path, then `tesseract` on
/// `PATH`, then the first fallback install location that exists. When
/// nothing is found the bare name is kept so requests report
/// `EngineNotFound`.
pub fn resolve_binary(settings: &LocalSettings) -> PathBuf {
    if let Some(binary) = &settings.binary {
        return binary.clone();
    }

    if engine_version(Path::new(ENGINE_BINARY)).is_ok() {
        return PathBuf::from(ENGINE_BINARY);
    }

    match settings.fallback_paths.iter().find(|path| path.is_file()) {
        Some(path) => path.clone(),
        None => {
            warn!("{ENGINE_BINARY} not found on PATH or in fallback locations");
            PathBuf::from(ENGINE_BINARY)
        }
    }
}

fn spawn_error(binary: &Path, err: io::Error) -> BackendError {
    match err.kind() {
        io::ErrorKind::NotFound => BackendError::EngineNotFound(binary.display().to_string()),
        _ => BackendError::EngineError(format!(
            "failed to start {}: {err}",
            binary.display()
        )),
    }
}

/// Ask the engine for its version. Used both for discovery and `/health`.
pub fn engine_version(binary: &Path) -> Result<String, BackendError> {
    let output = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(binary, e))?;

    if !output.status.success() {
        return Err(BackendError::EngineError(format!(
            "{} --version exited with {}",
            binary.display(),
            output.status
        )));
    }

    // Older engine releases print the banner on stderr
    let banner = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    Ok(banner
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string())
}

/// Run `<binary> stdin stdout -l <language>` with `png` on stdin
pub fn run_engine(binary: &Path, png: &[u8], language: Language) -> Result<String, BackendError> {
    let mut child = Command::new(binary)
        .args(["stdin", "stdout", "-l", language.code()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(binary, e))?;

    let stdin = child.stdin.take();

    // Feed stdin from its own thread while this one drains stdout and
    // stderr, so an engine that talks before it reads cannot fill a pipe
    let (written, output) = thread::scope(|scope| {
        let writer = scope.spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(png),
            None => Ok(()),
        });
        let output = child.wait_with_output();
        (writer.join(), output)
    });

    let output =
        output.map_err(|e| BackendError::EngineError(format!("engine did not finish: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BackendError::EngineError(format!(
            "engine exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    // An engine that exits cleanly without reading everything closes the
    // pipe early; only other write failures matter
    match written {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => {
            return Err(BackendError::EngineError(format!(
                "failed to send image to engine: {e}"
            )))
        }
        Err(_) => {
            return Err(BackendError::EngineError(
                "image writer thread panicked".to_string(),
            ))
        }
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[async_trait]
impl Recognizer for LocalRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(
        &self,
        image: Arc<DynamicImage>,
        language: Language,
    ) -> Result<String, BackendError> {
        let png = encode_png(image).await?;
        let binary = self.binary.clone();

        debug!("running {} on {} bytes ({language})", binary.display(), png.len());

        tokio::task::spawn_blocking(move || run_engine(&binary, &png, language))
            .await
            .map_err(|e| BackendError::EngineError(format!("engine task failed: {e}")))?
    }

    async fn engine_status(&self) -> EngineStatus {
        let binary = self.binary.clone();
        let installed = tokio::task::spawn_blocking(move || engine_version(&binary))
            .await
            .map(|version| version.is_ok())
            .unwrap_or(false);

        EngineStatus {
            key: "tesseract",
            value: if installed { "installed" } else { "not found" }.to_string(),
        }
    }
}

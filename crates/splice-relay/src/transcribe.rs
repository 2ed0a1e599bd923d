//! `POST /transcribe` - upload, transcode, transcribe and align a video
//!
//! ```text
//!  upload ──► staging/v ─┬─► ffmpeg (fast-seek re-encode) ──► uploads/{name}.mp4
//!                        └─► ffmpeg 16 kHz wav ─► speech-to-text ─► aligner ──► uploads/{name}.json
//! ```
//!
//! Both branches run concurrently; the response is `name` once both finish.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use splice_core::AlignmentResult;
use thiserror::Error;
use tokio::process::Command;

use crate::app::AppState;
use crate::config::RelayConfig;

/// Aligner job states that mean "keep polling"
const PENDING_STATES: [&str; 4] = ["STARTED", "ENCODING", "TRANSCRIBING", "ALIGNING"];

#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Request has no 'video' field")]
    MissingVideo,

    #[error("Malformed upload: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Command { program: String, status: String },

    #[error("Aligner request failed: {0}")]
    Aligner(#[from] reqwest::Error),

    #[error("Aligner answered {0} instead of a redirect")]
    NoRedirect(u16),

    #[error("Aligner URL invalid: {0}")]
    AlignerUrl(String),

    #[error("Alignment finished with status {0}")]
    AlignmentStatus(String),

    #[error("Aligner returned an invalid alignment: {0}")]
    InvalidAlignment(#[from] serde_json::Error),
}

impl IntoResponse for TranscribeError {
    fn into_response(self) -> Response {
        let status = match self {
            TranscribeError::MissingVideo | TranscribeError::Upload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Upload name: the UTC time of the request
pub fn upload_name(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

pub async fn handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<String, TranscribeError> {
    let mut video = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TranscribeError::Upload(e.to_string()))?
    {
        if field.name() == Some("video") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| TranscribeError::Upload(e.to_string()))?;
            video = Some(bytes);
        }
    }
    let video = video.ok_or(TranscribeError::MissingVideo)?;
    log::info!("transcribe: received video ({} bytes)", video.len());

    let name = upload_name(chrono::Utc::now());
    match transcribe(&state.config, &state.aligner, &name, video).await {
        Ok(()) => {
            log::info!("transcribe: {} ready", name);
            Ok(name)
        }
        Err(e) => {
            log::error!("transcribe: {} failed: {}", name, e);
            Err(e)
        }
    }
}

/// Run the full pipeline for one upload
pub async fn transcribe(
    config: &RelayConfig,
    aligner: &Client,
    name: &str,
    video: Bytes,
) -> Result<(), TranscribeError> {
    let staging = tempfile::tempdir()?;
    let input = staging.path().join("v");
    tokio::fs::write(&input, &video).await?;

    let video_out = config.upload_dir.join(format!("{}.mp4", name));
    let (encoded, aligned) = tokio::join!(
        reencode(config, &input, &video_out),
        transcribe_and_align(config, aligner, staging.path(), &input, name, video.clone()),
    );
    encoded?;
    aligned
}

/// Re-encode with every frame a keyframe so seeking is instant
async fn reencode(config: &RelayConfig, input: &Path, output: &Path) -> Result<(), TranscribeError> {
    run(
        &config.ffmpeg,
        &[
            OsStr::new("-y"),
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-tune"),
            OsStr::new("fastdecode"),
            OsStr::new("-g"),
            OsStr::new("1"),
            OsStr::new("-crf"),
            OsStr::new("30"),
            output.as_os_str(),
        ],
    )
    .await
    .map(|_| ())
}

async fn transcribe_and_align(
    config: &RelayConfig,
    aligner: &Client,
    staging: &Path,
    input: &Path,
    name: &str,
    video: Bytes,
) -> Result<(), TranscribeError> {
    let audio = staging.join("a.wav");
    run(
        &config.ffmpeg,
        &[
            OsStr::new("-y"),
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-ar"),
            OsStr::new("16000"),
            audio.as_os_str(),
        ],
    )
    .await?;

    let args = config
        .speech_to_text
        .args_for(&audio.to_string_lossy());
    let arg_refs: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
    let transcript = run(&config.speech_to_text.command, &arg_refs).await?;
    log::info!("transcribe: {} speech-to-text produced {} bytes", name, transcript.len());

    let alignment = align(aligner, &config.aligner_url, video, transcript, config.status_poll_ms).await?;
    let path: PathBuf = config.upload_dir.join(format!("{}.json", name));
    tokio::fs::write(&path, alignment).await?;
    Ok(())
}

/// Run a program to completion and return its stdout
pub async fn run(program: &Path, args: &[&OsStr]) -> Result<Vec<u8>, TranscribeError> {
    let display = program.display().to_string();
    log::debug!("run: {} {:?}", display, args);
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| TranscribeError::Spawn {
            program: display.clone(),
            source,
        })?;
    if !output.status.success() {
        log::warn!(
            "run: {} failed: {}",
            display,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Err(TranscribeError::Command {
            program: display,
            status: output.status.to_string(),
        });
    }
    Ok(output.stdout)
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    status: String,
}

/// Submit audio + transcript to the aligner and wait for the alignment JSON
///
/// The aligner answers the submission with a redirect to the job; the
/// client passed in must not follow redirects.
pub async fn align(
    client: &Client,
    aligner_url: &str,
    audio: Bytes,
    transcript: Vec<u8>,
    poll_ms: u64,
) -> Result<String, TranscribeError> {
    let base = Url::parse(aligner_url).map_err(|e| TranscribeError::AlignerUrl(e.to_string()))?;
    let submit = base
        .join("transcriptions")
        .map_err(|e| TranscribeError::AlignerUrl(e.to_string()))?;

    let form = Form::new()
        .part("audio", Part::bytes(audio.to_vec()).file_name("audio"))
        .part("transcript", Part::bytes(transcript).file_name("transcript"));
    let response = client.post(submit).multipart(form).send().await?;
    if response.status() != reqwest::StatusCode::FOUND {
        return Err(TranscribeError::NoRedirect(response.status().as_u16()));
    }
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| TranscribeError::AlignerUrl("redirect without location".to_string()))?;
    let job = base
        .join(location)
        .map_err(|e| TranscribeError::AlignerUrl(e.to_string()))?;
    let job_file = |file: &str| -> Result<Url, TranscribeError> {
        Url::parse(&format!("{}/{}", job.as_str().trim_end_matches('/'), file))
            .map_err(|e| TranscribeError::AlignerUrl(e.to_string()))
    };

    let status_url = job_file("status.json")?;
    log::info!("align: polling {}", status_url);
    let status = loop {
        let status: JobStatus = client.get(status_url.clone()).send().await?.json().await?;
        if !PENDING_STATES.contains(&status.status.as_str()) {
            break status.status;
        }
        tokio::time::sleep(Duration::from_millis(poll_ms)).await;
    };
    if status != "OK" {
        return Err(TranscribeError::AlignmentStatus(status));
    }

    let alignment = client.get(job_file("align.json")?).send().await?.text().await?;
    AlignmentResult::from_json(&alignment)?;
    Ok(alignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::routing::{get, post};
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const ALIGNMENT: &str = r#"{"transcript":"Hi","words":[{"case":"success","word":"Hi","alignedWord":"hi","start":0.1,"end":0.4,"startOffset":0,"endOffset":2,"phones":[]}]}"#;

    /// Aligner stand-in: reports ALIGNING once, then `final_status`
    async fn spawn_aligner(final_status: &'static str) -> String {
        let polls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/transcriptions",
                post(|| async { (StatusCode::FOUND, [(header::LOCATION, "/transcriptions/42")]) }),
            )
            .route(
                "/transcriptions/42/status.json",
                get(move || {
                    let polls = polls.clone();
                    async move {
                        let status = if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                            "ALIGNING"
                        } else {
                            final_status
                        };
                        format!(r#"{{"status":"{}"}}"#, status)
                    }
                }),
            )
            .route("/transcriptions/42/align.json", get(|| async { ALIGNMENT }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn no_redirect_client() -> Client {
        Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_align_polls_until_ok() {
        let url = spawn_aligner("OK").await;
        let alignment = align(
            &no_redirect_client(),
            &url,
            Bytes::from_static(b"audio"),
            b"Hi".to_vec(),
            1,
        )
        .await
        .unwrap();
        assert_eq!(alignment, ALIGNMENT);
    }

    #[tokio::test]
    async fn test_align_reports_failed_job() {
        let url = spawn_aligner("FAILED").await;
        let result = align(&no_redirect_client(), &url, Bytes::new(), Vec::new(), 1).await;
        assert!(matches!(result, Err(TranscribeError::AlignmentStatus(s)) if s == "FAILED"));
    }

    #[tokio::test]
    async fn test_run_reports_exit_status() {
        assert_eq!(
            run(Path::new("echo"), &[OsStr::new("hello")]).await.unwrap(),
            b"hello\n"
        );
        assert!(matches!(
            run(Path::new("false"), &[]).await,
            Err(TranscribeError::Command { .. })
        ));
        assert!(matches!(
            run(Path::new("/nonexistent/splice-stt"), &[]).await,
            Err(TranscribeError::Spawn { .. })
        ));
    }

    #[test]
    fn test_upload_name_is_utc_timestamp() {
        use chrono::TimeZone;
        let t = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(upload_name(t), "2024-05-01T10:00:00.000000");
    }
}

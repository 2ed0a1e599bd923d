//! HTTP side of the relay: media download and video upload

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use splice_core::media::{LoadedMedia, MediaError, MediaResult};

/// Fetches `{url}.mp4` / `{url}.json` pairs and submits uploads
#[derive(Clone)]
pub struct MediaFetcher {
    client: Client,
    base: Url,
}

/// Derive the relay's HTTP origin from its websocket URL
///
/// `ws://host:8080/ws` becomes `http://host:8080/`.
pub fn http_base(server_url: &str) -> Result<Url, String> {
    let mut url = Url::parse(server_url).map_err(|e| format!("{}: {}", server_url, e))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => return Err(format!("unsupported scheme {}", other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| format!("cannot rewrite scheme of {}", server_url))?;
    url.set_path("/");
    url.set_query(None);
    Ok(url)
}

fn request_error(url: &Url, e: reqwest::Error) -> MediaError {
    MediaError::Request {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

impl MediaFetcher {
    pub fn new(server_url: &str) -> Result<Self, String> {
        Ok(Self {
            client: Client::new(),
            base: http_base(server_url)?,
        })
    }

    fn resolve(&self, path: &str) -> MediaResult<Url> {
        self.base.join(path).map_err(|e| MediaError::Request {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    async fn get(&self, url: Url) -> MediaResult<reqwest::Response> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;
        if !response.status().is_success() {
            return Err(MediaError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// Download and decode the media and alignment for a video base URL
    pub async fn fetch(&self, url: &str) -> MediaResult<LoadedMedia> {
        let media_url = self.resolve(&format!("{}.mp4", url))?;
        let alignment_url = self.resolve(&format!("{}.json", url))?;
        log::info!("Fetching {}", media_url);

        let (media, alignment) = tokio::try_join!(
            async {
                let response = self.get(media_url.clone()).await?;
                response
                    .bytes()
                    .await
                    .map_err(|e| request_error(&media_url, e))
            },
            async {
                let response = self.get(alignment_url.clone()).await?;
                response
                    .text()
                    .await
                    .map_err(|e| request_error(&alignment_url, e))
            },
        )?;

        let base = url.to_string();
        tokio::task::spawn_blocking(move || LoadedMedia::prepare(&base, media.to_vec(), &alignment))
            .await
            .map_err(|e| MediaError::Request {
                url: url.to_string(),
                reason: format!("decode task failed: {}", e),
            })?
    }

    /// Upload a video for transcription; returns the new video's base URL
    pub async fn upload(&self, path: &Path) -> MediaResult<String> {
        let url = self.resolve("transcribe")?;
        let bytes = tokio::fs::read(path).await.map_err(|e| MediaError::Request {
            url: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        log::info!("Uploading {} ({} bytes)", file_name, bytes.len());

        let form = Form::new().part("video", Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;
        if !response.status().is_success() {
            return Err(MediaError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let name = response.text().await.map_err(|e| request_error(&url, e))?;
        Ok(format!("/uploads/{}", name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_base() {
        assert_eq!(
            http_base("ws://localhost:8080/ws").unwrap().as_str(),
            "http://localhost:8080/"
        );
        assert_eq!(
            http_base("wss://relay.example.org/ws?x=1").unwrap().as_str(),
            "https://relay.example.org/"
        );
        assert!(http_base("ftp://nope").is_err());
        assert!(http_base("not a url").is_err());
    }

    #[test]
    fn test_resolve_upload_path() {
        let fetcher = MediaFetcher::new("ws://localhost:8080/ws").unwrap();
        let url = fetcher.resolve("/uploads/2024-05-01T10:00:00.mp4").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/uploads/2024-05-01T10:00:00.mp4");
    }
}

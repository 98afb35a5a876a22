use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{StatusCode, Url};

use crate::shared::constants::{FALLBACK_DOWNLOAD_BYTES, FREE_SPACE_MARGIN, VIDEO_EXTENSIONS};
use crate::shared::download::{stream_to_file, ProgressFn};
use crate::source::domain::video_fetcher::{FetchError, FetchedVideo, VideoFetcher};
use crate::source::infrastructure::file_name::sanitize_file_stem;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EXTENSION: &str = "mp4";

/// Downloads videos over plain HTTP(S) into a fixed directory.
pub struct HttpVideoFetcher {
    client: Client,
    download_dir: PathBuf,
    free_space_margin: f64,
    progress: Option<ProgressFn>,
}

/// What the preflight request told us about the remote file.
#[derive(Debug, Clone, PartialEq)]
struct RemoteInfo {
    file_name: String,
    content_length: Option<u64>,
    /// False when the server refused HEAD; the GET headers decide then.
    verified: bool,
}

impl RemoteInfo {
    fn from_headers(url: &Url, headers: &HeaderMap) -> Result<Self, FetchError> {
        let content_length = video_content_length(url, headers)?;
        let content_type = header_str(headers, CONTENT_TYPE).map(|v| v.to_ascii_lowercase());
        let title = header_str(headers, CONTENT_DISPOSITION)
            .and_then(disposition_file_name)
            .unwrap_or_else(|| url_title(url));
        Ok(Self {
            file_name: file_name_for(&title, content_type.as_deref()),
            content_length,
            verified: true,
        })
    }

    fn from_url(url: &Url) -> Self {
        Self {
            file_name: file_name_for(&url_title(url), None),
            content_length: None,
            verified: false,
        }
    }
}

impl HttpVideoFetcher {
    pub fn new(download_dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| FetchError::Other(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            download_dir: download_dir.into(),
            free_space_margin: FREE_SPACE_MARGIN,
            progress: None,
        })
    }

    pub fn with_free_space_margin(mut self, margin: f64) -> Self {
        self.free_space_margin = margin;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn preflight(&self, url: &Url) -> Result<RemoteInfo, FetchError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .map_err(|e| FetchError::Other(format!("request failed: {e}")))?;
        if rejects_head(response.status()) {
            log::debug!("{url} answered HEAD with {}, checking on GET", response.status());
            return Ok(RemoteInfo::from_url(url));
        }
        check_status(response.status())?;
        RemoteInfo::from_headers(url, response.headers())
    }

    fn ensure_space(&self, content_length: Option<u64>) -> Result<(), FetchError> {
        let expected = content_length.unwrap_or(FALLBACK_DOWNLOAD_BYTES);
        let needed = (expected as f64 * self.free_space_margin).ceil() as u64;
        let available = fs4::available_space(&self.download_dir)
            .map_err(|e| FetchError::Other(format!("cannot query free space: {e}")))?;
        if available < needed {
            return Err(FetchError::InsufficientStorage { needed, available });
        }
        Ok(())
    }
}

impl VideoFetcher for HttpVideoFetcher {
    fn fetch(&self, locator: &str) -> Result<FetchedVideo, FetchError> {
        let url = Url::parse(locator).map_err(|_| FetchError::NotFound)?;
        let info = self.preflight(&url)?;

        let dest = self.download_dir.join(&info.file_name);
        if dest.is_file() {
            log::info!("Reusing {}", dest.display());
            return Ok(FetchedVideo {
                path: dest,
                created: false,
            });
        }

        fs::create_dir_all(&self.download_dir).map_err(|e| {
            FetchError::Other(format!(
                "cannot create {}: {e}",
                self.download_dir.display()
            ))
        })?;
        if info.verified {
            self.ensure_space(info.content_length)?;
        }

        log::info!("Downloading {url} to {}", dest.display());
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| FetchError::Other(format!("request failed: {e}")))?;
        check_status(response.status())?;
        if !info.verified {
            let content_length = video_content_length(&url, response.headers())?;
            self.ensure_space(content_length)?;
        }

        let bytes = stream_to_file(response, &dest, self.progress.as_ref())
            .map_err(|e| FetchError::Other(format!("download interrupted: {e}")))?;
        if bytes == 0 {
            let _ = fs::remove_file(&dest);
            return Err(FetchError::Unplayable);
        }
        Ok(FetchedVideo {
            path: dest,
            created: true,
        })
    }
}

/// Statuses some servers (signed object-store URLs among them) give to
/// HEAD while still serving GET.
fn rejects_head(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED | StatusCode::FORBIDDEN
    )
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(FetchError::NotFound),
        s => Err(FetchError::Other(format!("server answered {s}"))),
    }
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Rejects empty or non-video responses; returns the advertised length.
fn video_content_length(url: &Url, headers: &HeaderMap) -> Result<Option<u64>, FetchError> {
    let content_length = header_str(headers, CONTENT_LENGTH).and_then(|v| v.parse().ok());
    if content_length == Some(0) {
        return Err(FetchError::Unplayable);
    }
    if let Some(ct) = header_str(headers, CONTENT_TYPE) {
        let ct = ct.to_ascii_lowercase();
        if !is_video_content_type(&ct) {
            log::warn!("{url} serves {ct}, not a video");
            return Err(FetchError::Unplayable);
        }
    }
    Ok(content_length)
}

fn is_video_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    mime.starts_with("video/")
        || mime == "application/octet-stream"
        || mime == "binary/octet-stream"
        || mime == "application/mp4"
}

/// Extracts the file name from a `Content-Disposition` value, preferring
/// the RFC 5987 `filename*=` form.
fn disposition_file_name(value: &str) -> Option<String> {
    let params: Vec<(&str, &str)> = value
        .split(';')
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();

    let extended = params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("filename*"))
        .and_then(|(_, v)| v.split_once("''"))
        .map(|(_, encoded)| percent_decode(encoded));
    let plain = || {
        params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("filename"))
            .map(|(_, v)| v.trim_matches('"').to_string())
    };

    extended
        .or_else(plain)
        .map(|name| file_name_only(&name).to_string())
        .filter(|name| !name.is_empty())
}

/// Last non-empty path segment, else the host.
fn url_title(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(percent_decode)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Strips any directory components a server might smuggle into a name.
fn file_name_only(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Builds `<stem>.<ext>` from a remote title.
///
/// The extension is kept when it names a known video container, otherwise
/// it is derived from the content type, falling back to mp4.
fn file_name_for(title: &str, content_type: Option<&str>) -> String {
    let (stem, ext) = match title.rsplit_once('.') {
        Some((stem, ext)) if is_video_extension(ext) => (stem, Some(ext.to_ascii_lowercase())),
        _ => (title, None),
    };
    let ext = ext
        .or_else(|| content_type.and_then(extension_for_content_type))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{}.{ext}", sanitize_file_stem(stem))
}

fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext))
}

fn extension_for_content_type(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim();
    let ext = match mime {
        "video/mp4" | "application/mp4" => "mp4",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/x-m4v" => "m4v",
        _ => return None,
    };
    Some(ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Route, TestServer};
    use rstest::rstest;
    use std::collections::HashMap;
    use std::path::Path;

    const BODY: &[u8] = b"not really an mp4 but bytes are bytes";

    fn server() -> TestServer {
        TestServer::start(HashMap::from([
            (
                "/videos/holiday.mp4".to_string(),
                Route::ok("video/mp4", BODY),
            ),
            (
                "/watch".to_string(),
                Route::ok("video/webm", BODY)
                    .with_header(
                        "Content-Disposition",
                        "attachment; filename*=UTF-8''Caf%C3%A9%20Night.webm",
                    ),
            ),
            (
                "/page.html".to_string(),
                Route::ok("text/html; charset=utf-8", b"<html></html>"),
            ),
            ("/empty.mp4".to_string(), Route::ok("video/mp4", b"")),
            (
                "/signed/clip.mp4".to_string(),
                Route::ok("video/mp4", BODY).rejecting_head(405),
            ),
            (
                "/signed/unsupported.mp4".to_string(),
                Route::ok("video/mp4", BODY).rejecting_head(501),
            ),
            (
                "/signed/forbidden.mp4".to_string(),
                Route::ok("video/mp4", BODY).rejecting_head(403),
            ),
            (
                "/signed/page".to_string(),
                Route::ok("text/html", b"<html></html>").rejecting_head(405),
            ),
            ("/gone.mp4".to_string(), Route::status(410)),
            ("/broken.mp4".to_string(), Route::status(500)),
        ]))
    }

    fn fetcher(dir: &Path) -> HttpVideoFetcher {
        HttpVideoFetcher::new(dir).unwrap()
    }

    #[test]
    fn test_downloads_into_directory() {
        let server = server();
        let dir = tempfile::tempdir().unwrap();

        let fetched = fetcher(dir.path())
            .fetch(&server.url("/videos/holiday.mp4"))
            .unwrap();

        assert_eq!(fetched.path, dir.path().join("holiday.mp4"));
        assert!(fetched.created);
        assert_eq!(fs::read(&fetched.path).unwrap(), BODY);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_second_fetch_reuses_file() {
        let server = server();
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());
        let url = server.url("/videos/holiday.mp4");

        let first = fetcher.fetch(&url).unwrap();
        let second = fetcher.fetch(&url).unwrap();

        assert_eq!(first.path, second.path);
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(server.gets(), 1);
    }

    #[rstest]
    #[case("/signed/clip.mp4", "clip.mp4")]
    #[case("/signed/unsupported.mp4", "unsupported.mp4")]
    #[case("/signed/forbidden.mp4", "forbidden.mp4")]
    fn test_head_refused_falls_back_to_get(#[case] path: &str, #[case] name: &str) {
        let server = server();
        let dir = tempfile::tempdir().unwrap();

        let fetched = fetcher(dir.path()).fetch(&server.url(path)).unwrap();

        assert_eq!(fetched.path, dir.path().join(name));
        assert_eq!(fs::read(&fetched.path).unwrap(), BODY);
        assert_eq!(server.gets(), 1);
    }

    #[test]
    fn test_head_refused_non_video_rejected_on_get() {
        let server = server();
        let dir = tempfile::tempdir().unwrap();

        let result = fetcher(dir.path()).fetch(&server.url("/signed/page"));

        assert!(matches!(result, Err(FetchError::Unplayable)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_title_from_content_disposition() {
        let server = server();
        let dir = tempfile::tempdir().unwrap();

        let fetched = fetcher(dir.path()).fetch(&server.url("/watch")).unwrap();

        assert_eq!(fetched.path.file_name().unwrap(), "Cafe Night.webm");
    }

    #[test]
    fn test_missing_video_is_not_found() {
        let server = server();
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(dir.path());

        assert!(matches!(
            f.fetch(&server.url("/nope.mp4")),
            Err(FetchError::NotFound)
        ));
        assert!(matches!(
            f.fetch(&server.url("/gone.mp4")),
            Err(FetchError::NotFound)
        ));
    }

    #[test]
    fn test_server_error_is_other() {
        let server = server();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            fetcher(dir.path()).fetch(&server.url("/broken.mp4")),
            Err(FetchError::Other(_))
        ));
    }

    #[rstest]
    #[case("/page.html")]
    #[case("/empty.mp4")]
    fn test_non_video_is_unplayable(#[case] path: &str) {
        let server = server();
        let dir = tempfile::tempdir().unwrap();

        let result = fetcher(dir.path()).fetch(&server.url(path));

        assert!(matches!(result, Err(FetchError::Unplayable)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_insufficient_storage_leaves_nothing() {
        let server = server();
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(dir.path()).with_free_space_margin(1e15);

        let result = f.fetch(&server.url("/videos/holiday.mp4"));

        match result {
            Err(FetchError::InsufficientStorage { needed, available }) => {
                assert!(needed > available)
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(server.gets(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_progress_reported() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let server = server();
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(AtomicU64::new(0));
        let flag = seen.clone();
        let f = fetcher(dir.path()).with_progress(Box::new(move |done, _| {
            flag.store(done, Ordering::SeqCst);
        }));

        f.fetch(&server.url("/videos/holiday.mp4")).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), BODY.len() as u64);
    }

    #[test]
    fn test_invalid_locator_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            fetcher(dir.path()).fetch("not a url"),
            Err(FetchError::NotFound)
        ));
    }

    #[rstest]
    #[case("attachment; filename=\"clip.mp4\"", Some("clip.mp4"))]
    #[case("attachment; filename=clip.mkv", Some("clip.mkv"))]
    #[case(
        "attachment; filename=\"fallback.mp4\"; filename*=UTF-8''Caf%C3%A9.mp4",
        Some("Café.mp4")
    )]
    #[case("attachment; filename=\"../../etc/passwd\"", Some("passwd"))]
    #[case("inline", None)]
    fn test_disposition_file_name(#[case] value: &str, #[case] expected: Option<&str>) {
        assert_eq!(disposition_file_name(value).as_deref(), expected);
    }

    #[rstest]
    #[case("holiday.mp4", None, "holiday.mp4")]
    #[case("Holiday.MKV", None, "Holiday.mkv")]
    #[case("watch", Some("video/webm"), "watch.webm")]
    #[case("watch", None, "watch.mp4")]
    #[case("notes.txt", Some("video/quicktime"), "notes.txt.mov")]
    #[case("", None, "video.mp4")]
    fn test_file_name_for(
        #[case] title: &str,
        #[case] content_type: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(file_name_for(title, content_type), expected);
    }

    #[test]
    fn test_percent_decode_keeps_invalid_escapes() {
        assert_eq!(percent_decode("a%20b%zz%4"), "a b%zz%4");
    }

    #[rstest]
    #[case("https://cdn.example.com/media/My%20Clip.mp4", "My Clip.mp4")]
    #[case("https://cdn.example.com/", "cdn.example.com")]
    fn test_url_title(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(url_title(&Url::parse(url).unwrap()), expected);
    }
}

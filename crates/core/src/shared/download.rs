use std::io::{Read, Write};
use std::path::Path;

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

const CHUNK_SIZE: usize = 1024 * 1024;

/// Streams a response body to `dest`, reporting progress per chunk.
///
/// The body goes to a uniquely named `.part` file next to `dest` which is
/// renamed over `dest` on success, so `dest` only ever appears complete and
/// concurrent downloads of the same file never share a partial file. The
/// partial file is removed on failure.
pub fn stream_to_file(
    mut response: reqwest::blocking::Response,
    dest: &Path,
    progress: Option<&ProgressFn>,
) -> std::io::Result<u64> {
    let total = response.content_length().unwrap_or(0);
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = dest.file_name().unwrap_or_default().to_string_lossy();

    let mut part = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".part")
        .tempfile_in(dir)?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded: u64 = 0;
    loop {
        let n = response.read(&mut buf)?;
        if n == 0 {
            break;
        }
        part.write_all(&buf[..n])?;
        downloaded += n as u64;
        if let Some(cb) = progress {
            cb(downloaded, total);
        }
    }
    part.flush()?;
    part.persist(dest).map_err(|e| e.error)?;
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Route, TestServer};
    use std::collections::HashMap;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_stream_to_file_writes_body_and_reports_progress() {
        let server = TestServer::start(HashMap::from([(
            "/file.bin".to_string(),
            Route::ok("application/octet-stream", b"0123456789"),
        )]));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");

        let seen = Arc::new(AtomicU64::new(0));
        let flag = seen.clone();
        let progress: ProgressFn = Box::new(move |downloaded, _total| {
            flag.store(downloaded, Ordering::SeqCst);
        });

        let response = reqwest::blocking::get(server.url("/file.bin")).unwrap();
        let written = stream_to_file(response, &dest, Some(&progress)).unwrap();

        assert_eq!(written, 10);
        assert_eq!(fs::read(&dest).unwrap(), b"0123456789");
        assert_eq!(seen.load(Ordering::SeqCst), 10);
        assert_eq!(entries(dir.path()), vec!["file.bin"]);
    }

    #[test]
    fn test_stream_to_file_missing_directory_leaves_nothing() {
        let server = TestServer::start(HashMap::from([(
            "/file.bin".to_string(),
            Route::ok("application/octet-stream", b"abc"),
        )]));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("file.bin");

        let response = reqwest::blocking::get(server.url("/file.bin")).unwrap();
        assert!(stream_to_file(response, &dest, None).is_err());
        assert!(!dest.exists());
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_concurrent_partial_file_left_alone() {
        let server = TestServer::start(HashMap::from([(
            "/clip.mp4".to_string(),
            Route::ok("video/mp4", b"second copy"),
        )]));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        // another download of the same file, still in flight
        let other = dir.path().join("clip.mp4.part");
        fs::write(&other, b"first co").unwrap();

        let response = reqwest::blocking::get(server.url("/clip.mp4")).unwrap();
        stream_to_file(response, &dest, None).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"second copy");
        assert_eq!(fs::read(&other).unwrap(), b"first co");
        assert_eq!(entries(dir.path()), vec!["clip.mp4", "clip.mp4.part"]);

        fs::rename(&other, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"first co");
    }
}

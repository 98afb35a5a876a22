use std::path::Path;

use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::{VideoError, VideoReader};

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Frames that are only skipped never go through swscale; frames that
/// are read are converted to RGB24 and wrapped in a [`Frame`].
pub struct FfmpegReader {
    session: Option<DecodeSession>,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self { session: None }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError> {
        self.close();

        let open_err = |e: ffmpeg_next::Error| VideoError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        ffmpeg_next::init().map_err(open_err)?;
        let ictx = ffmpeg_next::format::input(path).map_err(open_err)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| VideoError::NoVideoStream(path.to_path_buf()))?;

        let stream_index = stream.index();
        let fps = stream_fps(&stream);
        let total_frames = stream.frames().max(0) as usize;

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(open_err)?;
        let decoder = codec_ctx.decoder().video().map_err(open_err)?;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(open_err)?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.session = Some(DecodeSession {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            next_index: 0,
            flushing: false,
            done: false,
        });

        Ok(metadata)
    }

    fn skip_frame(&mut self) -> Result<bool, VideoError> {
        let session = self.session.as_mut().ok_or(VideoError::NotOpened)?;
        match session.decode_next()? {
            Some(_) => {
                session.next_index += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        let session = self.session.as_mut().ok_or(VideoError::NotOpened)?;
        let Some(decoded) = session.decode_next()? else {
            return Ok(None);
        };

        let mut rgb_frame = Video::empty();
        session
            .scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| VideoError::Decode(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, session.width, session.height);
        let frame = Frame::new(pixels, session.width, session.height, session.next_index);
        session.next_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.session = None;
    }
}

/// Demuxer, decoder and scaler state for one open file.
struct DecodeSession {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    next_index: usize,
    flushing: bool,
    done: bool,
}

impl DecodeSession {
    /// Feeds packets until the decoder yields a frame or the stream ends.
    fn decode_next(&mut self) -> Result<Option<Video>, VideoError> {
        if self.done {
            return Ok(None);
        }

        loop {
            let mut decoded = Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }

            if self.flushing {
                self.done = true;
                return Ok(None);
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    match self.decoder.send_packet(&packet) {
                        Ok(()) => {}
                        Err(ffmpeg_next::Error::InvalidData) => {
                            log::debug!("Skipping corrupt packet at frame {}", self.next_index);
                        }
                        Err(e) => {
                            self.done = true;
                            return Err(VideoError::Decode(e.to_string()));
                        }
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }
}

/// Average frame rate, falling back to the stream's base rate. 0 if neither is usable.
fn stream_fps(stream: &ffmpeg_next::format::stream::Stream) -> f64 {
    for rate in [stream.avg_frame_rate(), stream.rate()] {
        if rate.denominator() != 0 && rate.numerator() > 0 {
            return rate.numerator() as f64 / rate.denominator() as f64;
        }
    }
    0.0
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This function strips that padding to produce a tightly-packed pixel buffer.
fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();

        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);

        octx.write_header().unwrap();

        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..num_frames {
            let mut rgb_frame = Video::new(ffmpeg_next::format::Pixel::RGB24, width, height);
            let stride = rgb_frame.stride(0);
            let data = rgb_frame.data_mut(0);
            let value = ((i * 40) % 256) as u8;
            for row in 0..height as usize {
                for col in 0..width as usize {
                    let offset = row * stride + col * 3;
                    data[offset] = value;
                    data[offset + 1] = value;
                    data[offset + 2] = value;
                }
            }

            let mut yuv_frame = Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));

            encoder.send_frame(&yuv_frame).unwrap();

            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(&mut octx).unwrap();
            }
        }

        encoder.send_eof().unwrap();
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
            encoded.write_interleaved(&mut octx).unwrap();
        }

        octx.write_trailer().unwrap();
    }

    fn test_video(dir: &Path, num_frames: usize) -> PathBuf {
        let path = dir.join("test.mp4");
        create_test_video(&path, num_frames, 160, 120, 30);
        path
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 5);

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!(meta.width, 160);
        assert_eq!(meta.height, 120);
        assert!(meta.fps > 0.0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut reader = FfmpegReader::new();
        let result = reader.open(Path::new("/nonexistent/test.mp4"));
        assert!(matches!(result, Err(VideoError::Open { .. })));
    }

    #[test]
    fn test_open_non_video_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();

        let mut reader = FfmpegReader::new();
        assert!(reader.open(&path).is_err());
    }

    #[test]
    fn test_read_frame_yields_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 5);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();

        let mut count = 0;
        while let Some(frame) = reader.read_frame().unwrap() {
            assert_eq!(frame.index(), count);
            count += 1;
        }
        assert_eq!(count, 5);
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_skip_frame_advances_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 5);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();

        assert!(reader.skip_frame().unwrap());
        assert!(reader.skip_frame().unwrap());
        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.index(), 2);
    }

    #[test]
    fn test_skip_frame_counts_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 7);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();

        let mut count = 0;
        while reader.skip_frame().unwrap() {
            count += 1;
        }
        assert_eq!(count, 7);
    }

    #[test]
    fn test_frames_are_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 2);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();

        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.data().len(), 160 * 120 * 3);
    }

    #[test]
    fn test_reopen_restarts_from_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 4);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        while reader.skip_frame().unwrap() {}

        reader.open(&path).unwrap();
        assert_eq!(reader.read_frame().unwrap().unwrap().index(), 0);
    }

    #[test]
    fn test_read_without_open_returns_error() {
        let mut reader = FfmpegReader::new();
        assert!(matches!(reader.read_frame(), Err(VideoError::NotOpened)));
        assert!(matches!(reader.skip_frame(), Err(VideoError::NotOpened)));
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 1);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();
        assert!(matches!(reader.read_frame(), Err(VideoError::NotOpened)));
    }
}

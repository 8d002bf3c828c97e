//! Interleaved audio/video container (`.cap`).
//!
//! File layout (all little-endian):
//! ```text
//! Header (44 bytes)
//!   [0-3]    magic "RCAP"
//!   [4-5]    version (u16)
//!   [6-7]    flags (u16): bit 0 finalized, bit 1 has audio
//!   [8-11]   video fourcc
//!   [12-15]  width (u32)
//!   [16-19]  height (u32)
//!   [20-21]  rotation degrees (u16)
//!   [22-25]  audio fourcc (zero when no audio)
//!   [26-29]  audio sample rate (u32)
//!   [30-31]  audio channels (u16)
//!   [32-35]  audio bit rate (u32)
//!   [36-43]  session start (i64 ns, video clock)
//! Records, in append order
//!   [u8 track: 1 video, 2 audio] [i64 pts ns] [u32 len] [payload]
//! Trailer
//!   [u8 0xFF] [u64 video samples] [u64 audio samples]
//! ```
//! The finalized flag is patched in by `finish`; a file without it was not
//! closed cleanly.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::models::config::{AudioCodec, VideoCodec};
use crate::models::error::CaptureError;
use crate::models::media_time::MediaTime;
use crate::models::sample_buffer::SampleBuffer;
use crate::traits::container_writer::{ContainerFormat, ContainerWriter, TrackKind, TrackLayout};

pub const CONTAINER_MAGIC: &[u8; 4] = b"RCAP";
pub const CONTAINER_VERSION: u16 = 1;
pub const CONTAINER_HEADER_SIZE: u64 = 44;

const FLAG_FINALIZED: u16 = 0x1;
const FLAG_HAS_AUDIO: u16 = 0x2;
const FLAGS_OFFSET: u64 = 6;
const START_OFFSET: u64 = 36;

const TRACK_VIDEO: u8 = 1;
const TRACK_AUDIO: u8 = 2;
const TRAILER_MARKER: u8 = 0xFF;

/// Format descriptor for the interleaved container. Stores video frames as
/// delivered (packed planes) and audio as 16-bit PCM.
#[derive(Debug, Clone, Default)]
pub struct InterleavedContainerFormat;

impl ContainerFormat for InterleavedContainerFormat {
    fn file_extension(&self) -> &str {
        "cap"
    }

    fn supports(&self, layout: &TrackLayout) -> Result<(), CaptureError> {
        if layout.video.codec != VideoCodec::Raw {
            return Err(CaptureError::ConfigurationFailed(format!(
                "cap container cannot encode {:?} video",
                layout.video.codec
            )));
        }
        if let Some(audio) = &layout.audio {
            if audio.codec != AudioCodec::Pcm16 {
                return Err(CaptureError::ConfigurationFailed(format!(
                    "cap container cannot encode {:?} audio",
                    audio.codec
                )));
            }
        }
        Ok(())
    }

    fn open(&self, path: &Path, layout: &TrackLayout) -> Result<Box<dyn ContainerWriter>, CaptureError> {
        self.supports(layout)?;
        Ok(Box::new(InterleavedContainerWriter::create(path, layout.clone())?))
    }
}

/// Byte sink a container is written to.
pub trait ContainerSink: Write + Seek + Send {
    /// Make written bytes durable. Called once after the trailer.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ContainerSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Writer for the interleaved container.
///
/// A failed record write closes the writer: the file then ends in a torn
/// record, so nothing more is appended and `finish` reports the writer as
/// closed instead of stamping the file finalized.
pub struct InterleavedContainerWriter<W: ContainerSink = File> {
    layout: TrackLayout,
    file: Option<BufWriter<W>>,
    started: bool,
    video_samples: u64,
    audio_samples: u64,
}

impl InterleavedContainerWriter<File> {
    pub fn create(path: &Path, layout: TrackLayout) -> Result<Self, CaptureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(path).map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;
        Self::from_sink(file, layout)
    }
}

impl<W: ContainerSink> InterleavedContainerWriter<W> {
    /// Start a container on `sink` and write its header.
    pub fn from_sink(sink: W, layout: TrackLayout) -> Result<Self, CaptureError> {
        let mut writer = Self {
            layout,
            file: Some(BufWriter::new(sink)),
            started: false,
            video_samples: 0,
            audio_samples: 0,
        };
        writer.write_header()?;
        Ok(writer)
    }

    fn write_header(&mut self) -> Result<(), CaptureError> {
        let video = self.layout.video.clone();
        let audio = self.layout.audio.clone();
        let out = self.file_mut()?;

        out.write_all(CONTAINER_MAGIC)?;
        out.write_u16::<LittleEndian>(CONTAINER_VERSION)?;
        out.write_u16::<LittleEndian>(if audio.is_some() { FLAG_HAS_AUDIO } else { 0 })?;
        out.write_all(&video.codec.fourcc())?;
        out.write_u32::<LittleEndian>(video.width)?;
        out.write_u32::<LittleEndian>(video.height)?;
        out.write_u16::<LittleEndian>(video.rotation_degrees)?;
        match &audio {
            Some(audio) => {
                out.write_all(&audio.codec.fourcc())?;
                out.write_u32::<LittleEndian>(audio.sample_rate)?;
                out.write_u16::<LittleEndian>(audio.channels)?;
                out.write_u32::<LittleEndian>(audio.bit_rate)?;
            }
            None => out.write_all(&[0u8; 14])?,
        }
        out.write_i64::<LittleEndian>(0)?;
        Ok(())
    }

    fn write_record(&mut self, track: u8, pts: MediaTime, payload: &[u8]) -> Result<(), CaptureError> {
        if !self.started {
            return Err(CaptureError::WriterState("session not started".into()));
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| CaptureError::EncodingFailed("sample larger than 4 GiB".into()))?;
        let out = self.file_mut()?;
        let written = (|| -> io::Result<()> {
            out.write_u8(track)?;
            out.write_i64::<LittleEndian>(pts.as_nanos())?;
            out.write_u32::<LittleEndian>(len)?;
            out.write_all(payload)
        })();
        if let Err(e) = written {
            self.file = None;
            return Err(CaptureError::WriterState(format!("container write failed: {}", e)));
        }
        Ok(())
    }

    fn file_mut(&mut self) -> Result<&mut BufWriter<W>, CaptureError> {
        self.file
            .as_mut()
            .ok_or_else(|| CaptureError::WriterState("container is closed".into()))
    }
}

impl<W: ContainerSink> ContainerWriter for InterleavedContainerWriter<W> {
    fn begin_session(&mut self, start: MediaTime) -> Result<(), CaptureError> {
        let out = self.file_mut()?;
        out.seek(SeekFrom::Start(START_OFFSET))?;
        out.write_i64::<LittleEndian>(start.as_nanos())?;
        out.seek(SeekFrom::End(0))?;
        self.started = true;
        Ok(())
    }

    fn is_ready_for_more_data(&self, _track: TrackKind) -> bool {
        self.file.is_some()
    }

    fn append_video(&mut self, frame: &SampleBuffer, pts: MediaTime) -> Result<(), CaptureError> {
        self.write_record(TRACK_VIDEO, pts, &frame.packed_bytes())?;
        self.video_samples += 1;
        Ok(())
    }

    fn append_audio(&mut self, pcm: &[u8], _frames: usize, pts: MediaTime) -> Result<(), CaptureError> {
        if self.layout.audio.is_none() {
            return Err(CaptureError::WriterState("container has no audio track".into()));
        }
        self.write_record(TRACK_AUDIO, pts, pcm)?;
        self.audio_samples += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        let has_audio = self.layout.audio.is_some();
        let (video_samples, audio_samples) = (self.video_samples, self.audio_samples);
        let mut out = self
            .file
            .take()
            .ok_or_else(|| CaptureError::WriterState("container already finished".into()))?;

        out.write_u8(TRAILER_MARKER)?;
        out.write_u64::<LittleEndian>(video_samples)?;
        out.write_u64::<LittleEndian>(audio_samples)?;

        let mut flags = FLAG_FINALIZED;
        if has_audio {
            flags |= FLAG_HAS_AUDIO;
        }
        out.seek(SeekFrom::Start(FLAGS_OFFSET))?;
        out.write_u16::<LittleEndian>(flags)?;
        out.flush()?;

        let mut sink = out
            .into_inner()
            .map_err(|e| CaptureError::StorageError(format!("failed to flush container: {}", e)))?;
        sink.sync()?;
        Ok(())
    }
}

/// Parsed overview of a `.cap` file.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSummary {
    pub finalized: bool,
    pub video_fourcc: [u8; 4],
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u16,
    pub audio_fourcc: Option<[u8; 4]>,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
    pub session_start: MediaTime,
    pub video_pts: Vec<MediaTime>,
    pub audio_pts: Vec<MediaTime>,
    /// Sample counts recorded in the trailer, if the file has one.
    pub trailer_counts: Option<(u64, u64)>,
}

/// Parse a container file written by [`InterleavedContainerWriter`].
pub fn read_container_summary(path: &Path) -> Result<ContainerSummary, CaptureError> {
    let file = File::open(path).map_err(|e| CaptureError::StorageError(format!("failed to open container: {}", e)))?;
    let mut input = BufReader::new(file);

    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if &magic != CONTAINER_MAGIC {
        return Err(CaptureError::InvalidSample("not a cap container".into()));
    }
    let version = input.read_u16::<LittleEndian>()?;
    if version != CONTAINER_VERSION {
        return Err(CaptureError::InvalidSample(format!("unsupported container version {}", version)));
    }
    let flags = input.read_u16::<LittleEndian>()?;
    let mut video_fourcc = [0u8; 4];
    input.read_exact(&mut video_fourcc)?;
    let width = input.read_u32::<LittleEndian>()?;
    let height = input.read_u32::<LittleEndian>()?;
    let rotation_degrees = input.read_u16::<LittleEndian>()?;
    let mut audio_fourcc = [0u8; 4];
    input.read_exact(&mut audio_fourcc)?;
    let audio_sample_rate = input.read_u32::<LittleEndian>()?;
    let audio_channels = input.read_u16::<LittleEndian>()?;
    let _bit_rate = input.read_u32::<LittleEndian>()?;
    let session_start = MediaTime::from_nanos(input.read_i64::<LittleEndian>()?);

    let mut summary = ContainerSummary {
        finalized: flags & FLAG_FINALIZED != 0,
        video_fourcc,
        width,
        height,
        rotation_degrees,
        audio_fourcc: (flags & FLAG_HAS_AUDIO != 0).then_some(audio_fourcc),
        audio_sample_rate,
        audio_channels,
        session_start,
        video_pts: Vec::new(),
        audio_pts: Vec::new(),
        trailer_counts: None,
    };

    loop {
        let track = match input.read_u8() {
            Ok(track) => track,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if track == TRAILER_MARKER {
            let video = input.read_u64::<LittleEndian>()?;
            let audio = input.read_u64::<LittleEndian>()?;
            summary.trailer_counts = Some((video, audio));
            break;
        }
        let pts = MediaTime::from_nanos(input.read_i64::<LittleEndian>()?);
        let len = input.read_u32::<LittleEndian>()?;
        input.seek_relative(len as i64)?;
        match track {
            TRACK_VIDEO => summary.video_pts.push(pts),
            TRACK_AUDIO => summary.audio_pts.push(pts),
            other => return Err(CaptureError::InvalidSample(format!("unknown track tag {}", other))),
        }
    }
    Ok(summary)
}

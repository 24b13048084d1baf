//! Output device.
//!
//! [`OutputBackend`] opens a device for one fixed [`DeviceFormat`] and drives a byte
//! callback; the returned [`OutputStream`] starts and stops it and closes on drop.
//!
//! [`CpalBackend`] is the real implementation: default output device of the default
//! host, opened through CPAL's raw (untyped) stream builder so the callback sees the
//! device buffer as plain bytes. When the hardware has no config matching the decoder's
//! encoding and channel count, the stream runs in the device's own layout and the
//! callback converts:
//! - samples go through `f32` into the device sample format
//! - channels are mapped (mono to stereo duplicates, stereo to mono averages,
//!   other layouts clamp to the available channels)
//!
//! The sample rate is never converted; a device that cannot run at the decoder's rate
//! fails to open.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::{PlayError, Result};
use crate::format::{DeviceFormat, SampleEncoding};

/// Byte callback registered with an output device.
///
/// Called from the backend's audio thread. Must fill the whole slice.
pub type DataCallback = Box<dyn FnMut(&mut [u8]) + Send + 'static>;

/// Something that can open an output device for a fixed format.
pub trait OutputBackend {
    type Stream: OutputStream;

    /// Open the device and register `callback`. The stream starts paused.
    fn open(&self, format: &DeviceFormat, callback: DataCallback) -> Result<Self::Stream>;
}

/// An open output device. Dropping it closes the device.
pub trait OutputStream {
    fn resume(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;

    /// Frames per device request actually seen, once the device has asked for data.
    ///
    /// May differ from the requested buffer size when the host clamps it or picks its
    /// own.
    fn buffer_frames(&self) -> Option<u32> {
        None
    }
}

/// CPAL-backed output on the default host's default output device.
pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Open CPAL stream. Closed when dropped.
pub struct CpalStream {
    stream: cpal::Stream,
    frames_seen: Arc<AtomicU32>,
}

impl OutputBackend for CpalBackend {
    type Stream = CpalStream;

    fn open(&self, format: &DeviceFormat, mut callback: DataCallback) -> Result<CpalStream> {
        let device = self
            .host
            .default_output_device()
            .ok_or_else(|| PlayError::open_device("no default output device"))?;
        let name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let ranges: Vec<cpal::SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(PlayError::open_device)?
            .collect();
        let range = pick_output_config(&ranges, format).ok_or_else(|| {
            PlayError::open_device(format!("{name} cannot play {format}"))
        })?;
        let layout = DeviceLayout {
            sample_format: range.sample_format(),
            channels: range.channels(),
        };

        let buffer_size = pick_buffer_size(format.buffer_frames, range.buffer_size());
        if buffer_size != cpal::BufferSize::Fixed(format.buffer_frames) {
            tracing::warn!(
                requested_frames = format.buffer_frames,
                buffer_size = ?buffer_size,
                "device buffer size adjusted"
            );
        }

        let config = cpal::StreamConfig {
            channels: layout.channels,
            sample_rate: format.sample_rate,
            buffer_size,
        };

        let mut converter = (!layout.is_native(format)).then(|| Converter::new(format, layout));
        if converter.is_some() {
            tracing::info!(
                device_format = ?layout.sample_format,
                device_channels = layout.channels,
                "converting to device layout"
            );
        }

        let frames_seen = Arc::new(AtomicU32::new(0));
        let frames_cb = frames_seen.clone();
        let device_frame_bytes = layout.frame_bytes();
        let err_fn = |err| tracing::warn!("stream error: {err}");
        let stream = device
            .build_output_stream_raw(
                &config,
                layout.sample_format,
                move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                    let out = data.bytes_mut();
                    let frames = out.len() / device_frame_bytes;
                    frames_cb.fetch_max(frames as u32, Ordering::Relaxed);
                    match converter.as_mut() {
                        Some(conv) => conv.render(&mut callback, out),
                        None => callback(out),
                    }
                },
                err_fn,
                None,
            )
            .map_err(PlayError::open_device)?;

        // Some hosts start streams running as soon as they are built.
        if let Err(e) = stream.pause() {
            tracing::debug!("initial pause not supported: {e}");
        }

        tracing::info!(device = %name, format = %format, "output device opened");
        Ok(CpalStream {
            stream,
            frames_seen,
        })
    }
}

impl OutputStream for CpalStream {
    fn resume(&self) -> Result<()> {
        self.stream.play().map_err(PlayError::open_device)
    }

    fn pause(&self) -> Result<()> {
        self.stream.pause().map_err(PlayError::open_device)
    }

    fn buffer_frames(&self) -> Option<u32> {
        match self.frames_seen.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }
}

/// Sample format and channel count the hardware is driven with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DeviceLayout {
    sample_format: cpal::SampleFormat,
    channels: u16,
}

impl DeviceLayout {
    fn is_native(&self, format: &DeviceFormat) -> bool {
        self.sample_format == format.encoding.to_cpal() && self.channels == format.channels
    }

    fn frame_bytes(&self) -> usize {
        (self.sample_format.sample_size() * usize::from(self.channels)).max(1)
    }
}

/// Pick the device config to open for `format`.
///
/// The rate must be supported as is. Among those, prefer matching channels, then the
/// matching encoding, then the richest sample format the callback can convert to.
fn pick_output_config<'a>(
    ranges: &'a [cpal::SupportedStreamConfigRange],
    format: &DeviceFormat,
) -> Option<&'a cpal::SupportedStreamConfigRange> {
    ranges
        .iter()
        .filter(|r| r.min_sample_rate() <= format.sample_rate)
        .filter(|r| format.sample_rate <= r.max_sample_rate())
        .filter(|r| r.channels() > 0)
        .filter_map(|r| sample_format_rank(r.sample_format()).map(|rank| (r, rank)))
        .max_by_key(|(r, rank)| {
            (
                r.channels() == format.channels,
                r.sample_format() == format.encoding.to_cpal(),
                *rank,
            )
        })
        .map(|(r, _)| r)
}

/// Device sample formats the callback can write, best first.
fn sample_format_rank(format: cpal::SampleFormat) -> Option<u8> {
    match format {
        cpal::SampleFormat::F32 => Some(4),
        cpal::SampleFormat::I32 => Some(3),
        cpal::SampleFormat::I16 => Some(2),
        cpal::SampleFormat::U16 => Some(1),
        _ => None,
    }
}

/// Rewrites native decoder bytes into the device's layout inside the callback.
struct Converter {
    src_encoding: SampleEncoding,
    src_channels: usize,
    dst: DeviceLayout,
    staging: Vec<u8>,
}

impl Converter {
    fn new(format: &DeviceFormat, dst: DeviceLayout) -> Self {
        Self {
            src_encoding: format.encoding,
            src_channels: usize::from(format.channels.max(1)),
            dst,
            staging: Vec::with_capacity(format.buffer_bytes()),
        }
    }

    /// Pull as many native frames from `source` as `out` holds device frames, then
    /// convert them into `out`.
    fn render(&mut self, mut source: impl FnMut(&mut [u8]), out: &mut [u8]) {
        let src_sample = self.src_encoding.bytes_per_sample();
        let src_frame = src_sample * self.src_channels;
        let dst_sample = self.dst.sample_format.sample_size();
        let dst_channels = usize::from(self.dst.channels);
        let frames = out.len() / self.dst.frame_bytes();

        self.staging.resize(frames * src_frame, 0);
        source(&mut self.staging);

        for frame in 0..frames {
            let src = &self.staging[frame * src_frame..(frame + 1) * src_frame];
            let get = |ch: usize| read_sample(&src[ch * src_sample..], self.src_encoding);
            for ch in 0..dst_channels {
                let value = match (self.src_channels, dst_channels) {
                    (2, 1) => 0.5 * (get(0) + get(1)),
                    (src_ch, _) => get(ch.min(src_ch - 1)),
                };
                let at = (frame * dst_channels + ch) * dst_sample;
                write_sample(&mut out[at..at + dst_sample], self.dst.sample_format, value);
            }
        }

        let tail = frames * self.dst.frame_bytes();
        write_silence(&mut out[tail..], self.dst.sample_format);
    }
}

/// Decode one native-endian sample starting at `bytes[0]`.
fn read_sample(bytes: &[u8], encoding: SampleEncoding) -> f32 {
    match encoding {
        SampleEncoding::I16 => {
            let s = i16::from_ne_bytes([bytes[0], bytes[1]]);
            <f32 as cpal::Sample>::from_sample(s)
        }
        SampleEncoding::I32 => {
            let s = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            <f32 as cpal::Sample>::from_sample(s)
        }
        SampleEncoding::F32 => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

fn write_sample(out: &mut [u8], format: cpal::SampleFormat, value: f32) {
    match format {
        cpal::SampleFormat::F32 => out.copy_from_slice(&value.to_ne_bytes()),
        cpal::SampleFormat::I32 => {
            out.copy_from_slice(&<i32 as cpal::Sample>::from_sample(value).to_ne_bytes())
        }
        cpal::SampleFormat::I16 => {
            out.copy_from_slice(&<i16 as cpal::Sample>::from_sample(value).to_ne_bytes())
        }
        cpal::SampleFormat::U16 => {
            out.copy_from_slice(&<u16 as cpal::Sample>::from_sample(value).to_ne_bytes())
        }
        _ => out.fill(0),
    }
}

/// Fill a partial trailing frame with the format's equilibrium value.
fn write_silence(out: &mut [u8], format: cpal::SampleFormat) {
    let size = format.sample_size();
    let whole = out.len() - out.len() % size;
    let (samples, rest) = out.split_at_mut(whole);
    for sample in samples.chunks_exact_mut(size) {
        write_sample(sample, format, 0.0);
    }
    rest.fill(0);
}

/// Use the requested buffer size, clamped into whatever range the device advertises.
///
/// Returns `Default` when the device does not report a range, so CPAL picks.
fn pick_buffer_size(requested: u32, supported: &cpal::SupportedBufferSize) -> cpal::BufferSize {
    match supported {
        cpal::SupportedBufferSize::Range { min, max } => {
            cpal::BufferSize::Fixed(requested.clamp(*min, (*max).max(*min)))
        }
        cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
    }
}

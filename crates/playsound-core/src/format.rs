//! Sample formats shared by the decoder adapter and the output device.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Raw sample encoding of the byte stream handed to the device.
///
/// Samples are interleaved and native-endian. Zero bytes are silence in every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    I16,
    I32,
    F32,
}

impl SampleEncoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::I16 => 2,
            SampleEncoding::I32 | SampleEncoding::F32 => 4,
        }
    }

    /// The matching CPAL sample format.
    pub fn to_cpal(self) -> cpal::SampleFormat {
        match self {
            SampleEncoding::I16 => cpal::SampleFormat::I16,
            SampleEncoding::I32 => cpal::SampleFormat::I32,
            SampleEncoding::F32 => cpal::SampleFormat::F32,
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleEncoding::I16 => "i16",
            SampleEncoding::I32 => "i32",
            SampleEncoding::F32 => "f32",
        };
        f.write_str(name)
    }
}

/// Native output format reported by a decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub encoding: SampleEncoding,
    pub channels: u16,
}

/// Format negotiated for one playback operation. Fixed until the device is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceFormat {
    pub sample_rate: u32,
    pub encoding: SampleEncoding,
    pub channels: u16,
    /// Device buffer size in frames.
    pub buffer_frames: u32,
}

impl DeviceFormat {
    pub fn from_spec(spec: AudioSpec, buffer_frames: u32) -> Self {
        Self {
            sample_rate: spec.sample_rate,
            encoding: spec.encoding,
            channels: spec.channels,
            buffer_frames,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.encoding.bytes_per_sample() * usize::from(self.channels)
    }

    /// Size of one full device buffer request in bytes.
    pub fn buffer_bytes(&self) -> usize {
        self.bytes_per_frame() * self.buffer_frames as usize
    }

    /// Wall-clock length of one device buffer.
    pub fn buffer_period(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(f64::from(self.buffer_frames) / f64::from(self.sample_rate))
    }
}

impl fmt::Display for DeviceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {}, {} ch, {} frames",
            self.sample_rate, self.encoding, self.channels, self.buffer_frames
        )
    }
}

//! Decoder adapter.
//!
//! [`SoundDecoder`] is the narrow contract the streaming callback pulls from: decode one
//! chunk into an internal byte buffer, expose that buffer, report status. Releasing the
//! decoder is `Drop`.
//!
//! [`SymphoniaDecoder`] implements it with Symphonia:
//! - probe the input container with an extension hint
//! - decode packets of the default track into interleaved native-endian bytes
//! - stop at end of stream or on the first unrecoverable error

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions};
use symphonia::core::conv::ConvertibleSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat;

use crate::error::{PlayError, Result};
use crate::format::{AudioSpec, SampleEncoding};

/// Decoder state as seen by callers.
///
/// `Eof` and `Error` are terminal: once either is reported, callers stop decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderStatus {
    Ok,
    Eof,
    Error,
}

/// A decoder bound to one input.
pub trait SoundDecoder {
    /// Native output format of [`SoundDecoder::buffer`].
    fn spec(&self) -> AudioSpec;

    /// Decode the next chunk into the internal buffer and return its length in bytes.
    ///
    /// `0` means nothing was produced by this call. Status tells whether that was terminal.
    fn decode(&mut self) -> usize;

    /// Bytes produced by the most recent [`SoundDecoder::decode`] call.
    fn buffer(&self) -> &[u8];

    fn status(&self) -> DecoderStatus;

    /// Human-readable reason when [`SoundDecoder::status`] is `Error`.
    fn error(&self) -> Option<&str>;
}

/// Symphonia-backed [`SoundDecoder`] reading a local file.
pub struct SymphoniaDecoder {
    path: PathBuf,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    spec: AudioSpec,
    target_bytes: usize,
    buffer: Vec<u8>,
    status: DecoderStatus,
    error: Option<String>,
}

impl SymphoniaDecoder {
    /// Open and probe `path`, preparing a decoder for its default track.
    ///
    /// `target_bytes` is the chunk size each [`SoundDecoder::decode`] call aims for; a
    /// chunk may overshoot it by up to one packet.
    pub fn open(path: &Path, target_bytes: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| PlayError::open_decoder(path, e))?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PlayError::open_decoder(path, e))?;

        let reader = probed.format;
        let track = reader
            .default_track()
            .ok_or_else(|| PlayError::open_decoder(path, "no default audio track"))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let spec = spec_from_codec_params(&codec_params)
            .map_err(|reason| PlayError::open_decoder(path, reason))?;

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| PlayError::open_decoder(path, e))?;

        tracing::debug!(
            path = ?path,
            rate_hz = spec.sample_rate,
            channels = spec.channels,
            encoding = %spec.encoding,
            "decoder opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            decoder,
            track_id,
            spec,
            target_bytes: target_bytes.max(1),
            buffer: Vec::with_capacity(target_bytes),
            status: DecoderStatus::Ok,
            error: None,
        })
    }
}

impl SoundDecoder for SymphoniaDecoder {
    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn decode(&mut self) -> usize {
        self.buffer.clear();
        if self.status != DecoderStatus::Ok {
            return 0;
        }

        while self.buffer.len() < self.target_bytes {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.status = DecoderStatus::Eof;
                    break;
                }
                Err(e) => {
                    self.status = DecoderStatus::Error;
                    self.error = Some(e.to_string());
                    break;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => append_interleaved(decoded, self.spec.encoding, &mut self.buffer),
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!(path = ?self.path, "skipping undecodable packet: {e}");
                }
                Err(e) => {
                    self.status = DecoderStatus::Error;
                    self.error = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(reason) = &self.error {
            tracing::warn!(path = ?self.path, "decoder stopped: {reason}");
        }
        self.buffer.len()
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn status(&self) -> DecoderStatus {
        self.status
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Native format for a track: the codec's own sample format where it has one.
///
/// Lossy codecs report no sample format and decode to float, so they map to `F32`.
/// 8-bit sources widen to `I16`; unsigned 8-bit silence is not zero.
fn spec_from_codec_params(params: &CodecParameters) -> std::result::Result<AudioSpec, String> {
    let channels = params
        .channels
        .ok_or_else(|| "unknown channel count".to_string())?
        .count();
    let channels = u16::try_from(channels).map_err(|_| format!("too many channels: {channels}"))?;
    let sample_rate = params
        .sample_rate
        .filter(|r| *r > 0)
        .ok_or_else(|| "unknown sample rate".to_string())?;

    Ok(AudioSpec {
        sample_rate,
        encoding: native_encoding(params),
        channels,
    })
}

fn native_encoding(params: &CodecParameters) -> SampleEncoding {
    match params.sample_format {
        Some(SampleFormat::F32 | SampleFormat::F64) => SampleEncoding::F32,
        Some(SampleFormat::U8 | SampleFormat::S8 | SampleFormat::U16 | SampleFormat::S16) => {
            SampleEncoding::I16
        }
        Some(_) => SampleEncoding::I32,
        None => match params.bits_per_sample {
            Some(bits) if bits <= 16 => SampleEncoding::I16,
            Some(_) => SampleEncoding::I32,
            None => SampleEncoding::F32,
        },
    }
}

fn append_interleaved(decoded: AudioBufferRef<'_>, encoding: SampleEncoding, out: &mut Vec<u8>) {
    match encoding {
        SampleEncoding::I16 => append_samples::<i16, 2>(decoded, out, i16::to_ne_bytes),
        SampleEncoding::I32 => append_samples::<i32, 4>(decoded, out, i32::to_ne_bytes),
        SampleEncoding::F32 => append_samples::<f32, 4>(decoded, out, f32::to_ne_bytes),
    }
}

fn append_samples<S, const N: usize>(
    decoded: AudioBufferRef<'_>,
    out: &mut Vec<u8>,
    to_bytes: fn(S) -> [u8; N],
) where
    S: ConvertibleSample,
{
    let mut samples = SampleBuffer::<S>::new(decoded.frames() as u64, *decoded.spec());
    samples.copy_interleaved_ref(decoded);
    out.reserve(samples.len() * N);
    for &s in samples.samples() {
        out.extend_from_slice(&to_bytes(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_wav_i16;
    use symphonia::core::audio::Channels;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn native_encoding_prefers_codec_sample_format() {
        let mut params = CodecParameters::new();
        params.sample_format = Some(SampleFormat::S24);
        assert_eq!(native_encoding(&params), SampleEncoding::I32);
        params.sample_format = Some(SampleFormat::U8);
        assert_eq!(native_encoding(&params), SampleEncoding::I16);
        params.sample_format = Some(SampleFormat::F64);
        assert_eq!(native_encoding(&params), SampleEncoding::F32);
    }

    #[test]
    fn native_encoding_falls_back_to_bit_depth_then_float() {
        let mut params = CodecParameters::new();
        params.bits_per_sample = Some(16);
        assert_eq!(native_encoding(&params), SampleEncoding::I16);
        params.bits_per_sample = Some(24);
        assert_eq!(native_encoding(&params), SampleEncoding::I32);
        params.bits_per_sample = None;
        assert_eq!(native_encoding(&params), SampleEncoding::F32);
    }

    #[test]
    fn spec_requires_channels_and_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(48_000);
        assert!(spec_from_codec_params(&params).is_err());

        params.channels = Some(Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let spec = spec_from_codec_params(&params).unwrap();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);

        params.sample_rate = Some(0);
        assert!(spec_from_codec_params(&params).is_err());
    }

    #[test]
    fn open_missing_file_is_cannot_open_decoder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-input.wav");
        let err = SymphoniaDecoder::open(&path, 4096).err().unwrap();
        match err {
            PlayError::CannotOpenDecoder { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn open_garbage_file_is_cannot_open_decoder() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        file.write_all(b"definitely not audio").unwrap();
        let err = SymphoniaDecoder::open(file.path(), 4096).err().unwrap();
        assert!(matches!(err, PlayError::CannotOpenDecoder { .. }));
    }

    #[test]
    fn decodes_wav_to_native_bytes_until_eof() {
        let samples: Vec<i16> = (0..2_000).map(|i| (i * 7 - 3_000) as i16).collect();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("decode-ramp.wav");
        write_wav_i16(&path, 22_050, 2, &samples).unwrap();

        let mut decoder = SymphoniaDecoder::open(&path, 1024).unwrap();
        let spec = decoder.spec();
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.encoding, SampleEncoding::I16);

        let mut out = Vec::new();
        while decoder.status() == DecoderStatus::Ok {
            let n = decoder.decode();
            assert_eq!(n, decoder.buffer().len());
            out.extend_from_slice(decoder.buffer());
        }

        assert_eq!(decoder.status(), DecoderStatus::Eof);
        assert!(decoder.error().is_none());
        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn decode_after_eof_returns_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("decode-short.wav");
        write_wav_i16(&path, 8_000, 1, &[1, 2, 3, 4]).unwrap();
        let mut decoder = SymphoniaDecoder::open(&path, 65_536).unwrap();
        while decoder.status() == DecoderStatus::Ok {
            decoder.decode();
        }
        assert_eq!(decoder.decode(), 0);
        assert!(decoder.buffer().is_empty());
    }
}

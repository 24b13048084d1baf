//! Fakes shared by unit tests: scripted decoders and a thread-driven output device.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::PlayerConfig;
use crate::decode::{DecoderStatus, SoundDecoder};
use crate::device::{DataCallback, OutputBackend, OutputStream};
use crate::error::{PlayError, Result};
use crate::format::{AudioSpec, DeviceFormat, SampleEncoding};
use crate::pipeline::OpenDecoder;

/// Decoder that hands out a fixed list of chunks, then reports EOF.
pub(crate) struct ScriptedDecoder {
    chunks: VecDeque<Vec<u8>>,
    current: Vec<u8>,
    status: DecoderStatus,
    fail_after: Option<usize>,
    produced: usize,
    decode_calls: usize,
    released: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    pub(crate) fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
            current: Vec::new(),
            status: DecoderStatus::Ok,
            fail_after: None,
            produced: 0,
            decode_calls: 0,
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Flag an error together with the `n`th chunk.
    pub(crate) fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub(crate) fn decode_calls(&self) -> usize {
        self.decode_calls
    }
}

impl SoundDecoder for ScriptedDecoder {
    fn spec(&self) -> AudioSpec {
        AudioSpec {
            sample_rate: 8_000,
            encoding: SampleEncoding::I16,
            channels: 1,
        }
    }

    fn decode(&mut self) -> usize {
        self.decode_calls += 1;
        self.current = match self.chunks.pop_front() {
            Some(chunk) => chunk,
            None => {
                self.status = DecoderStatus::Eof;
                Vec::new()
            }
        };
        if !self.current.is_empty() {
            self.produced += 1;
        }
        if self.fail_after == Some(self.produced) {
            self.status = DecoderStatus::Error;
        }
        self.current.len()
    }

    fn buffer(&self) -> &[u8] {
        &self.current
    }

    fn status(&self) -> DecoderStatus {
        self.status
    }

    fn error(&self) -> Option<&str> {
        (self.status == DecoderStatus::Error).then_some("scripted failure")
    }
}

impl Drop for ScriptedDecoder {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opener producing [`ScriptedDecoder`]s and counting their releases.
#[derive(Clone)]
pub(crate) struct ScriptedOpener {
    chunks: Vec<Vec<u8>>,
    fail_after: Option<usize>,
    released: Arc<AtomicUsize>,
}

impl ScriptedOpener {
    pub(crate) fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            fail_after: None,
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl OpenDecoder for ScriptedOpener {
    type Decoder = ScriptedDecoder;

    fn open(&self, _path: &Path, _config: &PlayerConfig) -> Result<ScriptedDecoder> {
        let mut decoder = ScriptedDecoder::new(self.chunks.clone());
        decoder.fail_after = self.fail_after;
        decoder.released = self.released.clone();
        Ok(decoder)
    }
}

/// Something the fake device was asked to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DeviceEvent {
    Open,
    Resume,
    Pause,
    Close,
}

#[derive(Default)]
struct FakeLog {
    events: Mutex<Vec<(DeviceEvent, Instant)>>,
    played: Mutex<Vec<u8>>,
}

impl FakeLog {
    fn record(&self, event: DeviceEvent) {
        self.events.lock().unwrap().push((event, Instant::now()));
    }

    fn count(&self, event: DeviceEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == event)
            .count()
    }
}

/// Output backend whose "hardware" is a thread pulling one device buffer at a time.
#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    fail_open: bool,
    device_frames: Option<u32>,
    log: Arc<FakeLog>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Request `frames` per callback regardless of the format's buffer size.
    pub(crate) fn with_device_frames(frames: u32) -> Self {
        Self {
            device_frames: Some(frames),
            ..Self::default()
        }
    }

    pub(crate) fn opens(&self) -> usize {
        self.log.count(DeviceEvent::Open)
    }

    pub(crate) fn resumes(&self) -> usize {
        self.log.count(DeviceEvent::Resume)
    }

    pub(crate) fn pauses(&self) -> usize {
        self.log.count(DeviceEvent::Pause)
    }

    pub(crate) fn closes(&self) -> usize {
        self.log.count(DeviceEvent::Close)
    }

    /// Every device call in order, with the time it happened.
    pub(crate) fn events(&self) -> Vec<(DeviceEvent, Instant)> {
        self.log.events.lock().unwrap().clone()
    }

    /// Every byte the callback wrote while the stream was running.
    pub(crate) fn played(&self) -> Vec<u8> {
        self.log.played.lock().unwrap().clone()
    }
}

pub(crate) struct FakeStream {
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    frames: u32,
    worker: Option<thread::JoinHandle<()>>,
    log: Arc<FakeLog>,
}

impl OutputBackend for FakeBackend {
    type Stream = FakeStream;

    fn open(&self, format: &DeviceFormat, mut callback: DataCallback) -> Result<FakeStream> {
        self.log.record(DeviceEvent::Open);
        if self.fail_open {
            return Err(PlayError::CannotOpenDevice {
                reason: "fake device busy".to_string(),
            });
        }

        let frames = self.device_frames.unwrap_or(format.buffer_frames);
        let request = format.bytes_per_frame() * frames as usize;
        let running = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let running = running.clone();
            let stop = stop.clone();
            let log = self.log.clone();
            thread::spawn(move || {
                let mut buf = vec![0u8; request];
                while !stop.load(Ordering::SeqCst) {
                    if running.load(Ordering::SeqCst) {
                        buf.fill(0xEE);
                        callback(&mut buf);
                        log.played.lock().unwrap().extend_from_slice(&buf);
                    }
                    thread::sleep(Duration::from_micros(200));
                }
            })
        };

        Ok(FakeStream {
            running,
            stop,
            frames,
            worker: Some(worker),
            log: self.log.clone(),
        })
    }
}

impl OutputStream for FakeStream {
    fn resume(&self) -> Result<()> {
        self.log.record(DeviceEvent::Resume);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.log.record(DeviceEvent::Pause);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn buffer_frames(&self) -> Option<u32> {
        Some(self.frames)
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.log.record(DeviceEvent::Close);
    }
}

/// Write a 16-bit PCM WAV file.
pub(crate) fn write_wav_i16(
    path: &Path,
    rate: u32,
    channels: u16,
    samples: &[i16],
) -> hound::Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for s in samples {
        writer.write_sample(*s)?;
    }
    writer.finalize()
}

//! Microphone capture via cpal.
//!
//! The input stream lives on a dedicated thread for its whole lifetime, so
//! the engine itself stays `Send` regardless of the host backend. Samples are
//! converted to f32 in the stream callback and buffered until `stop`, which
//! downmixes them to mono and encodes a 16-bit PCM WAV blob.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use audio_annotation_core::models::blob::AudioBlob;
use audio_annotation_core::models::error::CaptureError;
use audio_annotation_core::processing::wav_format::{downmix_to_mono, encode_wav};
use audio_annotation_core::traits::capture_engine::CaptureEngine;

/// Negotiated input format: sample rate and channel count.
type InputFormat = (u32, u16);

/// Default-device microphone capture.
pub struct CpalCapture {
    running: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
    format: Option<InputFormat>,
    capture_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            samples: Arc::new(Mutex::new(Vec::new())),
            format: None,
            capture_handle: None,
        }
    }

    /// Signal the capture thread and wait for it to drop the stream.
    fn halt(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureEngine for CpalCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::Busy);
        }

        self.samples.lock().clear();
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let samples = Arc::clone(&self.samples);
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("cpal-mic-capture".into())
            .spawn(move || capture_thread(running, samples, ready_tx))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::EncodingFailed(format!("failed to spawn capture thread: {}", e))
            })?;
        self.capture_handle = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                log::info!("Microphone capture started ({} Hz, {} ch)", format.0, format.1);
                self.format = Some(format);
                Ok(())
            }
            Ok(Err(e)) => {
                self.halt();
                Err(e)
            }
            Err(_) => {
                self.halt();
                Err(CaptureError::DeviceNotAvailable)
            }
        }
    }

    fn stop(&mut self) -> Result<AudioBlob, CaptureError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::NotRecording);
        }
        self.halt();

        let (sample_rate, channels) = self
            .format
            .take()
            .ok_or_else(|| CaptureError::EncodingFailed("input format unknown".into()))?;
        let interleaved = std::mem::take(&mut *self.samples.lock());
        let mono = downmix_to_mono(&interleaved, channels as usize);

        log::info!(
            "Microphone capture stopped ({:.2}s)",
            mono.len() as f64 / sample_rate as f64
        );
        Ok(encode_wav(&mono, sample_rate, 1))
    }

    fn cancel(&mut self) {
        if !self.running.load(Ordering::SeqCst) && self.capture_handle.is_none() {
            return;
        }
        self.halt();
        self.format = None;
        self.samples.lock().clear();
        log::debug!("Microphone capture cancelled");
    }

    fn is_recording(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Owns the input stream until `running` clears.
///
/// Reports the negotiated format (or the failure) through `ready` before
/// entering the wait loop.
fn capture_thread(
    running: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
    ready: mpsc::Sender<Result<InputFormat, CaptureError>>,
) {
    let stream = match open_input_stream(samples) {
        Ok((stream, format)) => {
            let _ = ready.send(Ok(format));
            stream
        }
        Err(e) => {
            log::error!("Mic capture error: {}", e);
            running.store(false, Ordering::SeqCst);
            let _ = ready.send(Err(e));
            return;
        }
    };

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(20));
    }
    drop(stream);
}

fn open_input_stream(samples: Arc<Mutex<Vec<f32>>>) -> Result<(cpal::Stream, InputFormat), CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or_else(|| {
        log::error!("No input device available");
        CaptureError::DeviceNotAvailable
    })?;
    log::debug!(
        "Input device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported = device.default_input_config().map_err(|e| {
        log::warn!("Failed to get input config: {}", e);
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::DeviceNotAvailable,
            _ => CaptureError::PermissionDenied,
        }
    })?;
    let format = (supported.sample_rate().0, supported.channels());
    let config: cpal::StreamConfig = supported.config();

    let err_fn = |err: cpal::StreamError| log::error!("Audio stream error: {}", err);

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let buffer = Arc::clone(&samples);
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    buffer.lock().extend_from_slice(data);
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let buffer = Arc::clone(&samples);
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    buffer
                        .lock()
                        .extend(data.iter().map(|&s| s as f32 / i16::MAX as f32));
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let buffer = Arc::clone(&samples);
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    buffer
                        .lock()
                        .extend(data.iter().map(|&s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0));
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(CaptureError::EncodingFailed(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| {
        log::warn!("Failed to build input stream: {}", e);
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceNotAvailable,
            _ => CaptureError::PermissionDenied,
        }
    })?;

    stream.play().map_err(|e| {
        log::warn!("Failed to start input stream: {}", e);
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceNotAvailable,
            _ => CaptureError::PermissionDenied,
        }
    })?;

    Ok((stream, format))
}

//! cpal-backed audio devices for the realtime session.
//!
//! cpal streams are not `Send`, so each stream lives on its own thread.
//! Capture feeds mono PCM frames over a channel to a tokio task that Opus
//! encodes and writes the outbound track; playback drains a shared sample
//! queue from the output stream callback.

use async_trait::async_trait;
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;
use parley_realtime::audio::{AudioInput, AudioOutput, CaptureHandle};
use parley_realtime::codec::{OpusEncoder, FRAME_SAMPLES, SAMPLE_RATE};
use parley_realtime::error::TransportError;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const FRAME_DURATION: Duration = Duration::from_millis(20);
const DEVICE_START_TIMEOUT: Duration = Duration::from_secs(5);
// Cap the playback backlog at ~2 s so a stalled device cannot grow it
// without bound.
const MAX_QUEUED_SAMPLES: usize = SAMPLE_RATE as usize * 2;

/// Microphone capture through the default cpal input device.
pub struct CpalAudioInput;

#[async_trait]
impl AudioInput for CpalAudioInput {
    async fn start(
        &self,
        track: Arc<TrackLocalStaticSample>,
    ) -> Result<CaptureHandle, TransportError> {
        let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<i16>>(32);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        std::thread::spawn(move || run_capture(frame_tx, ready_tx));

        let started = tokio::task::spawn_blocking(move || {
            ready_rx.recv_timeout(DEVICE_START_TIMEOUT)
        })
        .await
        .map_err(|e| TransportError::AudioCapture(e.to_string()))?;
        match started {
            Ok(Ok(())) => {}
            Ok(Err(message)) => return Err(TransportError::AudioCapture(message)),
            Err(_) => {
                return Err(TransportError::AudioCapture(
                    "audio device did not start in time".to_string(),
                ))
            }
        }

        let encoder = OpusEncoder::new()?;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    frame = frame_rx.recv() => {
                        let Some(frame) = frame else { break };
                        match encoder.encode(&frame) {
                            Ok(packet) => {
                                let sample = Sample {
                                    data: Bytes::from(packet),
                                    duration: FRAME_DURATION,
                                    ..Default::default()
                                };
                                if let Err(e) = track.write_sample(&sample).await {
                                    debug!(error = %e, "Track write failed");
                                }
                            }
                            Err(e) => debug!(error = %e, "Opus encode failed"),
                        }
                    }
                }
            }
            debug!("Capture encoder task stopped");
        });

        Ok(CaptureHandle::new(stop_tx))
    }
}

fn run_capture(
    frame_tx: mpsc::Sender<Vec<i16>>,
    ready_tx: std::sync::mpsc::Sender<Result<(), String>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = ready_tx.send(Err("no default input device".to_string()));
        return;
    };
    let config = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("input config: {e}")));
            return;
        }
    };
    let sample_format = config.sample_format();
    let mut assembler = FrameAssembler::new(config.sample_rate().0, config.channels() as usize);
    let stream_config: cpal::StreamConfig = config.into();
    let tx = frame_tx.clone();
    let on_error = |e| warn!(error = %e, "Input stream error");

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                assembler.push(data, |frame| {
                    // Backpressure drops frames rather than blocking the
                    // device callback.
                    let _ = tx.try_send(frame);
                });
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| {
                let converted: Vec<f32> =
                    data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                assembler.push(&converted, |frame| {
                    let _ = tx.try_send(frame);
                });
            },
            on_error,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(format!("unsupported input sample format {other}")));
            return;
        }
    };
    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("input stream: {e}")));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("input stream start: {e}")));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // The stream stays alive until the encoder side hangs up.
    while !frame_tx.is_closed() {
        std::thread::sleep(Duration::from_millis(200));
    }
}

/// Turns interleaved device samples into mono 48 kHz frames of
/// [`FRAME_SAMPLES`] samples, one at a time.
struct FrameAssembler {
    device_rate: u32,
    channels: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    fn new(device_rate: u32, channels: usize) -> Self {
        Self {
            device_rate,
            channels: channels.max(1),
            pending: Vec::new(),
        }
    }

    fn push(&mut self, interleaved: &[f32], mut emit: impl FnMut(Vec<i16>)) {
        for frame in interleaved.chunks(self.channels) {
            let sum: f32 = frame.iter().sum();
            let sample = (sum / frame.len() as f32).clamp(-1.0, 1.0);
            self.pending.push((sample * i16::MAX as f32) as i16);
        }
        let needed =
            (FRAME_SAMPLES as u64 * self.device_rate as u64 / SAMPLE_RATE as u64) as usize;
        if needed == 0 {
            return;
        }
        while self.pending.len() >= needed {
            let chunk: Vec<i16> = self.pending.drain(..needed).collect();
            emit(resample_linear(&chunk, FRAME_SAMPLES));
        }
    }
}

/// Linear-interpolation resample of a mono chunk to `target_len` samples.
fn resample_linear(input: &[i16], target_len: usize) -> Vec<i16> {
    if target_len == 0 {
        return Vec::new();
    }
    if input.is_empty() {
        return vec![0; target_len];
    }
    if input.len() == target_len {
        return input.to_vec();
    }
    let mut out = Vec::with_capacity(target_len);
    let step = (input.len() - 1) as f64 / (target_len - 1).max(1) as f64;
    for i in 0..target_len {
        let pos = i as f64 * step;
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let a = input[idx] as f64;
        let b = input[(idx + 1).min(input.len() - 1)] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }
    out
}

/// Playback of decoded remote audio through the default cpal output device.
pub struct CpalAudioOutput {
    queue: Arc<Mutex<VecDeque<i16>>>,
}

impl CpalAudioOutput {
    pub fn new() -> Self {
        let queue: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
        let handle = Arc::clone(&queue);
        std::thread::spawn(move || run_playback(handle));
        Self { queue }
    }
}

impl Default for CpalAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalAudioOutput {
    fn play(&self, pcm: &[i16], _sample_rate: u32) {
        let mut queue = self.queue.lock();
        queue.extend(pcm.iter().copied());
        while queue.len() > MAX_QUEUED_SAMPLES {
            queue.pop_front();
        }
    }
}

fn run_playback(queue: Arc<Mutex<VecDeque<i16>>>) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        warn!("No default output device, remote audio muted");
        return;
    };
    let config = match device.default_output_config() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Output config unavailable, remote audio muted");
            return;
        }
    };
    if config.sample_format() != SampleFormat::F32 {
        warn!(format = %config.sample_format(), "Unsupported output sample format, remote audio muted");
        return;
    }
    let device_rate = config.sample_rate().0 as f64;
    let channels = config.channels().max(1) as usize;
    // Source samples consumed per output frame.
    let step = SAMPLE_RATE as f64 / device_rate;
    let stream_config: cpal::StreamConfig = config.into();

    let mut cursor = 0.0f64;
    let mut last = 0i16;
    let stream = device.build_output_stream(
        &stream_config,
        move |out: &mut [f32], _| {
            let mut queue = queue.lock();
            for frame in out.chunks_mut(channels) {
                cursor += step;
                while cursor >= 1.0 {
                    cursor -= 1.0;
                    if let Some(sample) = queue.pop_front() {
                        last = sample;
                    }
                }
                let value = last as f32 / i16::MAX as f32;
                for slot in frame.iter_mut() {
                    *slot = value;
                }
            }
        },
        |e| warn!(error = %e, "Output stream error"),
        None,
    );
    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Output stream unavailable, remote audio muted");
            return;
        }
    };
    if let Err(e) = stream.play() {
        warn!(error = %e, "Output stream start failed, remote audio muted");
        return;
    }
    // Parked for the lifetime of the process; playback has no stop control.
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_hits_the_target_length() {
        let input: Vec<i16> = (0..441).collect();
        let out = resample_linear(&input, FRAME_SAMPLES);
        assert_eq!(out.len(), FRAME_SAMPLES);
        assert_eq!(out[0], 0);
        assert_eq!(*out.last().unwrap(), 440);
    }

    #[test]
    fn resample_is_identity_at_matching_rates() {
        let input: Vec<i16> = (0..FRAME_SAMPLES as i16).collect();
        assert_eq!(resample_linear(&input, FRAME_SAMPLES), input);
    }

    #[test]
    fn assembler_emits_full_frames_only() {
        let mut assembler = FrameAssembler::new(48_000, 2);
        let mut frames = Vec::new();
        // 900 stereo sample pairs: not yet a full 20 ms frame.
        assembler.push(&vec![0.1f32; 1800], |f| frames.push(f));
        assert!(frames.is_empty());
        // 60 more pairs complete the frame.
        assembler.push(&vec![0.1f32; 120], |f| frames.push(f));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), FRAME_SAMPLES);
    }

    #[test]
    fn assembler_resamples_from_device_rate() {
        let mut assembler = FrameAssembler::new(44_100, 1);
        let mut frames = Vec::new();
        // One 20 ms frame at 44.1 kHz is 882 samples.
        assembler.push(&vec![0.5f32; 882], |f| frames.push(f));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), FRAME_SAMPLES);
    }

    #[test]
    fn playback_queue_is_bounded() {
        let output = CpalAudioOutput {
            queue: Arc::new(Mutex::new(VecDeque::new())),
        };
        let chunk = vec![0i16; SAMPLE_RATE as usize];
        output.play(&chunk, SAMPLE_RATE);
        output.play(&chunk, SAMPLE_RATE);
        output.play(&chunk, SAMPLE_RATE);
        assert_eq!(output.queue.lock().len(), MAX_QUEUED_SAMPLES);
    }
}

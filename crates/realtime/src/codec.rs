//! Opus encode/decode wrappers used at the media boundary.

use crate::error::TransportError;
use audiopus::coder;
use audiopus::{Application, Channels, SampleRate};
use std::sync::Mutex;

/// Session audio rate, both directions.
pub const SAMPLE_RATE: u32 = 48_000;
/// Samples per 20 ms mono frame at [`SAMPLE_RATE`].
pub const FRAME_SAMPLES: usize = 960;

const MAX_PACKET_BYTES: usize = 1500;
// Decoded frames can span up to 120 ms.
const MAX_DECODED_SAMPLES: usize = FRAME_SAMPLES * 6;

/// Mono 48 kHz Opus encoder. Shareable across threads; encoding is serialized
/// internally.
pub struct OpusEncoder {
    inner: Mutex<coder::Encoder>,
}

impl OpusEncoder {
    pub fn new() -> Result<Self, TransportError> {
        let inner = coder::Encoder::new(SampleRate::Hz48000, Channels::Mono, Application::Voip)
            .map_err(|e| TransportError::AudioCapture(format!("opus encoder: {e}")))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Encodes one 20 ms PCM frame (exactly [`FRAME_SAMPLES`] samples) into an
    /// Opus packet.
    pub fn encode(&self, pcm: &[i16]) -> Result<Vec<u8>, TransportError> {
        let mut packet = vec![0u8; MAX_PACKET_BYTES];
        let mut encoder = self
            .inner
            .lock()
            .map_err(|_| TransportError::AudioCapture("opus encoder poisoned".to_string()))?;
        let encoder = &mut *encoder;
        let written = encoder
            .encode(pcm, &mut packet)
            .map_err(|e| TransportError::AudioCapture(format!("opus encode: {e}")))?;
        packet.truncate(written);
        Ok(packet)
    }
}

/// Mono 48 kHz Opus decoder. Shareable across threads; decoding is serialized
/// internally.
pub struct OpusDecoder {
    inner: Mutex<coder::Decoder>,
}

impl OpusDecoder {
    pub fn new() -> Result<Self, TransportError> {
        let inner = coder::Decoder::new(SampleRate::Hz48000, Channels::Mono)
            .map_err(|e| TransportError::PeerConnection(format!("opus decoder: {e}")))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Decodes one Opus packet into PCM samples.
    pub fn decode(&self, packet: &[u8]) -> Result<Vec<i16>, TransportError> {
        let mut pcm = vec![0i16; MAX_DECODED_SAMPLES];
        let mut decoder = self
            .inner
            .lock()
            .map_err(|_| TransportError::PeerConnection("opus decoder poisoned".to_string()))?;
        let packet = audiopus::packet::Packet::try_from(packet)
            .map_err(|e| TransportError::PeerConnection(format!("opus decode: {e}")))?;
        let signals = audiopus::MutSignals::try_from(&mut pcm)
            .map_err(|e| TransportError::PeerConnection(format!("opus decode: {e}")))?;
        let written = decoder
            .decode(Some(packet), signals, false)
            .map_err(|e| TransportError::PeerConnection(format!("opus decode: {e}")))?;
        pcm.truncate(written);
        Ok(pcm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_recovers_frame_length() {
        let encoder = OpusEncoder::new().unwrap();
        let decoder = OpusDecoder::new().unwrap();
        let pcm: Vec<i16> = (0..FRAME_SAMPLES)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let packet = encoder.encode(&pcm).unwrap();
        assert!(!packet.is_empty());
        assert!(packet.len() < MAX_PACKET_BYTES);
        let decoded = decoder.decode(&packet).unwrap();
        assert_eq!(decoded.len(), FRAME_SAMPLES);
    }

    #[test]
    fn empty_packet_is_an_error() {
        let decoder = OpusDecoder::new().unwrap();
        assert!(decoder.decode(&[]).is_err());
    }
}

//! cpal-backed audio I/O (§6.1): real-time input/output streams feeding the audio ring
//! from/to a sound device, plus device enumeration.
//!
//! Like the teacher's `Soundcard`, the cpal `Stream` objects are owned by a dedicated
//! worker thread rather than handed across threads (they are not `Send` on every
//! platform); callers talk to the worker through a small command channel.

use std::borrow::Borrow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BuildStreamError, DevicesError, PlayStreamError, SampleFormat, SampleRate, Stream,
    SupportedStreamConfigRange, SupportedStreamConfigsError,
};
use thiserror::Error;

use arq_core::AudioRing;

/// Fixed sample rate the whole system operates at (§6.1).
pub const SAMPLE_RATE: u32 = 8000;

#[derive(Debug, Error)]
pub enum SoundcardError {
    #[error("sound card worker failed to start")]
    WorkerInit,

    #[error("unable to enumerate devices: {0}")]
    Host(#[source] DevicesError),

    #[error("unable to locate sound card '{0}' - is it in use?")]
    DeviceNotFound(String),

    #[error("unable to retrieve supported configs for device: {0}")]
    SupportedConfigs(#[source] SupportedStreamConfigsError),

    #[error("no 8 kHz mono/stereo 16-bit config available on this device")]
    NoValidConfigAvailable,

    #[error("unable to build device stream: {0}")]
    StreamBuild(#[source] BuildStreamError),

    #[error("unable to start stream: {0}")]
    StreamPlay(#[source] PlayStreamError),
}

fn config_is_compatible<C: Borrow<SupportedStreamConfigRange>>(config: C) -> bool {
    let config = config.borrow();
    (config.channels() == 1 || config.channels() == 2)
        && config.sample_format() == SampleFormat::I16
        && config.min_sample_rate().0 <= SAMPLE_RATE
        && config.max_sample_rate().0 >= SAMPLE_RATE
}

/// List input-capable devices on the default host offering an 8 kHz mono/stereo
/// 16-bit-compatible config.
pub fn supported_input_cards() -> Vec<String> {
    let mut out = vec![];
    let host = cpal::default_host();
    let Ok(devices) = host.input_devices() else {
        return out;
    };
    for d in devices {
        let Ok(mut configs) = d.supported_input_configs() else {
            continue;
        };
        if configs.any(config_is_compatible) {
            if let Ok(name) = d.name() {
                out.push(name);
            }
        }
    }
    out.sort();
    out
}

/// List output-capable devices on the default host offering an 8 kHz mono/stereo
/// 16-bit-compatible config.
pub fn supported_output_cards() -> Vec<String> {
    let mut out = vec![];
    let host = cpal::default_host();
    let Ok(devices) = host.output_devices() else {
        return out;
    };
    for d in devices {
        let Ok(mut configs) = d.supported_output_configs() else {
            continue;
        };
        if configs.any(config_is_compatible) {
            if let Ok(name) = d.name() {
                out.push(name);
            }
        }
    }
    out.sort();
    out
}

enum WorkerCommand {
    Close,
}

/// Handle to a running input+output device pair. Dropping it does not stop the
/// streams; call `close()` explicitly, mirroring the teacher's `Soundcard`.
pub struct Soundcard {
    cmd_tx: SyncSender<WorkerCommand>,
}

impl Soundcard {
    /// Open `input_name`/`output_name`, wiring the input stream into `rx_ring` and
    /// draining `tx_ring` into the output stream. While `is_transmitting` is set, the
    /// input stream pushes silence instead of microphone samples into `rx_ring`
    /// (half-duplex discipline, §4.5).
    pub fn open(
        input_name: &str,
        output_name: &str,
        rx_ring: Arc<AudioRing>,
        tx_ring: Arc<AudioRing>,
        is_transmitting: Arc<AtomicBool>,
    ) -> Result<Self, SoundcardError> {
        let (cmd_tx, cmd_rx) = sync_channel(8);
        let (setup_tx, setup_rx) = sync_channel(1);
        spawn_worker(
            input_name.to_string(),
            output_name.to_string(),
            rx_ring,
            tx_ring,
            is_transmitting,
            cmd_rx,
            setup_tx,
        );
        match setup_rx.recv() {
            Ok(Ok(())) => Ok(Self { cmd_tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SoundcardError::WorkerInit),
        }
    }

    pub fn close(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::Close);
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_worker(
    input_name: String,
    output_name: String,
    rx_ring: Arc<AudioRing>,
    tx_ring: Arc<AudioRing>,
    is_transmitting: Arc<AtomicBool>,
    cmd_rx: Receiver<WorkerCommand>,
    setup_tx: SyncSender<Result<(), SoundcardError>>,
) {
    std::thread::spawn(move || {
        let host = cpal::default_host();

        let input_device = match host
            .input_devices()
            .map_err(SoundcardError::Host)
            .and_then(|mut devs| {
                devs.find(|d| d.name().map(|n| n == input_name).unwrap_or(false))
                    .ok_or_else(|| SoundcardError::DeviceNotFound(input_name.clone()))
            }) {
            Ok(d) => d,
            Err(e) => {
                let _ = setup_tx.send(Err(e));
                return;
            }
        };
        let output_device = match host
            .output_devices()
            .map_err(SoundcardError::Host)
            .and_then(|mut devs| {
                devs.find(|d| d.name().map(|n| n == output_name).unwrap_or(false))
                    .ok_or_else(|| SoundcardError::DeviceNotFound(output_name.clone()))
            }) {
            Ok(d) => d,
            Err(e) => {
                let _ = setup_tx.send(Err(e));
                return;
            }
        };

        let input_stream = match build_input_stream(&input_device, rx_ring, is_transmitting) {
            Ok(s) => s,
            Err(e) => {
                let _ = setup_tx.send(Err(e));
                return;
            }
        };
        let output_stream = match build_output_stream(&output_device, tx_ring) {
            Ok(s) => s,
            Err(e) => {
                let _ = setup_tx.send(Err(e));
                return;
            }
        };

        if let Err(e) = input_stream.play() {
            let _ = setup_tx.send(Err(SoundcardError::StreamPlay(e)));
            return;
        }
        if let Err(e) = output_stream.play() {
            let _ = setup_tx.send(Err(SoundcardError::StreamPlay(e)));
            return;
        }

        let _ = setup_tx.send(Ok(()));

        while let Ok(WorkerCommand::Close) = cmd_rx.recv() {
            break;
        }
        // Dropping `input_stream`/`output_stream` here stops them.
    });
}

fn pick_config(
    configs: impl Iterator<Item = SupportedStreamConfigRange>,
) -> Result<cpal::SupportedStreamConfig, SoundcardError> {
    configs
        .filter(config_is_compatible)
        .next()
        .map(|c| c.with_sample_rate(SampleRate(SAMPLE_RATE)))
        .ok_or(SoundcardError::NoValidConfigAvailable)
}

fn build_input_stream(
    device: &cpal::Device,
    rx_ring: Arc<AudioRing>,
    is_transmitting: Arc<AtomicBool>,
) -> Result<Stream, SoundcardError> {
    let configs = device
        .supported_input_configs()
        .map_err(SoundcardError::SupportedConfigs)?;
    let config = pick_config(configs)?;
    let channels = config.channels() as usize;

    device
        .build_input_stream(
            &config.into(),
            move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                if is_transmitting.load(Ordering::Acquire) {
                    let silence = vec![0i16; data.len() / channels];
                    let _ = rx_ring.push(&silence);
                    return;
                }
                let mono: Vec<i16> = data.chunks(channels).map(|c| c[0]).collect();
                if rx_ring.push(&mono).is_err() {
                    log::warn!("rx audio ring overflow, dropping {} samples", mono.len());
                }
            },
            |e| log::warn!("input stream error: {e}"),
            None,
        )
        .map_err(SoundcardError::StreamBuild)
}

fn build_output_stream(device: &cpal::Device, tx_ring: Arc<AudioRing>) -> Result<Stream, SoundcardError> {
    let configs = device
        .supported_output_configs()
        .map_err(SoundcardError::SupportedConfigs)?;
    let config = pick_config(configs)?;
    let channels = config.channels() as usize;

    device
        .build_output_stream(
            &config.into(),
            move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                let available = tx_ring.available().min(frames);
                let samples = if available > 0 {
                    tx_ring.pop(available)
                } else {
                    Vec::new()
                };
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    let s = samples.get(i).copied().unwrap_or(0);
                    frame.fill(s);
                }
            },
            |e| log::warn!("output stream error: {e}"),
            None,
        )
        .map_err(SoundcardError::StreamBuild)
}

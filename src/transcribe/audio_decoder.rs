use std::io::Cursor;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::TranscriptionError;

/// Whisper consumes 16 kHz mono
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

const RESAMPLE_CHUNK: usize = 1024;

/// Mono samples at the stream's native rate
struct MonoStream {
    samples: Vec<f32>,
    sample_rate: u32,
}

fn decoding_failed(context: &str, e: impl std::fmt::Display) -> TranscriptionError {
    TranscriptionError::DecodingFailed(format!("{}: {}", context, e))
}

/// Decode a downloaded audio file to 16 kHz mono f32 PCM
///
/// `extension` is passed to the format probe as a hint; the container is still sniffed.
pub fn decode_audio_to_pcm(data: Vec<u8>, extension: Option<&str>) -> Result<Vec<f32>, TranscriptionError> {
    let stream = decode_mono(data, extension)?;

    let pcm = if stream.sample_rate == TARGET_SAMPLE_RATE {
        stream.samples
    } else {
        resample_mono(&stream.samples, stream.sample_rate)?
    };

    tracing::debug!(
        samples = pcm.len(),
        seconds = pcm.len() as f32 / TARGET_SAMPLE_RATE as f32,
        "Decoded audio for local inference"
    );

    Ok(pcm)
}

fn decode_mono(data: Vec<u8>, extension: Option<&str>) -> Result<MonoStream, TranscriptionError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let mut reader = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decoding_failed("unrecognised container", e))?
        .format;

    let (track_id, params) = match reader.default_track() {
        Some(track) => (track.id, track.codec_params.clone()),
        None => return Err(TranscriptionError::DecodingFailed("file has no audio stream".to_string())),
    };
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| TranscriptionError::DecodingFailed("stream does not declare a sample rate".to_string()))?;
    let channels = params.channels.map_or(1, |c| c.count()).max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| decoding_failed("unsupported codec", e))?;

    let mut samples = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(decoding_failed("read error", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let buffer = match decoder.decode(&packet) {
            Ok(buffer) => buffer,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = %e, "Dropping undecodable packet");
                continue;
            }
            Err(e) => return Err(decoding_failed("decoder error", e)),
        };
        if buffer.frames() == 0 {
            continue;
        }

        let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, *buffer.spec());
        interleaved.copy_interleaved_ref(buffer);
        push_mono(&mut samples, interleaved.samples(), channels);
    }

    if samples.is_empty() {
        return Err(TranscriptionError::DecodingFailed("stream contained no samples".to_string()));
    }

    Ok(MonoStream { samples, sample_rate })
}

/// Average interleaved frames into one channel
fn push_mono(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(interleaved.chunks_exact(channels).map(|frame| frame.iter().sum::<f32>() * scale));
}

fn resample_mono(samples: &[f32], source_rate: u32) -> Result<Vec<f32>, TranscriptionError> {
    let ratio = TARGET_SAMPLE_RATE as f64 / source_rate as f64;
    let target_len = (samples.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.92,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 128,
        window: WindowFunction::Blackman2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| decoding_failed("resampler setup", e))?;

    let mut out = Vec::with_capacity(target_len + RESAMPLE_CHUNK);
    let mut frames = samples.chunks_exact(RESAMPLE_CHUNK);

    for chunk in frames.by_ref() {
        let block = resampler
            .process(&[chunk], None)
            .map_err(|e| decoding_failed("resampling", e))?;
        out.extend(block.into_iter().flatten());
    }

    let tail = frames.remainder();
    if !tail.is_empty() {
        let block = resampler
            .process_partial(Some(&[tail][..]), None)
            .map_err(|e| decoding_failed("resampling", e))?;
        out.extend(block.into_iter().flatten());
    }

    // filter delay and tail padding leave the output slightly off the exact ratio
    out.resize(target_len, 0.0);
    Ok(out)
}

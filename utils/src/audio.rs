use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of the PCM16 audio carried by the realtime API.
pub const REALTIME_API_PCM16_SAMPLE_RATE: f64 = 24000.0;

pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits `samples` into `chunk_size` pieces, zero padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size.max(1))
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size.max(1), 0.0);
            chunk
        })
        .collect()
}

/// Resamples a whole mono buffer. Returns the input unchanged when the rates match.
pub fn resample(
    samples: &[f32],
    in_sampling_rate: f64,
    out_sampling_rate: f64,
) -> anyhow::Result<Vec<f32>> {
    if samples.is_empty() || (in_sampling_rate - out_sampling_rate).abs() < f64::EPSILON {
        return Ok(samples.to_vec());
    }

    let mut resampler = create_resampler(in_sampling_rate, out_sampling_rate, 1024)?;
    let chunk_size = resampler.input_frames_next();
    let mut resampled = Vec::with_capacity(
        (samples.len() as f64 * out_sampling_rate / in_sampling_rate) as usize + chunk_size,
    );
    for chunk in split_for_chunks(samples, chunk_size) {
        let out = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = out.first() {
            resampled.extend_from_slice(channel);
        }
    }

    // Drop what the zero padding of the last chunk produced.
    let expected = (samples.len() as f64 * out_sampling_rate / in_sampling_rate).round() as usize;
    resampled.truncate(expected);
    Ok(resampled)
}

/// Averages interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size.max(1))
}

// cargo run --example audio_frame
//
// Fills a 10ms stereo 48kHz frame in place through a buffer lock and hands
// it to the runtime.
use axis_msgbridge::Core::{LocalRuntime, NativeRuntime};
use axis_msgbridge::Msg::Structs::AudioDataFmt;
use axis_msgbridge::{AudioFrame, BridgeError, Env, PayloadMsg};

const SAMPLE_RATE: u32 = 48_000;
const CHANNELS: u32 = 2;
const SAMPLES_PER_CHANNEL: u32 = SAMPLE_RATE / 100;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let rt = LocalRuntime::with_defaults();
    let env = Env::new(rt.clone())?;

    let frame = AudioFrame::create(&env, "tone")?;
    frame.set_sample_rate(SAMPLE_RATE)?;
    frame.set_number_of_channels(CHANNELS)?;
    frame.set_bytes_per_sample(2)?;
    frame.set_samples_per_channel(SAMPLES_PER_CHANNEL)?;
    frame.set_data_fmt(AudioDataFmt::Interleaved)?;
    frame.set_timestamp(0)?;

    let size = frame.expected_buf_size()? as usize;
    frame.alloc_buf(size)?;
    println!("Managed: allocated {} bytes for {:?}", size, frame.meta()?);

    let mut lock = frame.lock_buf()?;
    for (i, sample) in lock.chunks_exact_mut(2 * CHANNELS as usize).enumerate() {
        let t = i as f32 / SAMPLE_RATE as f32;
        let value = ((t * 440.0 * std::f32::consts::TAU).sin() * i16::MAX as f32) as i16;
        for ch in sample.chunks_exact_mut(2) {
            ch.copy_from_slice(&value.to_le_bytes());
        }
    }

    // Still locked: the boundary refuses it.
    match env.send_audio_frame(&frame) {
        Err(BridgeError::LockedAtBoundary) => println!("Managed: send refused while locked"),
        other => println!("Managed: unexpected send result {:?}", other),
    }

    frame.unlock_buf(lock)?;
    env.send_audio_frame(&frame)?;

    for h in rt.drain_outbound() {
        println!(
            "Runtime: received '{}' with {} bytes",
            rt.name(h)?,
            rt.buf_size(h)?
        );
        rt.destroy(h);
    }
    Ok(())
}

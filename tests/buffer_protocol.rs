// Buffer protocol: alloc / lock / unlock / get_buf on the payload kinds.
//
// cargo test --test buffer_protocol -- --nocapture

use axis_msgbridge::Core::{BridgeError, LocalRuntime, NativeRuntime};
use axis_msgbridge::Msg::Structs::{AudioDataFmt, MsgKind, PixelFmt};
use axis_msgbridge::{AudioFrame, Data, Env, PayloadMsg, VideoFrame};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn setup() -> (Arc<LocalRuntime>, Env) {
    let _ = env_logger::builder().is_test(true).try_init();
    let rt = LocalRuntime::with_defaults();
    let env = Env::new(rt.clone()).unwrap();
    (rt, env)
}

#[test]
fn write_while_locked_is_visible_after_unlock() {
    let (_rt, env) = setup();
    let data = Data::create(&env, "payload").unwrap();
    data.alloc_buf(64).unwrap();

    let mut lock = data.lock_buf().unwrap();
    assert_eq!(lock.len(), 64);
    for (i, b) in lock.iter_mut().enumerate() {
        *b = i as u8;
    }
    data.unlock_buf(lock).unwrap();

    let bytes = data.get_buf().unwrap();
    assert_eq!(bytes, (0..64u8).collect::<Vec<_>>());
    assert!(!data.is_buf_locked().unwrap());
}

#[test]
fn second_lock_is_rejected() {
    let (_rt, env) = setup();
    let data = Data::create(&env, "payload").unwrap();
    data.alloc_buf(16).unwrap();

    let lock = data.lock_buf().unwrap();
    assert!(matches!(data.lock_buf(), Err(BridgeError::AlreadyLocked)));
    data.unlock_buf(lock).unwrap();

    // Released, so a fresh acquisition succeeds.
    let lock = data.lock_buf().unwrap();
    data.unlock_buf(lock).unwrap();
}

#[test]
fn unlock_with_another_messages_lock_is_a_mismatch() {
    let (_rt, env) = setup();
    let a = Data::create(&env, "a").unwrap();
    let b = Data::create(&env, "b").unwrap();
    a.alloc_buf(8).unwrap();
    b.alloc_buf(8).unwrap();

    let lock_a = a.lock_buf().unwrap();
    let lock_b = b.lock_buf().unwrap();

    assert_eq!(a.unlock_buf(lock_b), Err(BridgeError::TokenMismatch));
    // The rejected view released b's lock when it was dropped; a stays locked.
    assert!(!b.is_buf_locked().unwrap());
    assert!(a.is_buf_locked().unwrap());

    a.unlock_buf(lock_a).unwrap();
}

#[test]
fn stale_token_is_a_mismatch_at_the_runtime() {
    let (rt, env) = setup();
    let data = Data::create(&env, "payload").unwrap();
    data.alloc_buf(8).unwrap();
    let h = data.handle();

    let (stale, _) = rt.lock_buf(h).unwrap();
    rt.unlock_buf(h, &stale).unwrap();
    assert_eq!(rt.unlock_buf(h, &stale), Err(BridgeError::NotLocked));

    let (current, _) = rt.lock_buf(h).unwrap();
    assert_eq!(rt.unlock_buf(h, &stale), Err(BridgeError::TokenMismatch));
    rt.unlock_buf(h, &current).unwrap();
}

#[test]
fn live_view_cannot_be_released_by_an_older_token() {
    let (rt, env) = setup();
    let data = Data::create(&env, "payload").unwrap();
    data.alloc_buf(8).unwrap();
    let h = data.handle();

    // A genuine token from an earlier acquisition is the closest thing to a
    // forgery safe code can hold.
    let (earlier, _) = rt.lock_buf(h).unwrap();
    rt.unlock_buf(h, &earlier).unwrap();

    let mut view = data.lock_buf().unwrap();
    assert_eq!(env.runtime().unlock_buf(h, &earlier), Err(BridgeError::TokenMismatch));
    assert!(matches!(rt.lock_buf(h), Err(BridgeError::AlreadyLocked)));
    assert_eq!(data.alloc_buf(16), Err(BridgeError::AlreadyLocked));

    // The region behind the view is still the one it was granted.
    view.fill(0xAA);
    data.unlock_buf(view).unwrap();
    assert_eq!(data.get_buf().unwrap(), vec![0xAA; 8]);
}

#[test]
fn alloc_rejects_bad_sizes() {
    let _ = env_logger::builder().is_test(true).try_init();
    let env = Env::builder().with_max_buf_size(1024).build().unwrap();
    let data = Data::create(&env, "payload").unwrap();

    assert!(matches!(data.alloc_buf(0), Err(BridgeError::InvalidArgument(_))));
    assert!(matches!(data.alloc_buf(1025), Err(BridgeError::InvalidArgument(_))));
    data.alloc_buf(1024).unwrap();
    assert_eq!(data.buf_size().unwrap(), 1024);
}

#[test]
fn realloc_discards_previous_region() {
    let (_rt, env) = setup();
    let data = Data::create(&env, "payload").unwrap();
    data.alloc_buf(4).unwrap();
    let mut lock = data.lock_buf().unwrap();
    lock.copy_from_slice(&[9, 9, 9, 9]);
    data.unlock_buf(lock).unwrap();

    data.alloc_buf(6).unwrap();
    assert_eq!(data.get_buf().unwrap(), vec![0u8; 6]);
}

#[test]
fn lock_blocks_alloc_read_and_send() {
    let (rt, env) = setup();
    let data = Data::create(&env, "payload").unwrap();
    data.alloc_buf(32).unwrap();

    let lock = data.lock_buf().unwrap();
    assert_eq!(data.alloc_buf(64), Err(BridgeError::AlreadyLocked));
    assert_eq!(data.get_buf(), Err(BridgeError::AlreadyLocked));
    assert_eq!(env.send_data(&data), Err(BridgeError::LockedAtBoundary));
    assert_eq!(rt.outbound_len(), 0);

    data.unlock_buf(lock).unwrap();
    env.send_data(&data).unwrap();
    assert_eq!(rt.outbound_len(), 1);
}

#[test]
fn lock_without_buffer_is_invalid() {
    let (_rt, env) = setup();
    let data = Data::create(&env, "empty").unwrap();
    assert!(matches!(data.lock_buf(), Err(BridgeError::InvalidArgument(_))));
    assert_eq!(data.get_buf().unwrap(), Vec::<u8>::new());
    assert_eq!(data.buf_size().unwrap(), 0);
}

#[test]
fn dropped_view_releases_its_lock() {
    let (_rt, env) = setup();
    let data = Data::create(&env, "payload").unwrap();
    data.alloc_buf(8).unwrap();
    {
        let mut lock = data.lock_buf().unwrap();
        lock[0] = 0xAB;
    }
    assert!(!data.is_buf_locked().unwrap());
    assert_eq!(data.get_buf().unwrap()[0], 0xAB);
}

#[test]
fn audio_frame_interleaved_1920_bytes() {
    let (_rt, env) = setup();
    let frame = AudioFrame::create(&env, "pcm").unwrap();
    frame.set_sample_rate(48_000).unwrap();
    frame.set_number_of_channels(2).unwrap();
    frame.set_bytes_per_sample(2).unwrap();
    frame.set_samples_per_channel(480).unwrap();
    frame.set_data_fmt(AudioDataFmt::Interleaved).unwrap();
    assert_eq!(frame.expected_buf_size().unwrap(), 1920);

    frame.alloc_buf(1920).unwrap();
    let payload: Vec<u8> = (0..1920).map(|_| fastrand::u8(..)).collect();
    let mut lock = frame.lock_buf().unwrap();
    lock.copy_from_slice(&payload);
    frame.unlock_buf(lock).unwrap();

    assert_eq!(frame.get_buf().unwrap(), payload);
    let meta = frame.meta().unwrap();
    assert_eq!(meta.sample_rate, 48_000);
    assert_eq!(meta.data_fmt, AudioDataFmt::Interleaved);
    assert!(!meta.eof);
}

#[test]
fn audio_frame_size_mismatch_is_not_truncated() {
    let (_rt, env) = setup();
    let frame = AudioFrame::create(&env, "pcm").unwrap();
    frame.set_number_of_channels(2).unwrap();
    frame.set_bytes_per_sample(2).unwrap();
    frame.set_samples_per_channel(480).unwrap();

    frame.alloc_buf(1000).unwrap();
    assert_eq!(frame.buf_size().unwrap(), 1000);
}

#[test]
fn video_frame_fields_and_buffer() {
    let (_rt, env) = setup();
    let frame = VideoFrame::create(&env, "camera").unwrap();
    frame.set_width(4).unwrap();
    frame.set_height(2).unwrap();
    frame.set_pixel_fmt(PixelFmt::Rgba).unwrap();
    frame.set_timestamp(1_234).unwrap();
    frame.set_eof(true).unwrap();

    frame.alloc_buf(4 * 2 * 4).unwrap();
    let mut lock = frame.lock_buf().unwrap();
    lock.fill(0xFF);
    frame.unlock_buf(lock).unwrap();

    let meta = frame.meta().unwrap();
    assert_eq!((meta.width, meta.height), (4, 2));
    assert_eq!(meta.pixel_fmt, PixelFmt::Rgba);
    assert_eq!(meta.timestamp, 1_234);
    assert!(meta.eof);
    assert_eq!(frame.kind(), MsgKind::VideoFrame);
    assert!(frame.get_buf().unwrap().iter().all(|&b| b == 0xFF));
}

#[test]
fn contended_lock_is_exclusive() {
    let (_rt, env) = setup();
    let data = Data::create(&env, "shared").unwrap();
    data.alloc_buf(8).unwrap();

    let inside = Arc::new(AtomicUsize::new(0));
    let acquired = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let data = data.clone();
        let inside = inside.clone();
        let acquired = acquired.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..500 {
                let Ok(mut lock) = data.lock_buf() else {
                    continue;
                };
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                lock[0] = lock[0].wrapping_add(1);
                inside.fetch_sub(1, Ordering::SeqCst);
                data.unlock_buf(lock).unwrap();
                acquired.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let total = acquired.load(Ordering::Relaxed);
    assert!(total > 0);
    assert_eq!(data.get_buf().unwrap()[0], (total % 256) as u8);
}

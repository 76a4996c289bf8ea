// Log levels of the conditions that are reported rather than rejected.
//
// This binary installs its own logger, so it cannot share a process with
// env_logger. Tests are serialized because they read one shared record list.

use axis_msgbridge::Core::LocalRuntime;
use axis_msgbridge::{AudioFrame, Data, Env, PayloadMsg};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use serial_test::serial;

struct Captured;

static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());
static LOGGER: Captured = Captured;

impl Log for Captured {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS
            .lock()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn capture() {
    // Already installed by an earlier test in this binary.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
    RECORDS.lock().clear();
}

fn warnings() -> Vec<String> {
    RECORDS
        .lock()
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, msg)| msg.clone())
        .collect()
}

#[test]
#[serial]
fn audio_size_mismatch_is_a_warning() {
    capture();
    let env = Env::new(LocalRuntime::with_defaults()).unwrap();
    let frame = AudioFrame::create(&env, "pcm").unwrap();
    frame.set_number_of_channels(2).unwrap();
    frame.set_bytes_per_sample(2).unwrap();
    frame.set_samples_per_channel(480).unwrap();

    frame.alloc_buf(1920).unwrap();
    assert!(warnings().is_empty());

    frame.alloc_buf(1000).unwrap();
    let warned = warnings();
    assert_eq!(warned.len(), 1);
    assert!(warned[0].contains("'pcm'"));
    assert!(warned[0].contains("allocating 1000 bytes, layout implies 1920"));
    assert_eq!(frame.buf_size().unwrap(), 1000);
}

#[test]
#[serial]
fn dropped_lock_is_a_warning() {
    capture();
    let env = Env::new(LocalRuntime::with_defaults()).unwrap();
    let data = Data::create(&env, "held").unwrap();
    data.alloc_buf(4).unwrap();

    drop(data.lock_buf().unwrap());
    let warned = warnings();
    assert_eq!(warned.len(), 1);
    assert!(warned[0].contains("dropped without unlock_buf"));
    assert!(data.lock_buf().is_ok());
}

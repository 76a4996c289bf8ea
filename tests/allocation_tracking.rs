// Allocation tracking for the buffer protocol
//
// Note: Tests using dhat are marked with #[serial_test::serial] because
// dhat only allows one profiler to run at a time. They will run sequentially.
//
// # Run all allocation tracking tests
// cargo test --test allocation_tracking -- --nocapture

use axis_msgbridge::Core::LocalRuntime;
use axis_msgbridge::{Data, Env, PayloadMsg};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

const PAYLOAD: usize = 1024 * 1024;
const ROUNDS: usize = 64;

#[test]
#[serial_test::serial]
fn test_lock_write_unlock_does_not_copy_payload() {
    println!("\n--- Running lock/write/unlock with dhat ---");
    let _dhat = dhat::Profiler::new_heap();

    let env = Env::new(LocalRuntime::with_defaults()).unwrap();
    let data = Data::create(&env, "zero-copy").unwrap();
    data.alloc_buf(PAYLOAD).unwrap();

    let before = dhat::HeapStats::get();
    for round in 0..ROUNDS {
        let mut lock = data.lock_buf().unwrap();
        lock.fill(round as u8);
        data.unlock_buf(lock).unwrap();
    }
    let after = dhat::HeapStats::get();

    let delta = after.total_bytes - before.total_bytes;
    println!(
        "{} rounds over a {} byte buffer allocated {} bytes in {} blocks",
        ROUNDS,
        PAYLOAD,
        delta,
        after.total_blocks - before.total_blocks
    );
    // A single copy of the payload would already exceed this.
    assert!(delta < PAYLOAD as u64);
}

#[test]
#[serial_test::serial]
fn test_get_buf_is_a_snapshot_copy() {
    println!("\n--- Running get_buf with dhat ---");
    let _dhat = dhat::Profiler::new_heap();

    let env = Env::new(LocalRuntime::with_defaults()).unwrap();
    let data = Data::create(&env, "snapshot").unwrap();
    data.alloc_buf(PAYLOAD).unwrap();

    let before = dhat::HeapStats::get();
    let snapshot = data.get_buf().unwrap();
    let after = dhat::HeapStats::get();

    assert_eq!(snapshot.len(), PAYLOAD);
    assert!(after.total_bytes - before.total_bytes >= PAYLOAD as u64);
}

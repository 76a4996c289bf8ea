// cargo run --example ping_pong [num_results]
use axis_msgbridge::Core::{LocalRuntime, NativeRuntime, RuntimeConfig};
use axis_msgbridge::Msg::Structs::StatusCode;
use axis_msgbridge::{Cmd, Env};
use std::env;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let num_results: u32 = env::args()
        .nth(1)
        .map(|s| s.parse::<u32>())
        .transpose()?
        .unwrap_or(3);

    // Responders run on their own thread, so recv() really blocks.
    let rt = LocalRuntime::new(RuntimeConfig::default().with_threaded_dispatch(true));
    rt.on_cmd("ping", move |req| {
        for i in 0..num_results {
            std::thread::sleep(Duration::from_millis(50));
            let is_final = i + 1 == num_results;
            let sent = req.respond_with(StatusCode::Ok, is_final, |rt, h| {
                rt.set_property(h, "pong", serde_json::json!(i))
            });
            if let Err(e) = sent {
                eprintln!("Runtime: failed to answer ping: {}", e);
                return;
            }
        }
    });

    let env = Env::new(rt.clone())?;
    let cmd = Cmd::create(&env, "ping")?;

    let start = Instant::now();
    let stream = env.send_cmd(&cmd)?;
    println!("Managed: sent ping as cmd {}", stream.cmd_id());

    while let Some(result) = stream.recv() {
        println!(
            "Managed: pong {} (final: {}, completed: {}) after {:.2?}",
            result.get_property_to_json("pong")?,
            result.is_final()?,
            result.is_completed()?,
            start.elapsed()
        );
    }

    println!("Managed: stream finished, state {:?}", stream.state());
    println!("Runtime: {:?}", rt);
    Ok(())
}

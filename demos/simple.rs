use std::sync::{Arc, Mutex};

use chrono_tz::Tz;
use chronotab::Cron;

fn main() {
    tracing_subscriber::fmt::init();

    let cron = Cron::new(Tz::UTC);

    let ticks = Arc::new(Mutex::new(0));
    let ticks1 = Arc::clone(&ticks);
    let tick_id = cron
        .add_fn("@every 1s", move || {
            let mut count = ticks1.lock().unwrap();
            *count += 1;
            println!("tick {}", *count);
        })
        .unwrap();

    cron.start();

    std::thread::sleep(std::time::Duration::from_secs(3));

    // Jobs can be added while the scheduler runs.
    cron.add_fn("@every 2s", || {
        println!("slow tick");
    })
    .unwrap();

    std::thread::sleep(std::time::Duration::from_secs(4));

    cron.remove(tick_id);
    println!("removed the fast ticker");

    std::thread::sleep(std::time::Duration::from_secs(3));

    cron.stop().wait();
    println!("done, {} fast ticks total", *ticks.lock().unwrap());
}

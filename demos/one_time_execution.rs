//! One-time execution at an absolute instant, mixed with a recurring job.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use chrono_tz::Tz;
use chronotab::Cron;

fn main() {
    let cron = Cron::new(Tz::UTC);

    let counter = Arc::new(Mutex::new(0));

    // Fires exactly once, two seconds from now.
    let target = Utc::now() + Duration::seconds(2);
    println!("scheduling one-time job at {}", target.format("%H:%M:%S"));
    let counter1 = Arc::clone(&counter);
    cron.add_fn(target, move || {
        let mut count = counter1.lock().unwrap();
        *count += 1;
        println!("one-time job ran, counter = {}", *count);
    })
    .unwrap();

    // A second one-time job further out.
    let later = Utc::now() + Duration::seconds(5);
    let counter2 = Arc::clone(&counter);
    cron.add_fn(later, move || {
        let mut count = counter2.lock().unwrap();
        *count += 10;
        println!("second one-time job ran, counter = {}", *count);
    })
    .unwrap();

    // Recurring neighbor to show both kinds coexist.
    let recurring = Arc::new(Mutex::new(0));
    let recurring1 = Arc::clone(&recurring);
    cron.add_fn("@every 3s", move || {
        let mut count = recurring1.lock().unwrap();
        *count += 1;
        println!("recurring job ran {} times", *count);
    })
    .unwrap();

    println!("starting scheduler");
    cron.start();

    std::thread::sleep(std::time::Duration::from_secs(8));

    cron.stop().wait();

    println!("one-time counter: {}", *counter.lock().unwrap());
    println!("recurring counter: {}", *recurring.lock().unwrap());
}

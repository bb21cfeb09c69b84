use std::sync::Arc;

use chrono_tz::Tz;
use chronotab::AsyncCron;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() {
    let cron = AsyncCron::new(Tz::UTC);

    let ticks = Arc::new(Mutex::new(0));
    let ticks1 = Arc::clone(&ticks);
    cron.add_fn("@every 1s", move || {
        let ticks = Arc::clone(&ticks1);
        async move {
            let mut count = ticks.lock().await;
            *count += 1;
            println!("async tick {}", *count);
        }
    })
    .await
    .unwrap();

    cron.start().await;

    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    cron.stop().await;
    println!("done, {} ticks", *ticks.lock().await);
}

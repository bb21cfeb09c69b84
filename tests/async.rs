#[cfg(feature = "async")]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono_tz::Tz;
    use chronotab::{AsyncCron, ParseOption, Parser};
    use tokio::sync::Mutex;
    use tokio::time::{sleep, Duration};

    fn seconds_parser() -> Parser {
        Parser::new(
            ParseOption::SECOND
                | ParseOption::MINUTE
                | ParseOption::HOUR
                | ParseOption::DOM
                | ParseOption::MONTH
                | ParseOption::DOW
                | ParseOption::DESCRIPTOR,
        )
    }

    #[tokio::test]
    async fn start_and_stop_cron() {
        let cron = AsyncCron::new(Tz::UTC);

        cron.start().await;
        cron.stop().await;
    }

    #[tokio::test]
    async fn add_job() {
        let cron = AsyncCron::new(Tz::UTC).with_parser(seconds_parser());

        cron.start().await;

        let counter = Arc::new(Mutex::new(0));
        let counter1 = Arc::clone(&counter);

        cron.add_fn("* * * * * *", move || {
            let counter1 = Arc::clone(&counter1);
            async move {
                let mut value = counter1.lock().await;
                *value += 1;
            }
        })
        .await
        .unwrap();

        sleep(Duration::from_millis(2001)).await;
        let value = *counter.lock().await;
        assert!((2..=3).contains(&value), "got {} fires", value);

        cron.stop().await;
    }

    #[tokio::test]
    async fn add_multiple_jobs() {
        let cron = AsyncCron::new(Tz::UTC).with_parser(seconds_parser());

        cron.start().await;

        let counter1 = Arc::new(Mutex::new(0));
        let c1 = Arc::clone(&counter1);
        cron.add_fn("* * * * * *", move || {
            let counter = Arc::clone(&c1);
            async move {
                let mut value = counter.lock().await;
                *value += 1;
            }
        })
        .await
        .unwrap();

        let counter2 = Arc::new(Mutex::new(0));
        let c2 = Arc::clone(&counter2);
        cron.add_fn("*/2 * * * * *", move || {
            let counter = Arc::clone(&c2);
            async move {
                let mut value = counter.lock().await;
                *value += 1;
            }
        })
        .await
        .unwrap();

        sleep(Duration::from_millis(2001)).await;
        let every_second = *counter1.lock().await;
        let every_other = *counter2.lock().await;
        assert!(every_second >= 2, "got {} fires", every_second);
        assert!(every_other >= 1, "got {} fires", every_other);

        cron.stop().await;
    }

    #[tokio::test]
    async fn remove_job() {
        let cron = AsyncCron::new(Tz::UTC);

        cron.start().await;

        let counter = Arc::new(Mutex::new(0));
        let counter1 = Arc::clone(&counter);

        let job_id = cron
            .add_fn("@every 1s", move || {
                let counter1 = Arc::clone(&counter1);
                async move {
                    let mut value = counter1.lock().await;
                    *value += 1;
                }
            })
            .await
            .unwrap();

        sleep(Duration::from_millis(1200)).await;
        let fired = *counter.lock().await;
        assert!(fired >= 1, "job never fired");

        cron.remove(job_id).await;
        let after_remove = *counter.lock().await;

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(*counter.lock().await, after_remove);

        let ids: Vec<_> = cron.entries().await.iter().map(|e| e.id).collect();
        assert!(!ids.contains(&job_id));

        cron.stop().await;
    }

    #[tokio::test]
    async fn snapshot_reflects_live_entries() {
        let cron = AsyncCron::new(Tz::UTC);

        cron.add_fn("@every 1h", || async {}).await.unwrap();
        cron.add_fn("@every 2h", || async {}).await.unwrap();

        cron.start().await;

        let mut snapshot = cron.entries().await;
        assert_eq!(snapshot.len(), 2);

        snapshot.clear();
        assert_eq!(cron.entries().await.len(), 2);

        cron.stop().await;
    }
}

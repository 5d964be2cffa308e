use anyhow::Result;
use datacollection::DcError;
use datacollection::relay::bounded;
use std::thread;
use std::time::Duration;

#[test]
fn relay_yields_items_then_ends() -> Result<()> {
    let (tx, mut rx) = bounded::<i32>(2);
    let producer = thread::spawn(move || -> Result<(), DcError> {
        for i in 0..5 {
            tx.put(i)?;
        }
        tx.finish()
    });

    let got: Vec<i32> = rx.by_ref().collect();
    assert_eq!(got, vec![0, 1, 2, 3, 4]);
    assert!(rx.is_finished());
    assert!(!rx.ended_abnormally());
    producer.join().expect("producer thread")?;
    Ok(())
}

#[test]
fn output_is_fused_after_end_of_stream() -> Result<()> {
    let (tx, mut rx) = bounded::<&str>(1);
    let producer = thread::spawn(move || -> Result<(), DcError> {
        tx.put("only")?;
        tx.finish()
    });

    assert_eq!(rx.next(), Some("only"));
    assert_eq!(rx.next(), None);
    assert_eq!(rx.next(), None);
    assert_eq!(rx.next(), None);
    producer.join().expect("producer thread")?;
    Ok(())
}

#[test]
fn queue_never_holds_more_than_capacity() -> Result<()> {
    let (tx, mut rx) = bounded::<usize>(3);
    assert_eq!(rx.capacity(), 3);
    assert_eq!(tx.capacity(), 3);

    let producer = thread::spawn(move || -> Result<(), DcError> {
        for i in 0..50 {
            tx.put(i)?;
        }
        tx.finish()
    });

    let mut seen = 0;
    loop {
        // Give the producer time to fill the queue as far as it can.
        thread::sleep(Duration::from_millis(1));
        assert!(rx.queued() <= rx.capacity());
        match rx.next() {
            Some(i) => {
                assert_eq!(i, seen);
                seen += 1;
            }
            None => break,
        }
    }
    assert_eq!(seen, 50);
    producer.join().expect("producer thread")?;
    Ok(())
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let (tx, rx) = bounded::<u8>(0);
    assert_eq!(tx.capacity(), 1);
    assert_eq!(rx.capacity(), 1);
}

#[test]
fn put_after_consumer_dropped_reports_consumer_gone() {
    let (tx, rx) = bounded::<u8>(1);
    drop(rx);
    let err = tx.put(1).unwrap_err();
    assert!(matches!(err, DcError::ConsumerGone));
    assert!(matches!(tx.finish(), Err(DcError::ConsumerGone)));
}

#[test]
fn producer_vanishing_without_sentinel_ends_abnormally() {
    let (tx, mut rx) = bounded::<u8>(2);
    tx.put(7).expect("queue has room");
    drop(tx);

    assert_eq!(rx.next(), Some(7));
    assert_eq!(rx.next(), None);
    assert!(rx.ended_abnormally());
    assert_eq!(rx.next(), None);
}

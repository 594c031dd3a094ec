//! Tests for the shared work queue.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use watchq::model::WorkItem;
use watchq::queue::WorkQueue;

fn item(name: &str) -> WorkItem {
    WorkItem::new(format!("/in/{name}"), Path::new("/out")).unwrap()
}

#[test]
fn try_take_on_empty_queue_returns_none() {
    let queue = WorkQueue::new();
    assert!(queue.try_take().is_none());
    assert!(queue.is_empty());
}

#[test]
fn len_tracks_adds_and_takes() {
    let queue = WorkQueue::new();
    queue.add(item("a.txt"));
    queue.add(item("b.txt"));
    assert_eq!(queue.len(), 2);

    let taken = queue.try_take().expect("queue has items");
    assert!(taken == item("a.txt") || taken == item("b.txt"));
    assert_eq!(queue.len(), 1);

    queue.try_take().expect("one item left");
    assert!(queue.try_take().is_none());
    assert_eq!(queue.len(), 0);
}

#[test]
fn identical_items_are_not_deduplicated() {
    let queue = WorkQueue::new();
    queue.add(item("same.txt"));
    queue.add(item("same.txt"));

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.try_take(), Some(item("same.txt")));
    assert_eq!(queue.try_take(), Some(item("same.txt")));
}

#[test]
fn concurrent_consumers_claim_each_item_once() {
    const ITEMS: usize = 2000;
    const CONSUMERS: usize = 8;

    let queue = Arc::new(WorkQueue::new());
    for i in 0..ITEMS {
        queue.add(item(&format!("{i:05}.txt")));
    }

    let handles: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut claimed = Vec::new();
                while let Some(item) = queue.try_take() {
                    claimed.push(item.source().to_path_buf());
                }
                claimed
            })
        })
        .collect();

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for path in handle.join().unwrap() {
            total += 1;
            assert!(seen.insert(path.clone()), "{} claimed twice", path.display());
        }
    }

    assert_eq!(total, ITEMS);
    assert_eq!(seen.len(), ITEMS);
    assert!(queue.is_empty());
}

#[test]
fn producers_and_consumers_run_concurrently() {
    const PER_PRODUCER: usize = 500;
    const PRODUCERS: usize = 4;

    let queue = Arc::new(WorkQueue::new());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.add(item(&format!("{p}-{i}.txt")));
                }
            })
        })
        .collect();

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut claimed = HashSet::new();
            while claimed.len() < PER_PRODUCER * PRODUCERS {
                match queue.try_take() {
                    Some(item) => assert!(claimed.insert(item.source().to_path_buf())),
                    None => thread::yield_now(),
                }
            }
            claimed.len()
        })
    };

    for p in producers {
        p.join().unwrap();
    }
    assert_eq!(consumer.join().unwrap(), PER_PRODUCER * PRODUCERS);
    assert!(queue.try_take().is_none());
}

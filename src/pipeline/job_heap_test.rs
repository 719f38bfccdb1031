use rand::seq::SliceRandom;
use rand::Rng;

use super::*;
use crate::Band;

fn node_job(
    key: &str,
    ts: i64,
) -> ChangeJob {
    ChangeJob::put(key, ts.to_string().into_bytes(), ts, Band::Node)
}

#[test]
fn drain_returns_most_recent_first_and_empties_heap() {
    let heap = JobHeap::new();
    heap.push(node_job("a", 5));
    heap.push(node_job("b", 9));
    heap.push(node_job("c", 1));
    assert_eq!(heap.len(), 3);

    let drained: Vec<i64> = heap.drain_all().iter().map(|j| j.timestamp).collect();
    assert_eq!(drained, vec![9, 5, 1]);
    assert!(heap.is_empty());
    assert!(heap.drain_all().is_empty());
}

#[test]
fn dedup_keeps_newest_job_per_key() {
    let jobs = vec![
        node_job("n1", 3),
        node_job("n1", 7),
        node_job("n1", 5),
        node_job("n2", 2),
    ];

    let mut batch = DrainBatch::dedup(jobs);
    assert_eq!(batch.drained, 4);
    assert_eq!(batch.survivors(), 2);
    assert_eq!(batch.superseded(Band::Node), 2);
    assert_eq!(batch.superseded(Band::Cluster), 0);

    let first = batch.pop(Band::Node).unwrap();
    assert_eq!((first.key.as_str(), first.timestamp), ("n1", 7));
    assert_eq!(first.value, b"7".to_vec());
    let second = batch.pop(Band::Node).unwrap();
    assert_eq!((second.key.as_str(), second.timestamp), ("n2", 2));
    assert!(batch.pop(Band::Node).is_none());
    assert!(batch.pop(Band::Cluster).is_none());
}

#[test]
fn dedup_separates_bands() {
    let jobs = vec![
        ChangeJob::put("root/clusterConf", Vec::new(), 4, Band::Cluster),
        ChangeJob::put("root/clusterConf", Vec::new(), 8, Band::Cluster),
        node_job("root/nodeConf/n1", 6),
    ];

    let mut batch = DrainBatch::dedup(jobs);
    assert_eq!(batch.superseded(Band::Cluster), 1);
    assert_eq!(batch.superseded(Band::Node), 0);
    assert_eq!(batch.pop(Band::Cluster).map(|j| j.timestamp), Some(8));
    assert!(batch.pop(Band::Cluster).is_none());
    assert_eq!(batch.pop(Band::Node).map(|j| j.timestamp), Some(6));
}

#[test]
fn dedup_applies_to_failed_and_delete_jobs() {
    let jobs = vec![
        ChangeJob::failed("k", 10, Band::Node, "boom"),
        node_job("k", 4),
        ChangeJob::delete("k", 12, Band::Node),
    ];

    let mut batch = DrainBatch::dedup(jobs);
    let job = batch.pop(Band::Node).unwrap();
    assert_eq!(job.timestamp, 12);
    assert_eq!(job.action, crate::KvAction::Delete);
    assert!(batch.pop(Band::Node).is_none());
}

#[test]
fn shuffled_arrivals_converge_to_max_timestamp_per_key() {
    let mut rng = rand::thread_rng();
    let keys = ["n1", "n2", "n3", "n4"];
    let mut jobs = Vec::new();
    let mut expected = std::collections::HashMap::new();
    for ts in 1..=200i64 {
        let key = keys[rng.gen_range(0..keys.len())];
        expected.insert(key, ts);
        jobs.push(node_job(key, ts));
    }
    jobs.shuffle(&mut rng);

    let heap = JobHeap::new();
    for job in jobs {
        heap.push(job);
    }
    let mut batch = DrainBatch::dedup(heap.drain_all());
    assert_eq!(batch.drained, 200);
    assert_eq!(batch.survivors(), expected.len());

    let mut last = i64::MAX;
    while let Some(job) = batch.pop(Band::Node) {
        assert_eq!(expected.get(job.key.as_str()), Some(&job.timestamp));
        assert!(job.timestamp < last);
        last = job.timestamp;
    }
}

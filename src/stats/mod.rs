//! Reduction of benchmark samples into ranked statistics.

mod ranking;

pub use ranking::*;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;
use tdigests::TDigest;

use crate::model::{AggregateStat, Sample, StatKey};

/// Running totals for one group of samples.
#[derive(Default)]
struct Accumulator {
    total: usize,
    successes: usize,
    sum: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
    latencies: Vec<f64>,
}

impl Accumulator {
    fn add(&mut self, sample: &Sample) {
        self.total += 1;
        if !sample.is_success() {
            return;
        }

        let rtt = sample.latency;
        self.successes += 1;
        self.sum += rtt;
        self.min = Some(self.min.map_or(rtt, |m| m.min(rtt)));
        self.max = Some(self.max.map_or(rtt, |m| m.max(rtt)));
        self.latencies.push(rtt.as_nanos() as f64);
    }

    fn finish(self, key: StatKey) -> AggregateStat {
        let (p50, p95) = if self.latencies.is_empty() {
            (None, None)
        } else {
            let td = TDigest::from_values(self.latencies);
            (
                Some(nanos_to_duration(td.estimate_quantile(0.5))),
                Some(nanos_to_duration(td.estimate_quantile(0.95))),
            )
        };

        AggregateStat {
            key,
            min: self.min,
            max: self.max,
            mean: mean_of(self.sum, self.successes),
            p50,
            p95,
            total: self.total,
            successes: self.successes,
            success_sum: self.sum,
        }
    }
}

/// Mean of `count` latencies summing to `sum`; `None` for an empty group.
pub fn mean_of(sum: Duration, count: usize) -> Option<Duration> {
    if count == 0 {
        return None;
    }
    Some(Duration::from_nanos((sum.as_nanos() / count as u128) as u64))
}

fn nanos_to_duration(nanos: f64) -> Duration {
    Duration::from_nanos(nanos.max(0.0).round() as u64)
}

/// Order by mean latency; groups without a mean come after every group with one.
pub fn compare_means(a: Option<Duration>, b: Option<Duration>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn reduce_by<F>(samples: &[Sample], key_of: F) -> Vec<AggregateStat>
where
    F: Fn(&Sample) -> StatKey,
{
    let mut groups: BTreeMap<StatKey, Accumulator> = BTreeMap::new();
    for sample in samples {
        groups.entry(key_of(sample)).or_default().add(sample);
    }

    let mut stats: Vec<AggregateStat> = groups
        .into_iter()
        .map(|(key, acc)| acc.finish(key))
        .collect();

    stats.sort_by(|a, b| compare_means(a.mean, b.mean).then_with(|| a.key.cmp(&b.key)));
    stats
}

/// Statistics per (server name, server address), fastest mean first.
///
/// Only successful samples contribute latency; every sample counts toward
/// the success rate.
pub fn reduce_per_server(samples: &[Sample]) -> Vec<AggregateStat> {
    reduce_by(samples, |s| StatKey::Server {
        name: s.server_name.clone(),
        address: s.server_address.clone(),
    })
}

/// Statistics per domain across all servers, fastest mean first.
pub fn reduce_per_domain(samples: &[Sample]) -> Vec<AggregateStat> {
    reduce_by(samples, |s| StatKey::Domain {
        domain: s.domain.clone(),
    })
}

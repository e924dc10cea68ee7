//! Resolver ranking for the HTTP phase and grouping of its results.

use std::collections::BTreeMap;
use std::time::Duration;

use super::{compare_means, mean_of};
use crate::model::{AggregateStat, RankedIdentity, Sample, SampleGroup, ServerIdentity, StatKey};

/// Pick the `n` server identities with the lowest mean successful latency.
///
/// Addresses sharing a server name are merged: the identity keeps only the
/// addresses that answered successfully, and its mean covers all of their
/// successful samples. Servers with no success are never selected, so fewer
/// than `n` identities may be returned.
///
/// Kept addresses follow their order in `configured`, so the configured
/// primary stays first whenever it answered.
pub fn select_top(
    per_server: &[AggregateStat],
    configured: &[ServerIdentity],
    n: usize,
) -> Vec<RankedIdentity> {
    #[derive(Default)]
    struct Merged {
        addresses: Vec<String>,
        successes: usize,
        sum: Duration,
    }

    let mut merged: BTreeMap<&str, Merged> = BTreeMap::new();
    for stat in per_server {
        let StatKey::Server { name, address } = &stat.key else {
            continue;
        };
        if stat.successes == 0 {
            continue;
        }

        let entry = merged.entry(name.as_str()).or_default();
        if !entry.addresses.contains(address) {
            entry.addresses.push(address.clone());
        }
        entry.successes += stat.successes;
        entry.sum += stat.success_sum;
    }

    let mut ranked: Vec<RankedIdentity> = merged
        .into_iter()
        .filter_map(|(name, mut m)| {
            let order = configured
                .iter()
                .find(|c| c.name() == name)
                .map(|c| c.addresses())
                .unwrap_or_default();
            m.addresses.sort_by_key(|addr| {
                let pos = order.iter().position(|o| o == addr).unwrap_or(usize::MAX);
                (pos, addr.clone())
            });
            let mean = mean_of(m.sum, m.successes)?;
            let identity = ServerIdentity::new(name, m.addresses).ok()?;
            Some(RankedIdentity {
                identity,
                mean,
                successes: m.successes,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.mean
            .cmp(&b.mean)
            .then_with(|| a.identity.name().cmp(b.identity.name()))
    });

    if ranked.len() < n {
        tracing::warn!(
            "Only {} of {} requested resolvers answered successfully",
            ranked.len(),
            n
        );
    }
    ranked.truncate(n);
    ranked
}

/// Group HTTP samples by server name, fastest group first.
///
/// A group's mean covers every sample, failed ones included, since an HTTP
/// failure still has a measured elapsed time. Samples inside a group are
/// sorted by latency.
pub fn group_by_identity(samples: Vec<Sample>) -> Vec<SampleGroup> {
    let mut by_name: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        by_name.entry(sample.server_name.clone()).or_default().push(sample);
    }

    let mut groups: Vec<SampleGroup> = by_name
        .into_iter()
        .map(|(name, mut samples)| {
            samples.sort_by_key(|s| s.latency);
            let sum: Duration = samples.iter().map(|s| s.latency).sum();
            SampleGroup {
                mean: mean_of(sum, samples.len()).unwrap_or_default(),
                name,
                samples,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        compare_means(Some(a.mean), Some(b.mean)).then_with(|| a.name.cmp(&b.name))
    });
    groups
}

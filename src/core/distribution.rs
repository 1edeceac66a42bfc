use crate::core::settings::{ServerAddress, MAX_WEIGHT};
use std::str::FromStr;

/// Points placed on the consistent ring per unit of server weight
const POINTS_PER_WEIGHT: u32 = 100;

/// Picks which server of a link a key lives on
pub trait Distribution: Send + Sync {
    /// Index into the link's server list for this key
    fn select(&self, key: &[u8]) -> usize;

    /// Distribution name
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionKind {
    Modula,
    Consistent,
}

impl FromStr for DistributionKind {
    type Err = DistributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "modula" => Ok(DistributionKind::Modula),
            "consistent" => Ok(DistributionKind::Consistent),
            _ => Err(DistributionError::UnknownDistribution(s.to_string())),
        }
    }
}

/// Distribution factory
pub fn create_distribution(
    kind: DistributionKind,
    servers: &[ServerAddress],
) -> Box<dyn Distribution> {
    match kind {
        DistributionKind::Modula => Box::new(ModulaDistribution::new(servers)),
        DistributionKind::Consistent => Box::new(ConsistentDistribution::new(servers)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("Unknown distribution type: {0}")]
    UnknownDistribution(String),
}

/// Jenkins one-at-a-time hash
pub fn one_at_a_time(key: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &byte in key {
        hash = hash.wrapping_add(byte as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// Hash modulo a table where each server appears `weight` times
#[derive(Debug)]
pub struct ModulaDistribution {
    slots: Vec<usize>,
}

impl ModulaDistribution {
    pub fn new(servers: &[ServerAddress]) -> Self {
        let slots = servers
            .iter()
            .enumerate()
            .flat_map(|(index, server)| {
                std::iter::repeat(index).take(server.weight.clamp(1, MAX_WEIGHT) as usize)
            })
            .collect();
        Self { slots }
    }
}

impl Distribution for ModulaDistribution {
    fn select(&self, key: &[u8]) -> usize {
        match self.slots.len() {
            0 | 1 => 0,
            len => self.slots[one_at_a_time(key) as usize % len],
        }
    }

    fn name(&self) -> &str {
        "modula"
    }
}

/// Hash ring; adding or removing a server only moves the keys next to it
#[derive(Debug)]
pub struct ConsistentDistribution {
    ring: Vec<(u32, usize)>,
}

impl ConsistentDistribution {
    pub fn new(servers: &[ServerAddress]) -> Self {
        let mut ring = Vec::new();
        for (index, server) in servers.iter().enumerate() {
            let points = server.weight.clamp(1, MAX_WEIGHT) * POINTS_PER_WEIGHT;
            for point in 0..points {
                let label = format!("{}-{}", server.endpoint(), point);
                ring.push((one_at_a_time(label.as_bytes()), index));
            }
        }
        ring.sort_unstable();
        Self { ring }
    }
}

impl Distribution for ConsistentDistribution {
    fn select(&self, key: &[u8]) -> usize {
        if self.ring.is_empty() {
            return 0;
        }
        let hash = one_at_a_time(key);
        let position = self.ring.partition_point(|(point, _)| *point < hash);
        // Past the last point wraps to the start of the ring
        self.ring[position % self.ring.len()].1
    }

    fn name(&self) -> &str {
        "consistent"
    }
}

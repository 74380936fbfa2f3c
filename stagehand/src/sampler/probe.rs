//! Operating-system resource readings.

use async_trait::async_trait;
use std::time::Instant;
use sysinfo::{Networks, System};
use tracing::debug;

use crate::core::ResourceReadings;

const SECTOR_BYTES: u64 = 512;
const DISKSTATS_PATH: &str = "/proc/diskstats";

/// Source of resource readings. Called once per sampler tick.
#[async_trait]
pub trait ResourceProbe: Send {
    /// Takes one set of readings. Unavailable readings are zero.
    async fn read(&mut self) -> ResourceReadings;
}

#[derive(Debug, Clone, Copy)]
struct Counters {
    first: u64,
    second: u64,
    at: Instant,
}

impl Counters {
    fn new(first: u64, second: u64) -> Self {
        Self {
            first,
            second,
            at: Instant::now(),
        }
    }

    /// Per-second rates of both counters since `previous`.
    fn rates_since(&self, previous: Option<Self>) -> (f64, f64) {
        let Some(previous) = previous else {
            return (0.0, 0.0);
        };
        let elapsed = self.at.duration_since(previous.at).as_secs_f64();
        if elapsed <= 0.0 {
            return (0.0, 0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = |now: u64, then: u64| now.saturating_sub(then) as f64 / elapsed;
        (
            rate(self.first, previous.first),
            rate(self.second, previous.second),
        )
    }
}

/// Reads CPU, memory and interface counters through `sysinfo` and disk
/// sector counters from `/proc/diskstats`.
pub struct SystemProbe {
    system: System,
    networks: Networks,
    interface: String,
    disk_device: String,
    last_net: Option<Counters>,
    last_disk: Option<Counters>,
}

impl SystemProbe {
    /// Creates a probe for the given interface and block device.
    #[must_use]
    pub fn new(interface: impl Into<String>, disk_device: impl Into<String>) -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
            interface: interface.into(),
            disk_device: disk_device.into(),
            last_net: None,
            last_disk: None,
        }
    }

    fn network_counters(&mut self) -> Option<Counters> {
        self.networks.refresh();
        self.networks
            .iter()
            .find(|(name, _)| name.as_str() == self.interface)
            .map(|(_, data)| Counters::new(data.total_received(), data.total_transmitted()))
    }

}

impl std::fmt::Debug for SystemProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProbe")
            .field("interface", &self.interface)
            .field("disk_device", &self.disk_device)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResourceProbe for SystemProbe {
    async fn read(&mut self) -> ResourceReadings {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        let cpu_percent = f64::from(self.system.global_cpu_info().cpu_usage());
        #[allow(clippy::cast_precision_loss)]
        let mem_used_kb = (self.system.used_memory() / 1024) as f64;

        let net = self.network_counters();
        if net.is_none() {
            debug!(interface = %self.interface, "Interface not found");
        }
        let (net_rx_rate, net_tx_rate) = net.map_or((0.0, 0.0), |c| c.rates_since(self.last_net));
        self.last_net = net;

        let disk = disk_counters(&self.disk_device).await;
        let (read_sectors, write_sectors) =
            disk.map_or((0.0, 0.0), |c| c.rates_since(self.last_disk));
        self.last_disk = disk;

        #[allow(clippy::cast_precision_loss)]
        let kib_per_sector = SECTOR_BYTES as f64 / 1024.0;
        ResourceReadings {
            cpu_percent,
            mem_used_kb,
            net_rx_rate,
            net_tx_rate,
            disk_read_rate: read_sectors * kib_per_sector,
            disk_write_rate: write_sectors * kib_per_sector,
        }
    }
}

async fn disk_counters(device: &str) -> Option<Counters> {
    let content = tokio::fs::read_to_string(DISKSTATS_PATH).await.ok()?;
    parse_diskstats(&content, device).map(|(read, written)| Counters::new(read, written))
}

/// Extracts the sectors-read and sectors-written counters of `device`.
#[must_use]
pub fn parse_diskstats(content: &str, device: &str) -> Option<(u64, u64)> {
    content.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.get(2) != Some(&device) {
            return None;
        }
        let read = fields.get(5)?.parse().ok()?;
        let written = fields.get(9)?.parse().ok()?;
        Some((read, written))
    })
}

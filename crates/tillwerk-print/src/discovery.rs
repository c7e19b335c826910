// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subnet sweep for printers.
//
// Every host `prefix.1 ..= prefix.255` is probed on each candidate port with
// a bounded TCP connect. An accepted connection is reported as found; nothing
// more is checked, so any open service on a printer port shows up. Probes run
// in a bounded pool. Once the scan deadline passes, or `stop()` is called, no
// further probes are dispatched; those already running finish on their own
// timeout. A stop applies to the scans running when it was issued, never to
// one started afterwards.
//
// The scanner only reports. Adopting an endpoint into the registry is the
// operator's decision.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, instrument, warn};

use tillwerk_core::config::DiscoveryConfig;
use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::DiscoveredEndpoint;

/// Reachability check for one address.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    /// True when `addr` accepted a connection within `limit`.
    async fn probe(&self, addr: SocketAddr, limit: Duration) -> bool;
}

/// Plain TCP connect probe.
pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, addr: SocketAddr, limit: Duration) -> bool {
        matches!(timeout(limit, TcpStream::connect(addr)).await, Ok(Ok(_)))
    }
}

pub struct Scanner {
    probe: Arc<dyn Probe>,
    concurrency: usize,
    scan_timeout: Duration,
    /// Bumped by every `stop()`; a scan halts once it differs from the value
    /// it started with.
    stop_generation: AtomicU64,
}

impl Scanner {
    /// A scanner using real TCP probes.
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self::with_probe(Arc::new(TcpProbe), config)
    }

    pub fn with_probe(probe: Arc<dyn Probe>, config: &DiscoveryConfig) -> Self {
        Self {
            probe,
            concurrency: config.concurrency.max(1),
            scan_timeout: config.scan_timeout(),
            stop_generation: AtomicU64::new(0),
        }
    }

    /// Stop dispatching probes for every scan in progress. Best effort: probes
    /// already running are not interrupted, and scans started later are not
    /// affected.
    pub fn stop(&self) {
        self.stop_generation.fetch_add(1, Ordering::SeqCst);
        info!("discovery stop requested");
    }

    /// Sweep `prefix.1..=prefix.255` on every port in `ports`.
    ///
    /// `prefix` is the first three octets of an IPv4 address, e.g.
    /// `"192.168.1"`. Results are sorted by address then port.
    #[instrument(skip(self, ports), fields(ports = ?ports))]
    pub async fn discover(
        &self,
        prefix: &str,
        ports: &[u16],
        per_probe_timeout: Duration,
    ) -> Result<Vec<DiscoveredEndpoint>> {
        let [a, b, c] = parse_prefix(prefix)?;
        if ports.is_empty() {
            return Err(TillwerkError::Discovery("no ports to scan".into()));
        }
        let generation = self.stop_generation.load(Ordering::SeqCst);

        let deadline = Instant::now() + self.scan_timeout;
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut probes = JoinSet::new();
        let mut dispatched = 0usize;

        info!(concurrency = self.concurrency, "discovery scan started");
        'dispatch: for host in 1..=255u8 {
            for &port in ports {
                if self.stop_generation.load(Ordering::SeqCst) != generation {
                    info!(dispatched, "discovery stopped early");
                    break 'dispatch;
                }
                if Instant::now() >= deadline {
                    warn!(dispatched, "discovery scan timeout reached");
                    break 'dispatch;
                }
                let permit = match timeout_at(deadline, Arc::clone(&permits).acquire_owned()).await
                {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => break 'dispatch,
                    Err(_) => {
                        warn!(dispatched, "discovery scan timeout reached");
                        break 'dispatch;
                    }
                };

                let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(a, b, c, host)), port);
                let probe = Arc::clone(&self.probe);
                probes.spawn(async move {
                    let _permit = permit;
                    let open = timeout(per_probe_timeout, probe.probe(addr, per_probe_timeout))
                        .await
                        .unwrap_or(false);
                    open.then_some(addr)
                });
                dispatched += 1;
            }
        }

        let mut found = Vec::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(Some(addr)) => {
                    debug!(%addr, "endpoint answered");
                    found.push(DiscoveredEndpoint::found(addr.ip(), addr.port()));
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "probe task failed"),
            }
        }
        found.sort_by_key(|e| (e.ip, e.port));

        info!(dispatched, found = found.len(), "discovery scan finished");
        Ok(found)
    }
}

/// `"192.168.1"` → `[192, 168, 1]`.
fn parse_prefix(prefix: &str) -> Result<[u8; 3]> {
    let invalid = || {
        TillwerkError::Discovery(format!(
            "'{prefix}' is not a network prefix (expected three octets, e.g. 192.168.1)"
        ))
    };
    let octets: Vec<u8> = prefix
        .trim()
        .split('.')
        .map(|part| part.parse::<u8>().map_err(|_| invalid()))
        .collect::<Result<_>>()?;
    match octets.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    /// Answers only for a fixed set of addresses.
    struct Reachable {
        open: HashSet<SocketAddr>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Probe for Reachable {
        async fn probe(&self, addr: SocketAddr, _limit: Duration) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.open.contains(&addr)
        }
    }

    /// Sleeps on every probe and tracks peak concurrency.
    #[derive(Default)]
    struct Slow {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Probe for Slow {
        async fn probe(&self, _addr: SocketAddr, _limit: Duration) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    fn config(concurrency: usize, scan_timeout_ms: u64) -> DiscoveryConfig {
        DiscoveryConfig {
            concurrency,
            scan_timeout_ms,
            ..Default::default()
        }
    }

    #[test]
    fn prefix_parsing() {
        assert_eq!(parse_prefix("192.168.1").unwrap(), [192, 168, 1]);
        for bad in ["10.0", "10.0.0.1", "300.1.1", "a.b.c", ""] {
            assert!(
                matches!(parse_prefix(bad), Err(TillwerkError::Discovery(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn finds_only_reachable_endpoint() {
        let target: SocketAddr = "10.0.0.2:9100".parse().unwrap();
        let probe = Arc::new(Reachable {
            open: HashSet::from([target]),
            calls: AtomicUsize::new(0),
        });
        let scanner = Scanner::with_probe(probe.clone(), &config(64, 30_000));

        let found = scanner
            .discover("10.0.0", &[9100], Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(found, vec![DiscoveredEndpoint::found(target.ip(), 9100)]);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 255);
    }

    #[tokio::test]
    async fn results_sorted_by_address_and_port() {
        let open: HashSet<SocketAddr> = ["10.0.0.9:631", "10.0.0.9:515", "10.0.0.3:9100"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let probe = Arc::new(Reachable {
            open,
            calls: AtomicUsize::new(0),
        });
        let scanner = Scanner::with_probe(probe, &config(16, 30_000));

        let found = scanner
            .discover("10.0.0", &[9100, 515, 631], Duration::from_millis(500))
            .await
            .unwrap();
        let pairs: Vec<_> = found.iter().map(|e| (e.ip.to_string(), e.port)).collect();
        assert_eq!(
            pairs,
            vec![
                ("10.0.0.3".to_string(), 9100),
                ("10.0.0.9".to_string(), 515),
                ("10.0.0.9".to_string(), 631),
            ]
        );
    }

    #[tokio::test]
    async fn pool_is_bounded() {
        let probe = Arc::new(Slow::default());
        let scanner = Scanner::with_probe(probe.clone(), &config(4, 30_000));
        scanner
            .discover("10.1.1", &[9100], Duration::from_millis(500))
            .await
            .unwrap();
        assert!(probe.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 255);
    }

    #[tokio::test]
    async fn scan_deadline_stops_dispatch() {
        let probe = Arc::new(Slow::default());
        let scanner = Scanner::with_probe(probe.clone(), &config(1, 50));
        scanner
            .discover("10.1.1", &[9100], Duration::from_millis(500))
            .await
            .unwrap();
        assert!(probe.calls.load(Ordering::SeqCst) < 255);
    }

    #[tokio::test]
    async fn stop_halts_dispatch() {
        let probe = Arc::new(Slow::default());
        let scanner = Arc::new(Scanner::with_probe(probe.clone(), &config(1, 30_000)));

        let running = {
            let scanner = Arc::clone(&scanner);
            tokio::spawn(async move {
                scanner
                    .discover("10.1.1", &[9100], Duration::from_millis(500))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(60)).await;
        scanner.stop();

        running.await.unwrap().unwrap();
        assert!(probe.calls.load(Ordering::SeqCst) < 255);
    }

    /// Counts probes per third octet, sleeping on each.
    #[derive(Default)]
    struct PerNetwork {
        calls: std::sync::Mutex<std::collections::HashMap<u8, usize>>,
    }

    impl PerNetwork {
        fn count(&self, octet: u8) -> usize {
            self.calls
                .lock()
                .unwrap()
                .get(&octet)
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl Probe for PerNetwork {
        async fn probe(&self, addr: SocketAddr, _limit: Duration) -> bool {
            if let IpAddr::V4(ip) = addr.ip() {
                *self.calls.lock().unwrap().entry(ip.octets()[2]).or_default() += 1;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            false
        }
    }

    #[tokio::test]
    async fn stop_outlives_a_later_scan() {
        let probe = Arc::new(PerNetwork::default());
        let scanner = Arc::new(Scanner::with_probe(probe.clone(), &config(1, 30_000)));
        let spawn_scan = |prefix: &'static str| {
            let scanner = Arc::clone(&scanner);
            tokio::spawn(async move {
                scanner
                    .discover(prefix, &[9100], Duration::from_millis(500))
                    .await
            })
        };

        let first = spawn_scan("10.1.1");
        tokio::time::sleep(Duration::from_millis(60)).await;
        scanner.stop();
        let second = spawn_scan("10.2.2");

        first.await.unwrap().unwrap();
        assert!(probe.count(1) < 255);

        second.await.unwrap().unwrap();
        assert_eq!(probe.count(2), 255);
    }

    #[tokio::test]
    async fn loopback_listener_is_found() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _accept = tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let scanner = Scanner::new(&config(64, 30_000));
        let found = scanner
            .discover("127.0.0", &[port], Duration::from_millis(300))
            .await
            .unwrap();
        assert!(found.contains(&DiscoveredEndpoint::found(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port
        )));
    }

    #[tokio::test]
    async fn empty_port_list_is_an_error() {
        let scanner = Scanner::new(&DiscoveryConfig::default());
        assert!(
            scanner
                .discover("10.0.0", &[], Duration::from_millis(10))
                .await
                .is_err()
        );
    }
}

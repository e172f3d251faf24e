// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for feeds, sitemaps and rate limiting.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Service metrics. Cloning shares the underlying counters.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub feed_requests: IntCounterVec,
    pub rate_limit_decisions: IntCounterVec,
    pub rate_limit_store_errors: IntCounter,
    pub sitemap_requests: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let feed_requests = IntCounterVec::new(
            Opts::new("feed_requests_total", "Feed requests by kind and outcome"),
            &["kind", "outcome"],
        )?;
        let rate_limit_decisions = IntCounterVec::new(
            Opts::new(
                "rate_limit_decisions_total",
                "Rate limit decisions by action and outcome",
            ),
            &["action", "outcome"],
        )?;
        let rate_limit_store_errors = IntCounter::new(
            "rate_limit_store_errors_total",
            "Counter store failures seen by the rate limiter",
        )?;
        let sitemap_requests = IntCounterVec::new(
            Opts::new("sitemap_requests_total", "Sitemap and robots requests by kind"),
            &["kind"],
        )?;

        registry.register(Box::new(feed_requests.clone()))?;
        registry.register(Box::new(rate_limit_decisions.clone()))?;
        registry.register(Box::new(rate_limit_store_errors.clone()))?;
        registry.register(Box::new(sitemap_requests.clone()))?;

        Ok(Self {
            registry,
            feed_requests,
            rate_limit_decisions,
            rate_limit_store_errors,
            sitemap_requests,
        })
    }

    pub fn record_feed(&self, kind: &str, outcome: &str) {
        self.feed_requests.with_label_values(&[kind, outcome]).inc();
    }

    pub fn record_rate_limit(&self, action: &str, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "limited" };
        self.rate_limit_decisions
            .with_label_values(&[action, outcome])
            .inc();
    }

    pub fn record_sitemap(&self, kind: &str) {
        self.sitemap_requests.with_label_values(&[kind]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

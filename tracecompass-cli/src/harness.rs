//! Dispatch harness
//!
//! Registers the plugin callbacks into a [`CallbackTable`] and drives them
//! with synthetic events, the way a host would during trace processing.

use crate::config::HarnessConfig;
use crate::plugin::LoadedPlugin;
use crate::report::DispatchReport;
use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use std::time::Instant;
use tracecompass_plugin::{
    register_callbacks, CallbackTable, DeviceEventRecord, HostEventRecord, PluginError,
};

pub struct Harness {
    config: HarnessConfig,
    plugin: Option<LoadedPlugin>,
    table: CallbackTable,
}

impl Harness {
    /// Build a harness, loading the external plugin if one is configured
    pub fn new(config: HarnessConfig) -> Result<Self> {
        let plugin = match &config.plugin.library {
            Some(path) => Some(LoadedPlugin::load(path)?),
            None => None,
        };

        Ok(Self {
            config,
            plugin,
            table: CallbackTable::new(),
        })
    }

    /// Register the plugin callbacks (twice if configured)
    pub fn register(&self) {
        let passes = if self.config.plugin.register_twice { 2 } else { 1 };
        for pass in 0..passes {
            log::debug!("Registration pass {}", pass + 1);
            match &self.plugin {
                Some(plugin) => plugin.register(&self.table),
                None => register_callbacks(&self.table, self.table.session()),
            }
        }

        let stats = self.table.stats();
        log::info!(
            "Registered {} host and {} device callback(s)",
            stats.host,
            stats.device
        );
    }

    /// Register, then dispatch every configured round
    pub fn run(&self) -> Result<DispatchReport> {
        let started_at = Utc::now();
        self.register();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.dispatch.threads)
            .build()
            .context("Failed to build dispatch thread pool")?;

        log::info!(
            "Dispatching {} round(s) on {} thread(s)",
            self.config.dispatch.iterations,
            self.config.dispatch.threads
        );

        let clock = Instant::now();
        let (host_callbacks, device_callbacks) = pool.install(|| {
            (0..self.config.dispatch.iterations)
                .into_par_iter()
                .map(|round| self.dispatch_round(round))
                .try_reduce(|| (0, 0), |a, b| Ok((a.0 + b.0, a.1 + b.1)))
        })?;
        let elapsed = clock.elapsed();

        let stats = self.table.stats();
        Ok(DispatchReport {
            plugin: self
                .plugin
                .as_ref()
                .map(|p| p.path().display().to_string())
                .unwrap_or_else(|| String::from("in-process")),
            plugin_version: self
                .plugin
                .as_ref()
                .map(|p| p.version().unwrap_or("unknown").to_string())
                .unwrap_or_else(|| tracecompass_plugin::VERSION.to_string()),
            started_at,
            registered_host: stats.host,
            registered_device: stats.device,
            rounds: self.config.dispatch.iterations,
            threads: self.config.dispatch.threads,
            host_callbacks,
            device_callbacks,
            elapsed_ns: u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
        })
    }

    /// One host event then one device event
    fn dispatch_round(&self, round: u64) -> std::result::Result<(usize, usize), PluginError> {
        let vtid = rayon::current_thread_index().unwrap_or(0) as u64;
        let session = self.table.session();

        let host = round_host_event(&self.config.host_event, round, vtid);
        let device = DeviceEventRecord {
            common: round_host_event(&self.config.device_event.common, round, vtid),
            ..self.config.device_event.clone()
        };

        let host_count = self.table.dispatch_host(session, &host)?;
        let device_count = self.table.dispatch_device(session, &device)?;
        Ok((host_count, device_count))
    }
}

/// Shift the template event by `round` durations and stamp the worker's vtid
fn round_host_event(template: &HostEventRecord, round: u64, vtid: u64) -> HostEventRecord {
    let offset = i64::try_from(round.saturating_mul(template.dur)).unwrap_or(i64::MAX);
    HostEventRecord {
        vtid,
        ts: template.ts.saturating_add(offset),
        ..template.clone()
    }
}

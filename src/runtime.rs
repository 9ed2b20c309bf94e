use hifitime::prelude::{Duration, Epoch, TimeScale};

/// Acquisition bookkeeping
#[derive(Debug)]
pub struct Runtime {
    /// Epoch of deployment (system time)
    deploy_time: Epoch,

    /// Latest receiver [Epoch], in [TimeScale::GPST]
    epoch: Option<Epoch>,

    /// Number of decoded messages
    pub messages: u64,

    /// Number of malformed messages
    pub malformed: u64,

    /// Number of windows handed to the forwarders
    pub windows: u64,
}

impl Runtime {
    pub fn new(deploy_time: Epoch) -> Self {
        Self {
            deploy_time,
            epoch: None,
            messages: 0,
            malformed: 0,
            windows: 0,
        }
    }

    /// Update latest receiver epoch
    pub fn new_epoch(&mut self, epoch: Epoch) {
        self.epoch = Some(epoch.to_time_scale(TimeScale::GPST));
    }

    /// Returns latest receiver epoch in [TimeScale::GPST]
    pub fn gpst_time(&self) -> Option<Epoch> {
        self.epoch
    }

    /// Returns latest receiver epoch in [TimeScale::UTC]
    pub fn utc_time(&self) -> Option<Epoch> {
        self.epoch.map(|t| t.to_time_scale(TimeScale::UTC))
    }

    /// Time elapsed since deployment, at `now`
    pub fn uptime(&self, now: Epoch) -> Duration {
        now - self.deploy_time
    }

    /// Log line prefix: latest receiver epoch, rounded to the second
    pub fn stamp(&self) -> String {
        match self.epoch {
            Some(t) => t.round(Duration::from_seconds(1.0)).to_string(),
            None => "(no fix)".to_string(),
        }
    }
}

//! settings of the master wrapper, everything else is learned from the bus

use core::time::Duration;

/**
    settings used by [crate::Master] for its lifecycle and cyclic operations

    The defaults are the usual values for a bus scanned at startup and exchanged every millisecond.

    ```
    use etherwrap::MasterConfig;
    use core::time::Duration;

    let config = MasterConfig::default()
        .with_period(Duration::from_micros(500))
        .with_sdo_timeout(Duration::from_millis(200));
    assert_eq!(config.index, 0);
    ```
*/
#[derive(Clone, Debug, PartialEq)]
pub struct MasterConfig {
    /// index of the master to request from the master engine
    pub index: u32,
    /// maximum time waiting for the ethernet link in [crate::Master::init]
    pub link_timeout: Duration,
    /// maximum time waiting for the master engine to finish scanning the bus
    pub scan_timeout: Duration,
    /// delay between two checks while waiting for the link or the scan
    pub poll_interval: Duration,
    /// round-trip timeout given to every dictionary request handle
    pub sdo_timeout: Duration,
    /// period of the cyclic task
    pub period: Duration,
    /// raise the cyclic task's thread to realtime priority
    pub realtime: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            index: 0,
            link_timeout: Duration::from_secs(1),
            scan_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(1),
            sdo_timeout: Duration::from_millis(500),
            period: Duration::from_millis(1),
            realtime: false,
        }
    }
}

impl MasterConfig {
    pub fn with_index(self, index: u32) -> Self  {Self{index, ..self}}
    pub fn with_link_timeout(self, link_timeout: Duration) -> Self  {Self{link_timeout, ..self}}
    pub fn with_scan_timeout(self, scan_timeout: Duration) -> Self  {Self{scan_timeout, ..self}}
    pub fn with_poll_interval(self, poll_interval: Duration) -> Self  {Self{poll_interval, ..self}}
    pub fn with_sdo_timeout(self, sdo_timeout: Duration) -> Self  {Self{sdo_timeout, ..self}}
    pub fn with_period(self, period: Duration) -> Self  {Self{period, ..self}}
    pub fn with_realtime(self, realtime: bool) -> Self  {Self{realtime, ..self}}

    /// number of link or scan checks fitting in the given timeout, at least one
    pub(crate) fn attempts(&self, timeout: Duration) -> u32 {
        if self.poll_interval.is_zero()  {return 1}
        (timeout.as_nanos() / self.poll_interval.as_nanos()).clamp(1, u32::MAX as u128) as u32
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts() {
        let config = MasterConfig::default();
        assert_eq!(config.attempts(config.link_timeout), 1000);
        assert_eq!(config.attempts(Duration::ZERO), 1);
        assert_eq!(config.clone().with_poll_interval(Duration::ZERO).attempts(config.link_timeout), 1);
    }
}

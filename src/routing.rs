//! Device type to store endpoint routing

use std::collections::HashMap;

/// Read-only map from device type to endpoint address
///
/// Built once per run and shared by all workers without synchronization.
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<String, String>,
}

impl RoutingTable {
    /// Build the table from `(device_type, address)` pairs. Later pairs win.
    pub fn new<I, K, V>(routes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            routes: routes
                .into_iter()
                .map(|(device, address)| (device.into(), address.into()))
                .collect(),
        }
    }

    /// Endpoint address for a device type, if it is known
    pub fn route(&self, device_type: &str) -> Option<&str> {
        self.routes.get(device_type).map(String::as_str)
    }

    /// Distinct endpoint addresses
    pub fn endpoints(&self) -> Vec<&str> {
        let mut endpoints: Vec<&str> = self.routes.values().map(String::as_str).collect();
        endpoints.sort_unstable();
        endpoints.dedup();
        endpoints
    }

    /// Number of routed device types
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no device type is routed
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl From<&crate::config::Config> for RoutingTable {
    fn from(config: &crate::config::Config) -> Self {
        Self::new(config.routes.clone())
    }
}

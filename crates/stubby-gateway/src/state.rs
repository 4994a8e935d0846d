use ipnetwork::IpNetwork;
use std::sync::Arc;
use stubby_core::Shortener;

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    trusted_subnet: Option<IpNetwork>,
}

impl AppState {
    pub fn new(shortener: Arc<dyn Shortener>) -> Self {
        Self {
            shortener,
            trusted_subnet: None,
        }
    }

    /// Restricts internal endpoints to clients inside `subnet`.
    pub fn with_trusted_subnet(mut self, subnet: Option<IpNetwork>) -> Self {
        self.trusted_subnet = subnet;
        self
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn trusted_subnet(&self) -> Option<&IpNetwork> {
        self.trusted_subnet.as_ref()
    }
}

use crate::ports::outbound::BrowserEnvironment;
use parking_lot::RwLock;

/// Environment with values fixed by the host.
///
/// The origin can be changed after construction, e.g. by a wasm binding that
/// learns it after startup or by tests simulating navigation.
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    origin: RwLock<Option<String>>,
    nested_frame: bool,
    user_agent: Option<String>,
}

impl StaticEnvironment {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: RwLock::new(Some(origin.into())),
            nested_frame: false,
            user_agent: None,
        }
    }

    /// Page running inside an iframe.
    pub fn nested(mut self) -> Self {
        self.nested_frame = true;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn set_origin(&self, origin: Option<String>) {
        *self.origin.write() = origin;
    }
}

impl BrowserEnvironment for StaticEnvironment {
    fn current_origin(&self) -> Option<String> {
        self.origin.read().clone()
    }

    fn is_nested_frame(&self) -> bool {
        self.nested_frame
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }
}

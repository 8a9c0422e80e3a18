// ID Provider Port (for deterministic testing)

/// ID provider interface (allows deterministic episode ids in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique episode id
    fn generate_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Counter-based provider (tests): ep-1, ep-2, ...
pub struct SequenceProvider {
    counter: std::sync::atomic::AtomicU64,
}

impl SequenceProvider {
    pub fn new() -> Self {
        SequenceProvider {
            counter: std::sync::atomic::AtomicU64::new(1),
        }
    }
}

impl Default for SequenceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for SequenceProvider {
    fn generate_id(&self) -> String {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("ep-{}", n)
    }
}

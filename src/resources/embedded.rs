//! SF-004: Resources compiled into the binary.
//!
//! Embedders register `include_bytes!` content under its class-path name:
//!
//! ```ignore
//! let space = EmbeddedResources::new()
//!     .with("com/example/kv/Get.class", include_bytes!("../classes/com/example/kv/Get.class"));
//! ```

use super::ResourceSpace;
use indexmap::IndexMap;
use std::io::{self, Read};

/// Static, in-process resource space.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
    entries: IndexMap<String, &'static [u8]>,
}

impl EmbeddedResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `name` (leading `/` ignored).
    pub fn with(mut self, name: &str, bytes: &'static [u8]) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: &str, bytes: &'static [u8]) {
        self.entries
            .insert(name.trim_start_matches('/').to_string(), bytes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceSpace for EmbeddedResources {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + '_>>> {
        Ok(self
            .entries
            .get(name)
            .map(|bytes| Box::new(*bytes) as Box<dyn Read>))
    }

    fn contains(&self, name: &str) -> io::Result<bool> {
        Ok(self.entries.contains_key(name))
    }
}

//! Ordered collection of targets

use crate::target::Target;
use anyhow::Result;

/// Targets in insertion order
///
/// Iteration follows insertion order, which callers use as application
/// order. Applying rules across the inventory is up to the caller.
#[derive(Default)]
pub struct Inventory {
    targets: Vec<Box<dyn Target>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: impl Target + 'static) {
        self.targets.push(Box::new(target));
    }

    pub fn add_boxed(&mut self, target: Box<dyn Target>) {
        self.targets.push(target);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Target> {
        self.targets.iter().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Close every target, returning the first error after trying all
    pub fn close(&self) -> Result<()> {
        let mut first = None;
        for target in &self.targets {
            if let Err(e) = target.close() {
                log::warn!("Failed to close {target}: {e:#}");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a dyn Target;
    type IntoIter = Box<dyn Iterator<Item = &'a dyn Target> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

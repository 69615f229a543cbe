//! Activation-function registry seam.
//!
//! The catalog of valid activation names belongs to the host model runtime,
//! not to this schema. Callers inject whatever registry they have when
//! validating a [`MixLoraConfig`](crate::MixLoraConfig) whose `act_fn`
//! overrides the host model's native activation.

use std::collections::HashSet;

/// A host-supplied set of recognized activation-function names.
pub trait ActivationRegistry {
    /// Whether `name` is a recognized activation function.
    fn contains(&self, name: &str) -> bool;
}

impl ActivationRegistry for HashSet<String> {
    fn contains(&self, name: &str) -> bool {
        HashSet::contains(self, name)
    }
}

impl<'a> ActivationRegistry for [&'a str] {
    fn contains(&self, name: &str) -> bool {
        self.iter().any(|candidate| *candidate == name)
    }
}

impl<R: ActivationRegistry + ?Sized> ActivationRegistry for &R {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
}

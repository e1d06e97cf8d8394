//! Overload groups.
//!
//! An [`OverloadGroup`] is the ordered set of signatures sharing one callable
//! name. Declaration order is significant: it is the final tie-breaker.

use std::sync::Arc;

use crossbind_core::{RegistrationError, Signature};

/// Signatures considered together for one callable name.
#[derive(Debug, Clone)]
pub struct OverloadGroup {
    name: String,
    candidates: Vec<Arc<Signature>>,
}

impl OverloadGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), candidates: Vec::new() }
    }

    pub fn builder(name: impl Into<String>) -> OverloadGroupBuilder {
        OverloadGroupBuilder { group: Self::new(name) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Signature>> {
        self.candidates.get(index)
    }

    pub fn candidates(&self) -> &[Arc<Signature>] {
        &self.candidates
    }

    /// Append a candidate, returning its declaration index.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::InvalidDescriptor`] if a required parameter
    /// follows a defaulted one, and [`RegistrationError::ConflictingSignature`]
    /// if another candidate has the same parameter types.
    pub fn push(&mut self, signature: Signature) -> Result<usize, RegistrationError> {
        if !signature.defaults_are_trailing() {
            return Err(RegistrationError::InvalidDescriptor {
                name: signature.to_string(),
                reason: "defaulted parameters must come last".to_string(),
            });
        }
        let effective = signature.effective_types();
        if let Some(existing) = self.candidates.iter().find(|c| c.effective_types() == effective) {
            return Err(RegistrationError::ConflictingSignature {
                group: self.name.clone(),
                signature: signature.to_string(),
                existing: existing.to_string(),
            });
        }
        self.candidates.push(Arc::new(signature));
        Ok(self.candidates.len() - 1)
    }
}

/// Builder-style construction of an [`OverloadGroup`].
#[derive(Debug)]
pub struct OverloadGroupBuilder {
    group: OverloadGroup,
}

impl OverloadGroupBuilder {
    pub fn candidate(mut self, signature: Signature) -> Result<Self, RegistrationError> {
        self.group.push(signature)?;
        Ok(self)
    }

    pub fn build(self) -> OverloadGroup {
        self.group
    }
}

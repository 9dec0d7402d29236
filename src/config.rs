/// How strictly decoded samples are checked against the header.
///
/// Headers in the wild leave the initial value and checksum fields out, in
/// which case they read back as 0. `SkipZero` treats those zeros as
/// "not provided".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Every declared value is enforced, zero included
    Strict,
    /// A declared 0 is not checked
    #[default]
    SkipZero,
    /// Nothing is checked; metadata is only regenerated
    Disabled,
}

impl ValidationPolicy {
    pub fn checks_checksum(&self, declared: i32) -> bool {
        match self {
            ValidationPolicy::Strict => true,
            ValidationPolicy::SkipZero => declared != 0,
            ValidationPolicy::Disabled => false,
        }
    }

    pub fn checks_initial_value(&self, declared: i32) -> bool {
        self.checks_checksum(declared)
    }
}

/// Options for reading a record.
///
/// # Examples
///
/// ```rust
/// use wfdb::{ReadOptions, ValidationPolicy};
///
/// let options = ReadOptions::default().validation(ValidationPolicy::Strict);
/// assert_eq!(options.validation, ValidationPolicy::Strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    pub validation: ValidationPolicy,
}

impl ReadOptions {
    pub fn validation(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }
}

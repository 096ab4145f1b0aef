//! Resource quantity fields (memory, CPU, volume size), validated by the
//! backend.

use crate::gateway::BackendGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldStatus {
    /// Nothing entered; quantities are optional
    #[default]
    Empty,
    /// Waiting for the backend answer
    Pending,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Default)]
pub struct QuantityField {
    value: String,
    status: FieldStatus,
}

impl QuantityField {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn status(&self) -> FieldStatus {
        self.status
    }

    /// Values loaded from the document are taken as valid
    pub fn load(&mut self, value: &str) {
        self.value = value.to_string();
        self.status = if value.is_empty() {
            FieldStatus::Empty
        } else {
            FieldStatus::Valid
        };
    }

    /// Store a new value. Non-empty values become `Pending` until resolved.
    pub fn set(&mut self, value: &str) {
        self.value = value.to_string();
        self.status = if value.is_empty() {
            FieldStatus::Empty
        } else {
            FieldStatus::Pending
        };
    }

    /// Record the backend answer for `value`. Answers for a value that has
    /// since been replaced are dropped.
    pub fn resolve(&mut self, value: &str, valid: bool) -> bool {
        if self.value != value || self.status != FieldStatus::Pending {
            return false;
        }
        self.status = if valid {
            FieldStatus::Valid
        } else {
            FieldStatus::Invalid
        };
        true
    }

    /// Ask the backend about a pending value. A transport failure counts as
    /// invalid.
    pub async fn validate_pending<G>(&mut self, gateway: &G) -> FieldStatus
    where
        G: BackendGateway + ?Sized,
    {
        if self.status == FieldStatus::Pending {
            let value = self.value.clone();
            let valid = match gateway.validate_quantity(&value).await {
                Ok(valid) => valid,
                Err(e) => {
                    tracing::warn!(quantity = %value, error = %e, "Quantity validation failed");
                    false
                }
            };
            self.resolve(&value, valid);
        }
        self.status
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.status, FieldStatus::Empty | FieldStatus::Valid)
    }

    pub fn problem(&self, label: &str) -> Option<String> {
        match self.status {
            FieldStatus::Pending => Some(format!("{label} is being validated")),
            FieldStatus::Invalid => Some(format!("{label} {:?} is not a valid quantity", self.value)),
            FieldStatus::Empty | FieldStatus::Valid => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_until_resolved() {
        let mut field = QuantityField::default();
        assert_eq!(field.status(), FieldStatus::Empty);
        assert!(field.is_valid());

        field.set("128Mi");
        assert_eq!(field.status(), FieldStatus::Pending);
        assert!(!field.is_valid());

        assert!(field.resolve("128Mi", true));
        assert_eq!(field.status(), FieldStatus::Valid);
    }

    #[test]
    fn test_answer_for_replaced_value_dropped() {
        let mut field = QuantityField::default();
        field.set("1x");
        field.set("1Gi");

        assert!(!field.resolve("1x", false));
        assert_eq!(field.status(), FieldStatus::Pending);
        assert!(field.resolve("1Gi", true));
    }

    #[test]
    fn test_clearing_makes_valid() {
        let mut field = QuantityField::default();
        field.set("bad");
        field.resolve("bad", false);
        assert_eq!(field.problem("memory limit").unwrap(), "memory limit \"bad\" is not a valid quantity");

        field.set("");
        assert!(field.is_valid());
    }
}

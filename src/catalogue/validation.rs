//! Input validation for export requests.
//!
//! Every problem is collected before reporting so a caller can fix the whole
//! payload in one round trip.

use std::collections::HashMap;
use std::fmt;

use super::models::ExportRequest;

/// Validation error with a user-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation, e.g. `products[2].category`.
    pub field: String,
    pub message: String,
    /// How to fix it.
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create error for empty required field
    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} must not be empty", label))
            .with_suggestion(format!("Provide a {} for this product", label.to_lowercase()))
    }

    pub fn duplicate_sequence(field: &str, index: usize, first: usize) -> Self {
        Self::new(
            field,
            format!("sequence_index {} is already used by products[{}]", index, first),
        )
        .with_suggestion("Give every product a distinct position in the catalogue")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Numbered, multi-line summary for HTTP error bodies.
    pub fn to_message(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }

        let mut parts = vec![format!(
            "Validation failed: {} problem(s) found",
            self.len()
        )];
        for (i, error) in self.errors.iter().enumerate() {
            parts.push(format!("{}. {}", i + 1, error));
        }
        parts.join("\n")
    }

    /// Ok if no errors, Err with the formatted message otherwise.
    pub fn into_result(self) -> Result<(), String> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.to_message())
        }
    }
}

/// Trait for validating request objects.
pub trait Validator {
    fn validate(&self) -> Result<(), String>;
}

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, label));
    }
}

impl Validator for ExportRequest {
    /// An empty product list is valid and produces the skeleton document.
    fn validate(&self) -> Result<(), String> {
        let mut errors = ValidationErrors::new();
        let mut seen: HashMap<usize, usize> = HashMap::new();

        for (i, product) in self.products.iter().enumerate() {
            validate_required(
                &product.collection_name,
                &format!("products[{i}].collection_name"),
                "Collection name",
                &mut errors,
            );
            validate_required(
                &product.category,
                &format!("products[{i}].category"),
                "Category",
                &mut errors,
            );
            validate_required(
                &product.display_name,
                &format!("products[{i}].display_name"),
                "Display name",
                &mut errors,
            );

            if let Some(first) = seen.insert(product.sequence_index, i) {
                // Keep pointing at the first holder of the index.
                seen.insert(product.sequence_index, first);
                errors.add(ValidationError::duplicate_sequence(
                    &format!("products[{i}].sequence_index"),
                    product.sequence_index,
                    first,
                ));
            }
        }

        errors.into_result()
    }
}

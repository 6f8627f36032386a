use catalogue_export_server::catalogue::validation::{
    validate_required, ValidationError, ValidationErrors, Validator,
};
use catalogue_export_server::catalogue::{CaseSizeTable, ExportRequest, ProductRecord};

fn request(products: Vec<ProductRecord>) -> ExportRequest {
    ExportRequest {
        client_name: "Acme".to_string(),
        products,
        case_sizes: CaseSizeTable::new(),
    }
}

#[test]
fn test_validate_required_empty() {
    let mut errors = ValidationErrors::new();
    validate_required("   ", "products[0].category", "Category", &mut errors);
    assert_eq!(errors.len(), 1);
    assert!(errors.to_message().contains("Category must not be empty"));
}

#[test]
fn test_validate_required_valid() {
    let mut errors = ValidationErrors::new();
    validate_required("Masala Sticks", "products[0].category", "Category", &mut errors);
    assert!(errors.is_empty());
}

#[test]
fn test_empty_product_list_is_valid() {
    assert!(request(Vec::new()).validate().is_ok());
}

#[test]
fn test_blank_fields_are_all_reported() {
    let products = vec![
        ProductRecord::new("HEM", "", "Rose", 0),
        ProductRecord::new(" ", "Cones", "", 1),
    ];
    let message = request(products).validate().unwrap_err();

    assert!(message.starts_with("Validation failed: 3 problem(s) found"));
    assert!(message.contains("[products[0].category]"));
    assert!(message.contains("[products[1].collection_name]"));
    assert!(message.contains("[products[1].display_name]"));
}

#[test]
fn test_duplicate_sequence_index() {
    let products = vec![
        ProductRecord::new("HEM", "Cones", "Rose", 4),
        ProductRecord::new("HEM", "Cones", "Jasmine", 2),
        ProductRecord::new("HEM", "Cones", "Sandal", 4),
        ProductRecord::new("HEM", "Cones", "Loban", 4),
    ];
    let message = request(products).validate().unwrap_err();

    assert!(message.starts_with("Validation failed: 2 problem(s) found"));
    assert!(message.contains("sequence_index 4 is already used by products[0]"));
    assert!(message.contains("[products[3].sequence_index]"));
}

#[test]
fn test_error_suggestion_formatting() {
    let error = ValidationError::new("client_name", "too long").with_suggestion("Shorten it");
    assert_eq!(error.to_string(), "[client_name] too long. Shorten it");

    let mut errors = ValidationErrors::new();
    errors.add(error);
    errors.add(ValidationError::new("products", "bad"));
    let message = errors.to_message();
    assert!(message.contains("\n1. [client_name] too long. Shorten it"));
    assert!(message.contains("\n2. [products] bad"));
}

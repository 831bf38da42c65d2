use rand::Rng;
use serde_json::json;

use crate::db::Document;

use super::{decimal_between, int_between, text};

/// One synthetic product document.
///
/// Bounds: `category_id` ∈ [0, 5000], `price` ∈ [1, 5000] with two-digit
/// precision, `quantity_available` ∈ [0, 5000], `discount_percentage` ∈
/// [0, 1] with two-digit precision. `product_name` doubles as the sample key
/// for point lookups.
pub fn product(rng: &mut impl Rng) -> Document {
    let mut document = Document::new();
    document.insert("product_name".to_owned(), json!(text::word(rng)));
    document.insert("category_id".to_owned(), json!(int_between(rng, 0, 5000)));
    document.insert("price".to_owned(), json!(decimal_between(rng, 1.0, 5000.0)));
    document.insert(
        "quantity_available".to_owned(),
        json!(int_between(rng, 0, 5000)),
    );
    document.insert(
        "discount_percentage".to_owned(),
        json!(decimal_between(rng, 0.0, 1.0)),
    );
    document.insert("description".to_owned(), json!(text::paragraph(rng)));
    document.insert("image_url".to_owned(), json!(text::url(rng)));
    document.insert("created_at".to_owned(), json!(text::datetime(rng)));
    document
}

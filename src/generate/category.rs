use rand::Rng;
use serde_json::json;

use crate::db::Document;

use super::text;

/// One synthetic category document. `category_name` is the sample key.
pub fn category(rng: &mut impl Rng) -> Document {
    let mut document = Document::new();
    document.insert("category_name".to_owned(), json!(text::word(rng)));
    document.insert("description".to_owned(), json!(text::paragraph(rng)));
    document
}

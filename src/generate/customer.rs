use rand::Rng;
use serde_json::json;

use crate::db::Document;

use super::text;

/// One synthetic customer document. `name` is the sample key.
pub fn customer(rng: &mut impl Rng) -> Document {
    let mut document = Document::new();
    document.insert("name".to_owned(), json!(text::full_name(rng)));
    document.insert("email".to_owned(), json!(text::email(rng)));
    document.insert("phone_number".to_owned(), json!(text::phone_number(rng)));
    document.insert("address".to_owned(), json!(text::street_address(rng)));
    document.insert("city".to_owned(), json!(text::city(rng)));
    document.insert("country".to_owned(), json!(text::country(rng)));
    document.insert("postal_code".to_owned(), json!(text::postal_code(rng)));
    document.insert("created_at".to_owned(), json!(text::datetime(rng)));
    document
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn customers_carry_full_contact_details() {
        let mut rng = StdRng::seed_from_u64(22);
        for _ in 0..100 {
            let document = customer(&mut rng);
            assert!(document["name"].as_str().unwrap().contains(' '));
            assert!(document["email"].as_str().unwrap().contains('@'));
            assert!(document["phone_number"].as_str().unwrap().starts_with('+'));
            assert_eq!(document["postal_code"].as_str().unwrap().len(), 5);
            assert_eq!(document.len(), 8);
        }
    }
}

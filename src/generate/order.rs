use rand::Rng;
use serde_json::json;

use crate::db::Document;

use super::{decimal_between, int_between, text};

/// One synthetic order document.
///
/// Bounds: `customer_id` ∈ [0, 10_000_000], `total_amount` ∈ [1, 500_000]
/// with two-digit precision. `customer_id` is generated independently of any
/// existing customer document - load realism, not referential integrity.
/// The composite `(customer_id, order_date)` pair is the sample key.
pub fn order(rng: &mut impl Rng) -> Document {
    let mut document = Document::new();
    document.insert(
        "customer_id".to_owned(),
        json!(int_between(rng, 0, 10_000_000)),
    );
    document.insert("order_date".to_owned(), json!(text::datetime(rng)));
    document.insert(
        "total_amount".to_owned(),
        json!(decimal_between(rng, 1.0, 500_000.0)),
    );
    document.insert("payment_status".to_owned(), json!(text::word(rng)));
    document.insert(
        "shipping_address".to_owned(),
        json!(text::street_address(rng)),
    );
    document.insert("shipping_city".to_owned(), json!(text::city(rng)));
    document.insert("shipping_country".to_owned(), json!(text::country(rng)));
    document.insert(
        "shipping_postal_code".to_owned(),
        json!(text::postal_code(rng)),
    );
    document.insert("created_at".to_owned(), json!(text::datetime(rng)));
    document
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn orders_always_satisfy_their_bounds() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..1000 {
            let document = order(&mut rng);

            let customer_id = document["customer_id"].as_i64().unwrap();
            assert!((0..=10_000_000).contains(&customer_id));

            let total = document["total_amount"].as_f64().unwrap();
            assert!((1.0..=500_000.0).contains(&total));

            assert!(document["order_date"].is_string());
            assert_eq!(document.len(), 9);
        }
    }
}

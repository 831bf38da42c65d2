//! Synthetic entity documents.
//!
//! One generator per entity type, each producing a flat document with a
//! fixed field set. Field presence and types never vary; only the values do,
//! and every numeric value is drawn from a closed, bounded range that is
//! part of the generator's contract. Generators cannot fail.

pub mod text;

mod category;
mod customer;
mod order;
mod product;

pub use category::category;
pub use customer::customer;
pub use order::order;
pub use product::product;

use rand::Rng;
use strum_macros::{Display, EnumIter};

use crate::db::Document;

/// The four entity types the workload writes and reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Entity {
    Product,
    Category,
    Customer,
    Order,
}

impl Entity {
    /// Plural form, used in bulk operation names.
    pub fn plural(&self) -> &'static str {
        match self {
            Entity::Product => "products",
            Entity::Category => "categories",
            Entity::Customer => "customers",
            Entity::Order => "orders",
        }
    }
}

/// Generates one document of the given entity type.
pub fn generate(entity: Entity, rng: &mut impl Rng) -> Document {
    match entity {
        Entity::Product => product(rng),
        Entity::Category => category(rng),
        Entity::Customer => customer(rng),
        Entity::Order => order(rng),
    }
}

// A bounded integer field value, inclusive on both ends.
pub(crate) fn int_between(rng: &mut impl Rng, min: i64, max: i64) -> i64 {
    rng.gen_range(min..=max)
}

// A bounded decimal field value with two-digit precision, inclusive on both
// ends. Rounding half a cent cannot leave the closed range.
pub(crate) fn decimal_between(rng: &mut impl Rng, min: f64, max: f64) -> f64 {
    (rng.gen_range(min..=max) * 100.0).round() / 100.0
}

//! Realistic-looking filler values for text, contact and timestamp fields.
//!
//! The content of these fields is not load-relevant, only their size and
//! shape (a few sentences, a valid-looking e-mail or URL). Everything is
//! composed from small fixed word tables instead of byte noise so that the
//! documents resemble what an application would actually store.

use chrono::{DateTime, SecondsFormat};
use rand::Rng;

const WORDS: &[&str] = &[
    "amber", "anchor", "apex", "aurora", "basalt", "beacon", "birch", "breeze", "canyon",
    "cedar", "cinder", "cobalt", "comet", "coral", "crest", "dawn", "delta", "drift",
    "ember", "fable", "fern", "flint", "garnet", "glade", "grove", "harbor", "hazel",
    "horizon", "indigo", "iris", "jasper", "juniper", "lagoon", "lantern", "lark",
    "lichen", "linden", "maple", "meadow", "mesa", "mica", "mistral", "nectar", "nimbus",
    "oak", "onyx", "opal", "orchard", "pebble", "pine", "prairie", "quartz", "raven",
    "reef", "ridge", "river", "saffron", "sage", "sierra", "slate", "sorrel", "spruce",
    "summit", "thistle", "tide", "timber", "topaz", "tundra", "umber", "vale", "willow",
    "zephyr",
];

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alvaro", "Amara", "Anika", "Bruno", "Carmen", "Dario", "Elena", "Felix",
    "Greta", "Hugo", "Ines", "Jonas", "Katja", "Leon", "Mara", "Nadia", "Oskar",
    "Priya", "Ravi", "Sofia", "Tomas", "Una", "Viktor", "Wanda", "Yusuf", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Abrams", "Becker", "Castillo", "Dvorak", "Eriksen", "Fontaine", "Galanis",
    "Hoffmann", "Ibarra", "Jansen", "Kovacs", "Lindqvist", "Moreau", "Novak",
    "Okafor", "Petrov", "Quintana", "Rossi", "Sandoval", "Takahashi", "Ueda",
    "Vasquez", "Weber", "Yamada", "Zielinski",
];

const CITIES: &[&str] = &[
    "Aveiro", "Bergen", "Cusco", "Dresden", "Eldoret", "Fukuoka", "Girona", "Haarlem",
    "Izmir", "Jaipur", "Kaunas", "Leuven", "Malmo", "Nagoya", "Oulu", "Plovdiv",
    "Quebec", "Rosario", "Salta", "Tampere", "Utrecht", "Valencia", "Windhoek",
    "Yokohama", "Zagreb",
];

const COUNTRIES: &[&str] = &[
    "Argentina", "Belgium", "Canada", "Denmark", "Estonia", "Finland", "Germany",
    "Hungary", "India", "Japan", "Kenya", "Lithuania", "Mexico", "Netherlands",
    "Norway", "Portugal", "Romania", "Spain", "Turkey", "Uruguay", "Vietnam",
];

const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Lane", "Road", "Way", "Court"];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "mail.test", "post.test"];

const URL_TLDS: &[&str] = &["com", "org", "net", "io"];

fn pick<'a>(rng: &mut impl Rng, table: &[&'a str]) -> &'a str {
    table[rng.gen_range(0..table.len())]
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn word(rng: &mut impl Rng) -> &'static str {
    pick(rng, WORDS)
}

pub fn sentence(rng: &mut impl Rng) -> String {
    let count = rng.gen_range(5..=10);
    let mut sentence = capitalize(word(rng));
    for _ in 1..count {
        sentence.push(' ');
        sentence.push_str(word(rng));
    }
    sentence.push('.');
    sentence
}

/// A short paragraph of about three sentences; the count varies.
pub fn paragraph(rng: &mut impl Rng) -> String {
    let count = rng.gen_range(2..=4);
    let mut sentences = Vec::with_capacity(count);
    for _ in 0..count {
        sentences.push(sentence(rng));
    }
    sentences.join(" ")
}

pub fn full_name(rng: &mut impl Rng) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

pub fn email(rng: &mut impl Rng) -> String {
    format!(
        "{}.{}{}@{}",
        pick(rng, FIRST_NAMES).to_lowercase(),
        pick(rng, LAST_NAMES).to_lowercase(),
        rng.gen_range(1..100),
        pick(rng, EMAIL_DOMAINS),
    )
}

pub fn url(rng: &mut impl Rng) -> String {
    format!(
        "https://www.{}.{}/{}",
        word(rng),
        pick(rng, URL_TLDS),
        word(rng),
    )
}

pub fn phone_number(rng: &mut impl Rng) -> String {
    format!(
        "+{} {:03}-{:03}-{:04}",
        rng.gen_range(1..100),
        rng.gen_range(200..1000),
        rng.gen_range(0..1000),
        rng.gen_range(0..10_000),
    )
}

pub fn street_address(rng: &mut impl Rng) -> String {
    format!(
        "{} {} {}",
        rng.gen_range(1..2000),
        capitalize(word(rng)),
        pick(rng, STREET_SUFFIXES),
    )
}

pub fn city(rng: &mut impl Rng) -> &'static str {
    pick(rng, CITIES)
}

pub fn country(rng: &mut impl Rng) -> &'static str {
    pick(rng, COUNTRIES)
}

pub fn postal_code(rng: &mut impl Rng) -> String {
    format!("{:05}", rng.gen_range(0..100_000))
}

// The timestamp window: 2000-01-01 to 2025-01-01, both UTC.
const TIMESTAMP_MIN: i64 = 946_684_800;
const TIMESTAMP_MAX: i64 = 1_735_689_600;

/// An RFC 3339 timestamp with second precision, drawn uniformly from a fixed
/// window. Second precision keeps the values round-trippable as exact filter
/// keys.
pub fn datetime(rng: &mut impl Rng) -> String {
    let seconds = rng.gen_range(TIMESTAMP_MIN..TIMESTAMP_MAX);
    DateTime::from_timestamp(seconds, 0)
        .expect("timestamps in the generator window are representable")
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn sentences_and_paragraphs_have_shape() {
        let mut rng = StdRng::seed_from_u64(10);
        for _ in 0..100 {
            let s = sentence(&mut rng);
            assert!(s.ends_with('.'));
            assert!(s.chars().next().unwrap().is_uppercase());

            let p = paragraph(&mut rng);
            let sentences = p.matches('.').count();
            assert!((2..=4).contains(&sentences), "paragraph {p:?}");
        }
    }

    #[test]
    fn contact_fields_look_valid() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let email = email(&mut rng);
            let (local, domain) = email.split_once('@').expect("an e-mail has an @");
            assert!(!local.is_empty());
            assert!(domain.contains('.'));

            assert!(url(&mut rng).starts_with("https://www."));
            assert!(phone_number(&mut rng).starts_with('+'));
            assert_eq!(postal_code(&mut rng).len(), 5);
        }
    }

    #[test]
    fn datetimes_are_rfc3339_within_the_window() {
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..100 {
            let raw = datetime(&mut rng);
            let parsed = DateTime::parse_from_rfc3339(&raw).expect("valid rfc3339");
            let seconds = parsed.timestamp();
            assert!((TIMESTAMP_MIN..TIMESTAMP_MAX).contains(&seconds));
        }
    }
}

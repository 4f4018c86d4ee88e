use anyhow::Result;
use rand::Rng;
use serde_json::{json, Value};

use super::vocab::{self, CITIES, COUNTRIES};
use super::{
    bump_mutation_marker, into_object, regenerate_distinct, rng_for, DocumentTemplate,
};
use crate::payload::Payload;

const ADJECTIVES: &[&str] = &[
    "Grand", "Royal", "Sunny", "Quiet", "Golden", "Silver", "Old", "Blue", "Green", "Little",
];
const NOUNS: &[&str] = &[
    "Harbor", "Garden", "Palace", "Lodge", "Inn", "Tower", "Bay", "Park", "Bridge", "Court",
];

/// Hotel records with coordinates and a list of reviews.
pub struct HotelTemplate;

fn coordinate<R: Rng + ?Sized>(rng: &mut R, bound: f64) -> f64 {
    let v: f64 = rng.gen_range(-bound..bound);
    (v * 1_000_000.0).round() / 1_000_000.0
}

fn price<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.gen_range(50..1000)
}

fn reviews<R: Rng + ?Sized>(rng: &mut R) -> Value {
    let n = rng.gen_range(1..6);
    let reviews: Vec<Value> = (0..n)
        .map(|_| {
            json!({
                "author": vocab::full_name(rng),
                "content": vocab::lorem_sentence(rng),
                "ratings": {
                    "overall": rng.gen_range(1..=5u32),
                    "cleanliness": rng.gen_range(1..=5u32),
                    "service": rng.gen_range(1..=5u32),
                },
            })
        })
        .collect();
    Value::Array(reviews)
}

impl DocumentTemplate for HotelTemplate {
    fn generate(&self, id: u64) -> Payload {
        let mut rng = rng_for(id);
        let name = format!(
            "{} {} Hotel",
            vocab::pick(&mut rng, ADJECTIVES),
            vocab::pick(&mut rng, NOUNS)
        );
        let likes: Vec<String> = (0..rng.gen_range(0..5))
            .map(|_| vocab::full_name(&mut rng))
            .collect();

        let doc = json!({
            "name": name,
            "hotel_id": id,
            "city": vocab::pick(&mut rng, CITIES),
            "country": vocab::pick(&mut rng, COUNTRIES),
            "address": format!("{} {} Street", rng.gen_range(1..500u32), vocab::pick(&mut rng, NOUNS)),
            "geo": {
                "lat": coordinate(&mut rng, 90.0),
                "lon": coordinate(&mut rng, 180.0),
            },
            "price": price(&mut rng),
            "free_parking": rng.gen::<bool>(),
            "free_breakfast": rng.gen::<bool>(),
            "rating": rng.gen_range(0..=5u32),
            "reviews": reviews(&mut rng),
            "public_likes": likes,
            "mutated": 0,
            "type": "hotel",
        });
        Payload::Json(doc)
    }

    fn mutate(&self, existing: Payload, fields: &[String]) -> Result<Payload> {
        let mut rng = rand::thread_rng();
        let mut doc = into_object(existing)?;

        if fields.is_empty() {
            let price = regenerate_distinct(doc.get("price"), || price(&mut rng).into());
            doc.insert("price".into(), price);
        }
        for f in fields {
            let v = match f.as_str() {
                "price" => price(&mut rng).into(),
                "rating" => rng.gen_range(0..=5u32).into(),
                "free_parking" | "free_breakfast" => rng.gen::<bool>().into(),
                "reviews" => reviews(&mut rng),
                _ => continue,
            };
            doc.insert(f.clone(), v);
        }

        bump_mutation_marker(&mut doc);
        Ok(Payload::Json(Value::Object(doc)))
    }

    fn dataset_name(&self) -> &str {
        "hotel"
    }
}

use anyhow::Result;
use rand::Rng;
use serde_json::{json, Map, Value};

use super::vocab::{self, CITIES, COUNTRIES, LANGUAGES};
use super::{
    bump_mutation_marker, into_object, regenerate_distinct, rng_for, DocumentTemplate,
};
use crate::payload::Payload;

const GENDERS: &[&str] = &["male", "female", "non-binary"];
const HAIR: &[&str] = &["black", "brown", "blonde", "red", "grey", "white"];
const ANIMALS: &[&str] = &["cat", "dog", "parrot", "hamster", "rabbit", "turtle", "goldfish"];

/// Personal records, padded with a `body` field up to the target size.
pub struct PersonTemplate {
    doc_size: usize,
}

impl PersonTemplate {
    pub fn new(doc_size: usize) -> Self {
        Self { doc_size }
    }

    fn field<R: Rng + ?Sized>(rng: &mut R, name: &str) -> Option<Value> {
        let v = match name {
            "name" => vocab::full_name(rng).into(),
            "age" => rng.gen_range(18..80u32).into(),
            "gender" => vocab::pick(rng, GENDERS).into(),
            "married" => rng.gen::<bool>().into(),
            "animals" => {
                let n = rng.gen_range(1..4);
                let animals: Vec<&str> = (0..n).map(|_| vocab::pick(rng, ANIMALS)).collect();
                json!(animals)
            }
            "attributes" => json!({
                "hair": vocab::pick(rng, HAIR),
                "dimensions": {
                    "height": rng.gen_range(150..200u32),
                    "weight": rng.gen_range(45..120u32),
                },
            }),
            "languages" => {
                let n = rng.gen_range(1..4);
                let langs: Vec<&str> = (0..n).map(|_| vocab::pick(rng, LANGUAGES)).collect();
                json!(langs)
            }
            "address" => json!({
                "city": vocab::pick(rng, CITIES),
                "country": vocab::pick(rng, COUNTRIES),
            }),
            _ => return None,
        };
        Some(v)
    }
}

const FIELDS: &[&str] = &[
    "name",
    "age",
    "gender",
    "married",
    "animals",
    "attributes",
    "languages",
    "address",
];

impl DocumentTemplate for PersonTemplate {
    fn generate(&self, id: u64) -> Payload {
        let mut rng = rng_for(id);
        let mut doc = Map::new();
        for &f in FIELDS {
            if let Some(v) = Self::field(&mut rng, f) {
                doc.insert(f.into(), v);
            }
        }
        doc.insert("mutated".into(), 0.into());
        doc.insert("type".into(), "person".into());

        let current = Value::Object(doc.clone()).to_string().len();
        // `"body":""` plus the separating comma
        let overhead = 10;
        if current + overhead < self.doc_size {
            let body = vocab::printable_bytes(&mut rng, self.doc_size - current - overhead);
            doc.insert("body".into(), String::from_utf8_lossy(&body).into_owned().into());
        }
        Payload::Json(Value::Object(doc))
    }

    fn mutate(&self, existing: Payload, fields: &[String]) -> Result<Payload> {
        let mut rng = rand::thread_rng();
        let mut doc = into_object(existing)?;

        if fields.is_empty() {
            let age = regenerate_distinct(doc.get("age"), || rng.gen_range(18..80u32).into());
            doc.insert("age".into(), age);
        }
        for f in fields {
            if let Some(v) = Self::field(&mut rng, f) {
                doc.insert(f.clone(), v);
            }
        }

        bump_mutation_marker(&mut doc);
        Ok(Payload::Json(Value::Object(doc)))
    }

    fn dataset_name(&self) -> &str {
        "person"
    }
}

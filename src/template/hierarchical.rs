//! Deeply nested company documents, for exercising queries over nested paths.
//!
//! ```text
//! company
//! ├── departments[1..3]
//! │   ├── employees      (2-5 entries, or 20-39 wrapped in two more array levels)
//! │   └── projects[2..9]
//! └── locations[1..3]
//! ```

use anyhow::Result;
use rand::Rng;
use serde_json::{json, Map, Value};

use super::vocab::{self, CITIES, COUNTRIES};
use super::{
    bump_mutation_marker, into_object, regenerate_distinct, rng_for, DocumentTemplate,
};
use crate::payload::Payload;

const DEPARTMENTS: &[&str] = &[
    "Engineering",
    "Sales",
    "Marketing",
    "HR",
    "Finance",
    "Operations",
    "Support",
];

const ROLES: &[&str] = &[
    "Engineer",
    "Manager",
    "Salesperson",
    "Marketer",
    "HR",
    "Support Engineer",
    "Intern",
    "Analyst",
];

const PROJECT_STATUSES: &[&str] = &["ongoing", "completed", "planned"];

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Charlie", "David", "Eve", "Frank", "Grace", "Heidi", "Ivan", "Judy",
    "Mallory",
];

// Percentage of departments whose employees are wrapped in nested arrays
const NESTED_EMPLOYEES_PERCENT: u32 = 30;

pub struct HierarchicalTemplate {
    doc_size: usize,
}

impl HierarchicalTemplate {
    pub fn new(doc_size: usize) -> Self {
        Self { doc_size }
    }
}

impl DocumentTemplate for HierarchicalTemplate {
    fn generate(&self, id: u64) -> Payload {
        let mut rng = rng_for(id);
        let mut doc = Map::new();

        if rng.gen() {
            doc.insert("id".into(), format!("doc{id}").into());
        }
        doc.insert("company".into(), company(&mut rng, format!("c{id}")));

        let current = Value::Object(doc.clone()).to_string().len();
        if current < self.doc_size {
            doc.insert("_filler".into(), filler(&mut rng, self.doc_size - current));
        }
        Payload::Json(Value::Object(doc))
    }

    fn mutate(&self, existing: Payload, fields: &[String]) -> Result<Payload> {
        let mut rng = rand::thread_rng();
        let mut doc = into_object(existing)?;

        if fields.is_empty() || fields.iter().any(|f| f == "company") {
            let company_id = doc
                .get("company")
                .and_then(|c| c.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("document has no company id"))?;
            let company = regenerate_distinct(doc.get("company"), || {
                company(&mut rng, company_id.clone())
            });
            doc.insert("company".into(), company);
        }

        bump_mutation_marker(&mut doc);
        Ok(Payload::Json(Value::Object(doc)))
    }

    fn dataset_name(&self) -> &str {
        "hierarchical"
    }
}

fn company<R: Rng + ?Sized>(rng: &mut R, id: String) -> Value {
    let departments: Vec<Value> = (0..rng.gen_range(1..4))
        .map(|_| department(rng))
        .collect();
    let locations: Vec<Value> = (0..rng.gen_range(1..4))
        .map(|_| {
            json!({
                "city": vocab::pick(rng, CITIES),
                "country": vocab::pick(rng, COUNTRIES),
            })
        })
        .collect();

    json!({
        "id": id,
        "name": vocab::company_name(rng),
        "departments": departments,
        "locations": locations,
    })
}

fn department<R: Rng + ?Sized>(rng: &mut R) -> Value {
    let projects: Vec<Value> = (0..rng.gen_range(2..10))
        .map(|_| {
            json!({
                "title": format!("Project {}", vocab::capitalize(vocab::lorem_word(rng))),
                "status": vocab::pick(rng, PROJECT_STATUSES),
            })
        })
        .collect();

    json!({
        "name": vocab::pick(rng, DEPARTMENTS),
        "budget": rng.gen_range(200_000..2_000_000u64),
        "employees": employees(rng),
        "projects": projects,
    })
}

fn employees<R: Rng + ?Sized>(rng: &mut R) -> Value {
    if rng.gen_range(0..100) < NESTED_EMPLOYEES_PERCENT {
        let level3: Vec<Value> = (0..rng.gen_range(20..40)).map(|_| employee(rng)).collect();
        json!([[level3]])
    } else {
        let flat: Vec<Value> = (0..rng.gen_range(2..6)).map(|_| employee(rng)).collect();
        Value::Array(flat)
    }
}

// Employees have a role, a home city, or both
fn employee<R: Rng + ?Sized>(rng: &mut R) -> Value {
    let mut e = Map::new();
    e.insert("name".into(), vocab::pick(rng, FIRST_NAMES).into());
    match rng.gen_range(0..4) {
        0 => {
            e.insert("role".into(), vocab::pick(rng, ROLES).into());
        }
        1 => {
            e.insert("home".into(), vocab::pick(rng, CITIES).into());
        }
        _ => {
            e.insert("role".into(), vocab::pick(rng, ROLES).into());
            e.insert("home".into(), vocab::pick(rng, CITIES).into());
        }
    }
    Value::Object(e)
}

fn filler<R: Rng + ?Sized>(rng: &mut R, target: usize) -> Value {
    let mut filler = Map::new();
    let mut len = 2;
    let mut count = 0;
    while len < target {
        count += 1;
        let key = format!("filler_{count}");
        let paragraph = vocab::lorem_paragraph(rng);
        // "key":"paragraph" and a comma
        len += key.len() + paragraph.len() + 6;
        filler.insert(key, paragraph.into());
    }
    Value::Object(filler)
}

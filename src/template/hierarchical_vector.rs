//! Company documents carrying embedding vectors, for hierarchical vector search.
//!
//! Every document holds 20 vectors. They are stored twice: as the ground truth
//! in `embeddings[outer][inner]`, and spread over the company hierarchy:
//!
//! ```text
//! departments[d].embedding              = embeddings[d][0]
//! departments[d].teams[t].embedding     = embeddings[d][1 + t]    (t in 0..3)
//! departments[d].projects[0].embedding  = embeddings[d][4]
//! ```
//!
//! A vector depends only on the document id and its position, so it can be
//! recomputed with [`expected_vector`] without fetching the document.
//! Positions for which [`is_shared`] holds use a seed that ignores the id
//! (modulo [`VECTOR_POOL_SIZE`]), which produces clusters of identical vectors
//! across documents.

use anyhow::Result;
use java_random::Random;
use rand::Rng;
use serde_json::{json, Map, Value};

use super::vocab;
use super::{
    bump_mutation_marker, into_object, regenerate_distinct, rng_for, DocumentTemplate,
};
use crate::payload::Payload;

pub const VECTOR_DIMENSION: usize = 128;
pub const OUTER_SIZE: usize = 4;
pub const INNER_SIZE: usize = 5;
pub const VECTORS_PER_DOC: usize = OUTER_SIZE * INNER_SIZE;
pub const VECTOR_POOL_SIZE: u64 = 100;

const DEPARTMENTS: [&str; OUTER_SIZE] = ["Engineering", "Sales", "Marketing", "HR"];
const TEAM_TYPES: &[&str] = &["Backend", "Frontend", "DevOps", "QA", "Data"];
const TEAMS_PER_DEPARTMENT: usize = 3;
const MEMBERS_PER_TEAM: u64 = 2;
const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Charlie", "David", "Eve", "Frank", "Grace", "Heidi",
];

/// Whether the vector at the given position is shared between documents.
pub fn is_shared(outer: usize, inner: usize) -> bool {
    (outer * INNER_SIZE + inner) % 10 < 3
}

fn vector_seed(id: u64, outer: usize, inner: usize) -> i64 {
    let position = outer as i64 * 10_000 + inner as i64 * 100;
    if is_shared(outer, inner) {
        position + (id % VECTOR_POOL_SIZE) as i64
    } else {
        (id as i64).wrapping_mul(1_000_000).wrapping_add(position)
    }
}

/// Recomputes the vector stored at `embeddings[outer][inner]` of document `id`.
///
/// Components are in `[-1, 1)`, rounded to 6 decimal digits.
pub fn expected_vector(id: u64, outer: usize, inner: usize) -> Vec<f64> {
    let mut rng = Random::with_seed(vector_seed(id, outer, inner) as u64);
    (0..VECTOR_DIMENSION)
        .map(|_| round6(rng.next_double() * 2.0 - 1.0))
        .collect()
}

// Rounds half up, like `Math.round`
fn round6(v: f64) -> f64 {
    (v * 1_000_000.0 + 0.5).floor() / 1_000_000.0
}

fn all_vectors(id: u64) -> Vec<Vec<Vec<f64>>> {
    (0..OUTER_SIZE)
        .map(|o| (0..INNER_SIZE).map(|i| expected_vector(id, o, i)).collect())
        .collect()
}

fn company_hierarchy<R: Rng + ?Sized>(rng: &mut R, id: u64, vectors: &[Vec<Vec<f64>>]) -> Value {
    let name_at = |offset: u64| FIRST_NAMES[((id + offset) % FIRST_NAMES.len() as u64) as usize];

    let departments: Vec<Value> = DEPARTMENTS
        .iter()
        .enumerate()
        .map(|(d, dept_name)| {
            let teams: Vec<Value> = (0..TEAMS_PER_DEPARTMENT)
                .map(|t| {
                    let role = if t == 0 { "Engineer" } else { "Analyst" };
                    let members: Vec<Value> = (0..MEMBERS_PER_TEAM)
                        .map(|m| json!({ "name": name_at(m), "role": role }))
                        .collect();
                    json!({
                        "team_id": t,
                        "name": format!("{} Team", TEAM_TYPES[t]),
                        "team_lead": name_at((d + t) as u64),
                        "embedding": vectors[d][1 + t],
                        "members": members,
                    })
                })
                .collect();

            let initial = dept_name.chars().next().unwrap_or_default();
            json!({
                "dept_id": d,
                "name": dept_name,
                "budget": rng.gen_range(500_000..2_000_000u64),
                "embedding": vectors[d][0],
                "teams": teams,
                "projects": [{
                    "project_id": 0,
                    "title": format!("Project {initial}"),
                    "status": "ongoing",
                    "embedding": vectors[d][4],
                }],
            })
        })
        .collect();

    json!({
        "id": format!("c{id}"),
        "name": vocab::company_name(rng),
        "departments": departments,
    })
}

pub struct HierarchicalVectorTemplate;

impl DocumentTemplate for HierarchicalVectorTemplate {
    fn generate(&self, id: u64) -> Payload {
        let mut rng = rng_for(id);
        let vectors = all_vectors(id);

        let mut doc = Map::new();
        doc.insert("doc_id".into(), id.into());
        doc.insert("type".into(), "hierarchical_vector".into());
        doc.insert("company".into(), company_hierarchy(&mut rng, id, &vectors));
        doc.insert("embeddings".into(), json!(vectors));
        Payload::Json(Value::Object(doc))
    }

    /// Rebuilds the company hierarchy around the same vectors.
    fn mutate(&self, existing: Payload, fields: &[String]) -> Result<Payload> {
        let mut rng = rand::thread_rng();
        let mut doc = into_object(existing)?;
        let id = doc
            .get("doc_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("document has no numeric doc_id"))?;

        if fields.is_empty() || fields.iter().any(|f| f == "company") {
            let vectors = all_vectors(id);
            let company = regenerate_distinct(doc.get("company"), || {
                company_hierarchy(&mut rng, id, &vectors)
            });
            doc.insert("company".into(), company);
        }

        bump_mutation_marker(&mut doc);
        Ok(Payload::Json(Value::Object(doc)))
    }

    fn dataset_name(&self) -> &str {
        "hierarchical_vector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_follow_java_random() {
        // new java.util.Random(0).nextDouble() == 0.730967787376657
        let v = expected_vector(0, 0, 0);
        assert_eq!(v.len(), VECTOR_DIMENSION);
        assert_eq!(v[0], 0.461936);
    }

    fn as_vector(v: &Value) -> Vec<f64> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|x| x.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn test_known_vectors() {
        let v = expected_vector(1, 0, 0);
        assert_eq!(v.len(), VECTOR_DIMENSION);
        assert_eq!(&v[..4], &[0.461756, -0.179838, -0.58457, -0.334566]);

        let v = expected_vector(1, 0, 3);
        assert_eq!(&v[..4], &[-0.213122, -0.75185, -0.830081, 0.435928]);
    }

    #[test]
    fn test_determinism_and_sharing() {
        for o in 0..OUTER_SIZE {
            for i in 0..INNER_SIZE {
                let a = expected_vector(1, o, i);
                let b = expected_vector(1, o, i);
                assert!(a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()));
                assert!(a.iter().all(|x| (-1.0..=1.0).contains(x)));

                let other = expected_vector(101, o, i);
                assert_eq!(is_shared(o, i), a == other, "position ({o}, {i})");
            }
        }

        let shared = (0..OUTER_SIZE)
            .flat_map(|o| (0..INNER_SIZE).map(move |i| (o, i)))
            .filter(|&(o, i)| is_shared(o, i))
            .count();
        assert_eq!(shared, 6);
        assert_ne!(expected_vector(1, 0, 0), expected_vector(2, 0, 0));
    }

    #[test]
    fn test_document_layout() {
        let doc = HierarchicalVectorTemplate.generate(17);
        let doc = doc.as_json().unwrap();
        assert_eq!(doc["doc_id"], 17);
        assert_eq!(doc["type"], "hierarchical_vector");
        assert_eq!(
            HierarchicalVectorTemplate.generate(17),
            HierarchicalVectorTemplate.generate(17)
        );

        let embeddings = doc["embeddings"].as_array().unwrap();
        assert_eq!(embeddings.len(), OUTER_SIZE);
        let total: usize = embeddings
            .iter()
            .map(|inner| inner.as_array().unwrap().len())
            .sum();
        assert_eq!(total, VECTORS_PER_DOC);

        let depts = doc["company"]["departments"].as_array().unwrap();
        assert_eq!(depts.len(), OUTER_SIZE);
        for (d, dept) in depts.iter().enumerate() {
            assert_eq!(as_vector(&dept["embedding"]), expected_vector(17, d, 0));
            for t in 0..TEAMS_PER_DEPARTMENT {
                let team = &dept["teams"][t];
                assert_eq!(as_vector(&team["embedding"]), expected_vector(17, d, 1 + t));
                assert_eq!(team["members"].as_array().unwrap().len(), 2);
            }
            assert_eq!(
                as_vector(&dept["projects"][0]["embedding"]),
                expected_vector(17, d, 4)
            );
            assert_eq!(
                as_vector(&embeddings[d][2]),
                expected_vector(17, d, 2)
            );
        }
        assert_eq!(depts[1]["teams"][0]["team_lead"], FIRST_NAMES[(17 + 1) % 8]);
        assert_eq!(depts[0]["projects"][0]["title"], "Project E");
    }

    #[test]
    fn test_mutation_keeps_vectors() {
        let original = HierarchicalVectorTemplate.generate(3);
        let mutated = HierarchicalVectorTemplate.mutate(original.clone(), &[]).unwrap();
        let (a, b) = (original.as_json().unwrap(), mutated.as_json().unwrap());

        assert_eq!(a["embeddings"], b["embeddings"]);
        assert_ne!(a["company"], b["company"]);
        assert_eq!(b["mutated"], 1);
        assert_eq!(
            as_vector(&b["company"]["departments"][2]["embedding"]),
            expected_vector(3, 2, 0)
        );
    }
}

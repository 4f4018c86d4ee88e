use anyhow::Result;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map, Value};

use super::vocab::{self, DEPARTMENTS, FIRST_NAMES, LANGUAGES};
use super::{
    bump_mutation_marker, into_object, regenerate_distinct, rng_for, DocumentTemplate,
};
use crate::payload::Payload;

// A mix of valid, malformed and out-of-range addresses.
const IPS: &[&str] = &[
    "0.2.3.4", "0.52.34.64", "192.0.2.0", "192.0.2.255", "192.168.5.0", "198.51.100.255",
    "203.0.113.0", "203.0.113.255", "173.16.0.0", "192.168.0.0", "172.16.0.0", "10.0.0.0",
    "224.0.0.1", "203.0.113.0.1", "0.52.34.64.2", "192.0.2.256", "300.21.2.257",
    "257.257.257.256", "0.52.-34.64", "198.51.100.256", "198.51.10#.256", "198.@2.100.256",
    "001.2.3.4", "00.52.34.64", "00192.168.5.1", "0010.0.0.1", "203.0.113.256", "0.52.34:64",
    "192:0.2.0", "192.168.:0.0", "192.168.0.256", "172.16.256.1", "224.0.0.256",
    "2001:0db8:0000:0000:0000:ff00:0042:8329", "2001:db8::1", "2001:db8::2:1",
    "2001:0db8:85a3::8a2e:0370:7334", "::1", "fe80::1%lo0", "2001:db8:abcd:0012::a00",
    "fe80::b879:1823:f3c4:4e22%4", "2001:0db8:85a3::8a2e:0370:7334:0.0.0.0",
    "2001:db8:1:1:1:1:1:1", "2001:db8:1::1:1:1:1", "fe80::1%en0", "2001:db8:abcd:0012::0a00",
    "2001:0db8:0000:0000:0000:ff00:0042:832g", "2001:db8:::1", "fe80:0:0:0:200:ff:fe00:00g",
    "ff02::g",
];

const IP_LISTS: &[&[&str]] = &[
    &[
        "172.16.0.0", "172.30.0.0", "172.21.0.0", "172.16.250.0", "173.16.19.250",
        "172.31.255.255",
    ],
    &[
        "172.16.0.0", "172.32.0.0", "172.30.0.0", "172.16.250.0", "173.16.0.0", "0.16.0.0",
        "172.31.255.255",
    ],
    &[
        "2001:db8::1", "2001:db8::2", "2001:db8::a:b:c:d", "2001:db8:ffff:ffff:ffff:ffff:ffff:fe",
        "2001:db8:1:2:3:4:5:6", "173.16.0.0",
    ],
    &[
        "2001:db8:1:2:3:4:5:6", "2001:db8:0:0:0:0:0:1", "173.16.0.0",
        "2001:db8:abcd:1234:5678:90ab:cdef:1234", "2001:db8:ffff:ffff:ffff:ffff:ffff:ffff:ffff",
        "2001:db8:1234:5678:abcd:ef12:3456:7890:",
    ],
];

/// Employee records with an optional `manages` sub-object.
pub struct EmpTemplate;

impl DocumentTemplate for EmpTemplate {
    fn generate(&self, id: u64) -> Payload {
        let mut rng = rng_for(id);
        let name = vocab::full_name(&mut rng);
        let is_manager: bool = rng.gen();

        let mut doc = Map::new();
        doc.insert("email".into(), email_for(&name).into());
        doc.insert("name".into(), name.into());
        doc.insert("emp_id".into(), (10_000_000 + id).to_string().into());
        doc.insert("dept".into(), vocab::pick(&mut rng, DEPARTMENTS).into());
        doc.insert("salary".into(), salary(&mut rng).into());
        doc.insert("join_date".into(), join_date(&mut rng).into());
        doc.insert("languages_known".into(), languages(&mut rng));
        doc.insert("is_manager".into(), is_manager.into());
        doc.insert("mutated".into(), 0.into());
        doc.insert("type".into(), "emp".into());
        doc.insert("ip".into(), ip(&mut rng));
        if is_manager {
            doc.insert("manages".into(), manages(&mut rng));
        }
        Payload::Json(Value::Object(doc))
    }

    fn mutate(&self, existing: Payload, fields: &[String]) -> Result<Payload> {
        let mut rng = rand::thread_rng();
        let mut doc = into_object(existing)?;
        let wants = |f: &str| fields.iter().any(|x| x == f);

        if fields.is_empty() {
            let salary = regenerate_distinct(doc.get("salary"), || salary(&mut rng).into());
            doc.insert("salary".into(), salary);
            bump_mutation_marker(&mut doc);
            return Ok(Payload::Json(Value::Object(doc)));
        }

        if wants("salary") {
            doc.insert("salary".into(), salary(&mut rng).into());
        }
        if wants("dept") {
            doc.insert("dept".into(), vocab::pick(&mut rng, DEPARTMENTS).into());
        }
        if wants("is_manager") {
            doc.insert("is_manager".into(), rng.gen::<bool>().into());
        }

        let is_manager = doc
            .get("is_manager")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !is_manager {
            doc.remove("manages");
        } else if wants("manages.team_size")
            || wants("manages.reports")
            || !doc.contains_key("manages")
        {
            doc.insert("manages".into(), manages(&mut rng));
        }

        if wants("languages_known") {
            doc.insert("languages_known".into(), languages(&mut rng));
        }
        if wants("email") {
            doc.insert("email".into(), email_for(&vocab::full_name(&mut rng)).into());
        }

        bump_mutation_marker(&mut doc);
        Ok(Payload::Json(Value::Object(doc)))
    }

    fn dataset_name(&self) -> &str {
        "emp"
    }
}

fn email_for(name: &str) -> String {
    let first = name.split(' ').next().unwrap_or(name);
    format!("{first}@mcdiabetes.com")
}

fn salary<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.gen_range(50_000..150_000)
}

fn join_date<R: Rng + ?Sized>(rng: &mut R) -> String {
    let date = NaiveDate::from_ymd_opt(
        rng.gen_range(1950..=2016),
        rng.gen_range(2..=12),
        rng.gen_range(1..=27),
    )
    .and_then(|d| {
        d.and_hms_opt(
            rng.gen_range(0..23),
            rng.gen_range(1..59),
            rng.gen_range(0..60),
        )
    })
    .unwrap_or_default();
    date.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn languages<R: Rng + ?Sized>(rng: &mut R) -> Value {
    let langs: Vec<&str> = (0..3).map(|_| vocab::pick(rng, LANGUAGES)).collect();
    json!(langs)
}

fn ip<R: Rng + ?Sized>(rng: &mut R) -> Value {
    if rng.gen() {
        json!(vocab::pick(rng, IPS))
    } else {
        json!(IP_LISTS.choose(rng).copied().unwrap_or_default())
    }
}

fn manages<R: Rng + ?Sized>(rng: &mut R) -> Value {
    let team_size: u32 = rng.gen_range(5..10);
    let reports: Vec<String> = (0..team_size)
        .map(|_| {
            format!(
                "{} {}",
                vocab::pick(rng, FIRST_NAMES),
                vocab::pick(rng, vocab::LAST_NAMES)
            )
        })
        .collect();
    json!({ "team_size": team_size, "reports": reports })
}

//! Word lists used to fill generated documents.

use rand::seq::SliceRandom;
use rand::Rng;

pub const FIRST_NAMES: &[&str] = &[
    "Adara", "Adena", "Adrianne", "Alarice", "Alvita", "Amara", "Ambika", "Antonia", "Araceli",
    "Balandria", "Basha", "Beryl", "Bryn", "Callia", "Caryssa", "Cassandra", "Casondrah",
    "Chatha", "Ciara", "Cynara", "Cytheria", "Dabria", "Darcei", "Deandra", "Deirdre", "Delores",
    "Desdomna", "Devi", "Dominique", "Drucilla", "Duvessa", "Ebony", "Fantine", "Fuscienne",
    "Gabi", "Gallia", "Hanna", "Hedda", "Jerica", "Jetta", "Joby", "Kacila", "Kagami", "Kala",
    "Kallie", "Keelia", "Kerry", "Kerry-Ann", "Kimberly", "Killian", "Kory", "Lilith",
    "Lucretia", "Lysha", "Mercedes", "Mia", "Maura", "Perdita", "Quella", "Riona", "Safiya",
    "Salina", "Severin", "Sidonia", "Sirena", "Solita", "Tempest", "Thea", "Treva", "Trista",
    "Vala", "Winta",
];

pub const LAST_NAMES: &[&str] = &[
    "Smith", "Brown", "Johnson", "Jones", "Williams", "Davis", "Miller XII", "Wilson", "Taylor",
    "Clark", "White", "Moore", "Thompson", "Allen", "Martin", "Hall", "Adams", "Thomas",
    "Wright", "Baker III", "Walker II", "Anderson", "Lewis", "Harris", "Hill", "King Jr.",
    "Jackson", "Lee", "Green", "Wood", "Parker X", "Campbell", "Young", "Robinson Sr.",
    "Stewart", "Scott", "Rogers", "Roberts", "Cook", "Phillips", "Turner", "Carter", "Ward",
    "Foster", "Morgan", "Howard Jr.", "Cox", "Bailey", "Richardson IX", "Reed", "Russell",
    "Edwards Sr.", "Cooper", "Wells", "Palmer", "Ann", "Mitchell", "Evans", "Simón", "Josué",
    "Damián", "Julián", "Aarón", "Ángel", "Gerónimo", "Juan José", "Tomás", "Nicolás",
    "Sebastián", "Jr.", "Sr.",
];

pub const DEPARTMENTS: &[&str] = &[
    "Engineering", "Sales", "Support", "Marketing", "Info-tech", "Finance", "HR", "Pre-sales",
    "Accounts", "Dev-ops", "Training",
];

pub const LANGUAGES: &[&str] = &[
    "English", "Spanish", "German", "Italian", "French", "Arabic", "Africans", "Hindi",
    "Vietnamese", "Urdu", "Dutch", "Quechua", "Japanese", "Chinese", "Nepalese", "Thai", "Malay",
    "Sinhalese", "Portuguese", "Romanian",
];

pub const CITIES: &[&str] = &[
    "Athens", "Berlin", "London", "Paris", "Tokyo", "New York", "Chennai", "Edinburgh",
];

pub const COUNTRIES: &[&str] = &[
    "USA", "UK", "Greece", "Germany", "France", "Japan", "India", "Canada",
];

const COMPANY_PREFIXES: &[&str] = &[
    "Acme", "Globex", "Initech", "Umbrella", "Stark", "Wayne", "Hooli", "Vandelay", "Soylent",
    "Tyrell", "Cyberdyne", "Wonka", "Gringotts", "Oceanic", "Monarch", "Aperture",
];

const COMPANY_SUFFIXES: &[&str] = &[
    "Inc", "LLC", "Group", "and Sons", "Holdings", "Industries", "Partners", "Labs", "Systems",
];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in",
    "reprehenderit", "voluptate", "velit", "esse", "cillum", "fugiat", "nulla", "pariatur",
    "excepteur", "sint", "occaecat", "cupidatat", "non", "proident", "sunt", "culpa", "qui",
    "officia", "deserunt", "mollit", "anim", "id", "est", "laborum",
];

/// Characters used for opaque and filler content.
pub const PRINTABLE: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 .,;:!?-_";

pub fn pick<'a, R: Rng + ?Sized>(rng: &mut R, words: &[&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or_default()
}

pub fn full_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

pub fn company_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, COMPANY_PREFIXES), pick(rng, COMPANY_SUFFIXES))
}

pub fn lorem_word<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    pick(rng, LOREM)
}

pub fn lorem_sentence<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(4..12);
    let words: Vec<&str> = (0..len).map(|_| lorem_word(rng)).collect();
    let mut sentence = capitalize(&words.join(" "));
    sentence.push('.');
    sentence
}

pub fn lorem_paragraph<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(3..7);
    let sentences: Vec<String> = (0..len).map(|_| lorem_sentence(rng)).collect();
    sentences.join(" ")
}

pub fn printable_bytes<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| PRINTABLE[rng.gen_range(0..PRINTABLE.len())])
        .collect()
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generators() {
        let mut rng = rand::thread_rng();

        let name = full_name(&mut rng);
        assert!(name.contains(' '));

        let sentence = lorem_sentence(&mut rng);
        assert!(sentence.ends_with('.'));
        assert!(sentence.chars().next().unwrap().is_uppercase());

        let bytes = printable_bytes(&mut rng, 64);
        assert_eq!(bytes.len(), 64);
        assert!(bytes.iter().all(|b| PRINTABLE.contains(b)));

        assert_eq!(capitalize("project"), "Project");
        assert_eq!(capitalize(""), "");
    }
}

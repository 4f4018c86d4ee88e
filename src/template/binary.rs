use anyhow::Result;

use super::{rng_for, vocab, DocumentTemplate};
use crate::payload::Payload;

/// Opaque blobs of printable characters, exactly `doc_size` bytes long.
pub struct BinaryTemplate {
    doc_size: usize,
}

impl BinaryTemplate {
    pub fn new(doc_size: usize) -> Self {
        Self { doc_size }
    }
}

impl DocumentTemplate for BinaryTemplate {
    fn generate(&self, id: u64) -> Payload {
        Payload::Binary(vocab::printable_bytes(&mut rng_for(id), self.doc_size))
    }

    // Blobs have no fields, so the whole content is replaced
    fn mutate(&self, existing: Payload, _fields: &[String]) -> Result<Payload> {
        let len = match &existing {
            Payload::Binary(b) => b.len(),
            Payload::Json(_) => self.doc_size,
        };
        let mut rng = rand::thread_rng();
        loop {
            let candidate = Payload::Binary(vocab::printable_bytes(&mut rng, len));
            if len == 0 || candidate != existing {
                return Ok(candidate);
            }
        }
    }

    fn dataset_name(&self) -> &str {
        "binary"
    }
}

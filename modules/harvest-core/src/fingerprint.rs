use std::fmt;

use sha2::{Digest, Sha256};

use crate::review::Review;

/// Content-derived identity of a review. The listing exposes no stable ID,
/// so two reviews with identical fields are the same review.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

/// SHA-256 over name, rating, time_ago, comment in that order.
/// Fields are hashed as-is; trimming is the extractor's job.
pub fn generate(review: &Review) -> Fingerprint {
    let mut hasher = Sha256::new();
    for field in [
        &review.name,
        &review.rating,
        &review.time_ago,
        &review.comment,
    ] {
        // Length prefix keeps ("a_b", "c") and ("a", "b_c") apart.
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    Fingerprint(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equal_reviews_equal_fingerprints() {
        let a = Review::new("Ana", "5 estrelas", "há 2 semanas", "Muito bom");
        let b = a.clone();
        assert_eq!(generate(&a), generate(&b));
    }

    #[test]
    fn every_field_participates() {
        let base = Review::new("Ana", "5 estrelas", "há 2 semanas", "Muito bom");
        let variants = [
            Review { name: "Ana ".into(), ..base.clone() },
            Review { rating: "4 estrelas".into(), ..base.clone() },
            Review { time_ago: "há 3 semanas".into(), ..base.clone() },
            Review { comment: String::new(), ..base.clone() },
        ];
        for v in &variants {
            assert_ne!(generate(&base), generate(v), "{v:?}");
        }
    }

    #[test]
    fn field_boundaries_matter() {
        let a = Review::new("a_b", "c", "d", "e");
        let b = Review::new("a", "b_c", "d", "e");
        let c = Review::new("ab", "", "d", "e");
        let d = Review::new("a", "b", "d", "e");
        let set: HashSet<_> = [&a, &b, &c, &d].into_iter().map(generate).collect();
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn no_collisions_across_corpus() {
        let mut seen = HashSet::new();
        for author in 0..40 {
            for stars in 1..=5 {
                for weeks in 0..5 {
                    let r = Review::new(
                        format!("Autor {author}"),
                        format!("{stars} estrelas"),
                        format!("há {weeks} semanas"),
                        if weeks % 2 == 0 { String::new() } else { format!("comentário {author}") },
                    );
                    assert!(seen.insert(generate(&r)), "collision for {r:?}");
                }
            }
        }
        assert_eq!(seen.len(), 40 * 5 * 5);
    }

    #[test]
    fn hex_is_64_chars() {
        let fp = generate(&Review::new("x", "y", "z", ""));
        assert_eq!(fp.to_hex().len(), 64);
        assert_eq!(fp.to_string(), fp.to_hex());
    }
}

use serde::{Deserialize, Serialize};

/// IUPAC nucleotide codes including the gap (`-`) and pad (`.`) symbols.
pub const NUCLEOTIDE_ALPHABET: &[u8] = b"acgturykmswbdhvn-.";

/// IUPAC amino acid codes including stop (`*`), gap and pad symbols.
pub const PEPTIDE_ALPHABET: &[u8] = b"ABCDEFGHIKLMNPQRSTUVWXYZ*-.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeqKind {
    Nucleotide,
    Peptide,
}

impl SeqKind {
    /// Case used for stored residues: lower for nucleotides, upper for peptides.
    #[inline(always)]
    pub fn normalize(self, byte: u8) -> u8 {
        match self {
            SeqKind::Nucleotide => byte.to_ascii_lowercase(),
            SeqKind::Peptide => byte.to_ascii_uppercase(),
        }
    }

    #[inline(always)]
    pub fn is_valid(self, normalized: u8) -> bool {
        match self {
            SeqKind::Nucleotide => NUCLEOTIDE_ALPHABET.contains(&normalized),
            SeqKind::Peptide => PEPTIDE_ALPHABET.contains(&normalized),
        }
    }

    /// Normalizes `byte` and returns it if it belongs to the alphabet.
    #[inline(always)]
    pub fn accept(self, byte: u8) -> Option<u8> {
        let normalized = self.normalize(byte);
        self.is_valid(normalized).then_some(normalized)
    }
}

#[inline(always)]
pub fn complement_base(base: u8) -> u8 {
    let complemented = match base.to_ascii_lowercase() {
        b'a' => b't',
        b't' | b'u' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        b'r' => b'y',
        b'y' => b'r',
        b'k' => b'm',
        b'm' => b'k',
        b'b' => b'v',
        b'v' => b'b',
        b'd' => b'h',
        b'h' => b'd',
        other => other,
    };
    if base.is_ascii_uppercase() {
        complemented.to_ascii_uppercase()
    } else {
        complemented
    }
}

/// Complements a nucleotide sequence in place, keeping residue order.
pub fn complement_in_place(sequence: &mut [u8]) {
    for base in sequence.iter_mut() {
        *base = complement_base(*base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nucleotide_accepts_ambiguity_codes() {
        for byte in b"ACGTNRYacgtnry-." {
            assert!(SeqKind::Nucleotide.accept(*byte).is_some(), "{}", *byte as char);
        }
        assert_eq!(SeqKind::Nucleotide.accept(b'A'), Some(b'a'));
        assert_eq!(SeqKind::Nucleotide.accept(b'1'), None);
        assert_eq!(SeqKind::Nucleotide.accept(b'e'), None);
    }

    #[test]
    fn peptide_alphabet_is_upper_case() {
        assert_eq!(SeqKind::Peptide.accept(b'm'), Some(b'M'));
        assert_eq!(SeqKind::Peptide.accept(b'*'), Some(b'*'));
        assert_eq!(SeqKind::Peptide.accept(b'J'), None);
        assert_eq!(SeqKind::Peptide.accept(b'O'), None);
        assert_eq!(SeqKind::Peptide.accept(b' '), None);
    }

    #[test]
    fn complement_keeps_order_and_case() {
        let mut seq = b"acgtNRy-".to_vec();
        complement_in_place(&mut seq);
        assert_eq!(seq, b"tgcaNYr-");
    }
}

//! Substitution scoring over a closed alphabet.
//!
//! Every byte maps to a dense alphabet index; bytes outside the alphabet map
//! to the wildcard index, so scoring is total over `u8`.

mod blosum62;

use crate::error::{AlignError, AlignResult};

pub use blosum62::{BLOSUM62, BLOSUM62_ALPHABET};

const NUCLEOTIDE_ALPHABET: &[u8] = b"ACGTN";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoringMatrix {
    alphabet: Vec<u8>,
    map: [u8; 256],
    table: Vec<i32>,
    wildcard: u8,
}

impl ScoringMatrix {
    /// Builds a matrix from an alphabet and a square, symmetric table whose
    /// rows and columns follow the alphabet order. The last symbol is the
    /// wildcard.
    pub fn from_table<R: AsRef<[i32]>>(alphabet: &[u8], table: &[R]) -> AlignResult<Self> {
        let n = alphabet.len();
        if n == 0 {
            return Err(invalid("alphabet is empty".to_string()));
        }
        if n > u8::MAX as usize {
            return Err(invalid(format!("alphabet has {n} symbols (max 255)")));
        }
        for (i, &sym) in alphabet.iter().enumerate() {
            if alphabet[..i].contains(&sym) {
                return Err(invalid(format!(
                    "duplicate symbol '{}' at position {i}",
                    sym as char
                )));
            }
        }
        if table.len() != n {
            return Err(invalid(format!(
                "table has {} rows, alphabet has {n} symbols",
                table.len()
            )));
        }
        let mut flat = Vec::with_capacity(n * n);
        for (i, row) in table.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n {
                return Err(invalid(format!(
                    "row {i} has {} columns, alphabet has {n} symbols",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        for i in 0..n {
            for j in (i + 1)..n {
                if flat[i * n + j] != flat[j * n + i] {
                    return Err(invalid(format!(
                        "table is not symmetric at ('{}', '{}')",
                        alphabet[i] as char, alphabet[j] as char
                    )));
                }
            }
        }
        Ok(Self::build(alphabet.to_vec(), flat, (n - 1) as u8))
    }

    /// BLOSUM62 over `ARNDCQEGHILKMFPSTWYVBZX*`, wildcard `*`.
    pub fn blosum62() -> Self {
        let flat = BLOSUM62.iter().flat_map(|row| row.iter().copied()).collect();
        Self::build(
            BLOSUM62_ALPHABET.to_vec(),
            flat,
            (BLOSUM62_ALPHABET.len() - 1) as u8,
        )
    }

    /// `ACGTN` with a flat match/mismatch score; `N` scores `mismatch`
    /// against everything, itself included.
    pub fn nucleotide(match_score: i32, mismatch_score: i32) -> Self {
        let n = NUCLEOTIDE_ALPHABET.len();
        let wildcard = n - 1;
        let mut flat = vec![mismatch_score; n * n];
        for i in 0..wildcard {
            flat[i * n + i] = match_score;
        }
        Self::build(NUCLEOTIDE_ALPHABET.to_vec(), flat, wildcard as u8)
    }

    /// Replaces the wildcard, remapping every out-of-alphabet byte to it.
    pub fn with_wildcard(self, symbol: u8) -> AlignResult<Self> {
        let idx = self
            .alphabet
            .iter()
            .position(|&s| s == symbol)
            .ok_or_else(|| {
                invalid(format!(
                    "wildcard '{}' is not in the alphabet",
                    symbol as char
                ))
            })?;
        Ok(Self::build(self.alphabet, self.table, idx as u8))
    }

    fn build(alphabet: Vec<u8>, table: Vec<i32>, wildcard: u8) -> Self {
        let map = build_map(&alphabet, wildcard);
        Self {
            alphabet,
            map,
            table,
            wildcard,
        }
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn len(&self) -> usize {
        self.alphabet.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alphabet.is_empty()
    }

    /// The wildcard symbol.
    pub fn wildcard(&self) -> u8 {
        self.alphabet[self.wildcard as usize]
    }

    #[inline]
    pub fn index_of(&self, symbol: u8) -> u8 {
        self.map[symbol as usize]
    }

    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.score_index(self.index_of(a), self.index_of(b))
    }

    #[inline]
    pub fn score_index(&self, a: u8, b: u8) -> i32 {
        self.table[a as usize * self.alphabet.len() + b as usize]
    }

    /// Maps a sequence to alphabet indices.
    pub fn encode(&self, seq: &[u8]) -> Vec<u8> {
        seq.iter().map(|&b| self.index_of(b)).collect()
    }

    pub fn max_score(&self) -> i32 {
        self.table.iter().copied().max().unwrap_or(0)
    }
}

fn invalid(msg: String) -> AlignError {
    AlignError::InvalidMatrix { msg }
}

fn build_map(alphabet: &[u8], wildcard: u8) -> [u8; 256] {
    let mut map = [wildcard; 256];
    for (i, &b) in alphabet.iter().enumerate() {
        map[b as usize] = i as u8;
    }
    // fold lowercase onto uppercase unless the alphabet has its own entry
    for (i, &b) in alphabet.iter().enumerate() {
        let lower = b.to_ascii_lowercase();
        if lower != b && !alphabet.contains(&lower) {
            map[lower as usize] = i as u8;
        }
    }
    map
}

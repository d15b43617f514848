use std::fmt::{Debug, Display, Formatter};

use crate::alphabet::{ALPHABET_SIZE, NUCLEOTIDE_INVERSE_MAP, UTF8_TO_DIGITAL_NUCLEOTIDE};
use anyhow::Result;
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("unknown UTF8 sequence byte: {byte}")]
pub struct UnknownUtf8SequenceByteError {
    pub byte: u8,
}

#[derive(Error, Debug)]
#[error("unknown digital sequence byte: {byte}")]
pub struct UnknownDigitalSequenceByteError {
    pub byte: u8,
}

/// This holds both the "digital" data and the string data of a nucleotide
/// sequence.
#[derive(Clone)]
pub struct Sequence {
    /// The name of the sequence
    pub name: String,
    /// The length of the sequence
    pub length: usize,
    /// The "digital" data of the sequence. These are
    /// the string bytes, but mapped to [0u8..4u8]
    pub digital_bytes: Vec<u8>,
    /// The string data of the sequence. These are the UTF8 bytes
    /// that make up the sequence in the "normal" alphabet
    pub utf8_bytes: Vec<u8>,
}

impl Sequence {
    pub fn from_utf8(bytes: &[u8]) -> Result<Self> {
        let utf8_bytes = bytes.to_vec();
        let mut digital_bytes: Vec<u8> = Vec::with_capacity(bytes.len());

        for utf8_byte in bytes {
            let digital_byte = match UTF8_TO_DIGITAL_NUCLEOTIDE.get(utf8_byte) {
                Some(b) => *b,
                None => return Err(UnknownUtf8SequenceByteError { byte: *utf8_byte }.into()),
            };
            digital_bytes.push(digital_byte);
        }

        Ok(Sequence {
            name: "".to_string(),
            length: digital_bytes.len(),
            digital_bytes,
            utf8_bytes,
        })
    }

    pub fn from_digital(bytes: &[u8]) -> Result<Self> {
        let digital_bytes = bytes.to_vec();
        let mut utf8_bytes: Vec<u8> = Vec::with_capacity(bytes.len());

        for digital_byte in bytes {
            let utf8_byte = match NUCLEOTIDE_INVERSE_MAP.get(digital_byte) {
                Some(b) => *b,
                None => {
                    return Err(UnknownDigitalSequenceByteError {
                        byte: *digital_byte,
                    }
                    .into())
                }
            };
            utf8_bytes.push(utf8_byte);
        }

        Ok(Sequence {
            name: "".to_string(),
            length: digital_bytes.len(),
            digital_bytes,
            utf8_bytes,
        })
    }

    pub fn random_nucleotide(length: usize, rng: &mut impl Rng) -> Self {
        let digital_bytes: Vec<u8> = (0..length)
            .map(|_| rng.gen_range(0..ALPHABET_SIZE as u8))
            .collect();

        let utf8_bytes: Vec<u8> = digital_bytes
            .iter()
            .map(|b| *NUCLEOTIDE_INVERSE_MAP.get(b).unwrap())
            .collect();

        Sequence {
            name: "".to_string(),
            length,
            digital_bytes,
            utf8_bytes,
        }
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.name)?;

        let mut iter = self.utf8_bytes.chunks(80).peekable();

        while let Some(byte_chunk) = iter.next() {
            match std::str::from_utf8(byte_chunk) {
                Ok(seq_line) => {
                    write!(f, "{}", seq_line)?;
                    if iter.peek().is_some() {
                        // if we're not on the last
                        // line, add a linebreak
                        writeln!(f)?;
                    }
                }
                Err(_) => return Err(std::fmt::Error),
            }
        }
        Ok(())
    }
}

impl Debug for Sequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", std::str::from_utf8(&self.utf8_bytes).unwrap())?;
        Ok(())
    }
}

use phf::phf_map;

pub const NUCLEOTIDE_ALPHABET: [&str; 4] = ["A", "C", "G", "T"];

pub const ALPHABET_SIZE: usize = 4;

/// maps from \<UTF8 nucleotide byte\> -> \<digital byte in 0..4\>
pub const UTF8_TO_DIGITAL_NUCLEOTIDE: phf::Map<u8, u8> = phf_map! {
    // upper case
    65u8 => 0,    // A
    67u8 => 1,    // C
    71u8 => 2,    // G
    84u8 => 3,    // T
    // lower case
    97u8 => 0,    // a
    99u8 => 1,    // c
    103u8 => 2,   // g
    116u8 => 3,   // t
};

pub const NUCLEOTIDE_INVERSE_MAP: phf::Map<u8, u8> = phf_map! {
    0u8 => 65,    // A
    1u8 => 67,    // C
    2u8 => 71,    // G
    3u8 => 84,    // T
};

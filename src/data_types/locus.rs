
use std::cmp::Ordering;
use std::fmt;

/// Sort value used for the X chromosome, places it after all autosomes
pub const CHROM_X_NUMBER: u32 = 98;
/// Sort value used for the Y chromosome
pub const CHROM_Y_NUMBER: u32 = 99;
/// Sort value for mitochondrial labels (M, MT)
pub const CHROM_MT_NUMBER: u32 = 100;
/// Sort value for anything else we cannot interpret (e.g., unplaced contigs)
pub const CHROM_OTHER_NUMBER: u32 = 101;

/// Rough classification of a chromosome label
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChromosomeClass {
    /// Numbered chromosome
    Autosome(u32),
    /// X or Y
    Sex,
    /// Anything without a number that is not X or Y
    Other,
}

/// Strips an optional, case-insensitive "chr" prefix from a label.
fn strip_chr_prefix(chrom: &str) -> &str {
    match chrom.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") => &chrom[3..],
        _ => chrom
    }
}

/// Classifies a chromosome label like "chr1", "chrX", or "7"
pub fn classify_chromosome(chrom: &str) -> ChromosomeClass {
    let core = strip_chr_prefix(chrom.trim());
    if core.eq_ignore_ascii_case("x") || core.eq_ignore_ascii_case("y") {
        ChromosomeClass::Sex
    } else if let Ok(number) = core.parse::<u32>() {
        ChromosomeClass::Autosome(number)
    } else {
        ChromosomeClass::Other
    }
}

/// Returns the number used to sort a chromosome label.
/// Autosomes use their own number, X and Y map to 98 and 99, mitochondria to 100, and anything else to 101.
pub fn chromosome_number(chrom: &str) -> u32 {
    let core = strip_chr_prefix(chrom.trim());
    match classify_chromosome(chrom) {
        ChromosomeClass::Autosome(n) => n,
        ChromosomeClass::Sex => {
            if core.eq_ignore_ascii_case("x") {
                CHROM_X_NUMBER
            } else {
                CHROM_Y_NUMBER
            }
        },
        ChromosomeClass::Other => {
            if core.eq_ignore_ascii_case("m") || core.eq_ignore_ascii_case("mt") {
                CHROM_MT_NUMBER
            } else {
                CHROM_OTHER_NUMBER
            }
        }
    }
}

/// Identifies a genomic site; rendered as `<chrom>_<position>`
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LocusKey {
    /// Chromosome label as provided by the source
    chrom: String,
    /// Position on the chromosome
    position: u64
}

impl LocusKey {
    /// Constructor
    pub fn new(chrom: impl Into<String>, position: u64) -> Self {
        Self {
            chrom: chrom.into(),
            position
        }
    }

    /// Parses a `<label>_<position>` string, splitting on the last underscore.
    /// Returns None if there is no underscore or the position is not an integer.
    pub fn parse(key: &str) -> Option<Self> {
        let (chrom, position) = key.rsplit_once('_')?;
        let position = position.parse::<u64>().ok()?;
        if chrom.is_empty() {
            return None;
        }
        Some(Self::new(chrom, position))
    }

    /// Key used to order loci by (chromosome number, position, label)
    pub fn sort_key(&self) -> (u32, u64, &str) {
        (chromosome_number(&self.chrom), self.position, &self.chrom)
    }

    // getters
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl fmt::Display for LocusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.chrom, self.position)
    }
}

impl Ord for LocusKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for LocusKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

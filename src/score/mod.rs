pub mod rank_weights;
pub mod score_cache;
pub mod score_pair;

use crate::types::{TaxId, UNCLASSIFIED_TAXID};

pub use rank_weights::RankWeights;
pub use score_cache::PredictionCache;
pub use score_pair::{entropy_from_geometry, EntropyScorer};

/// Tokens that mean "no classification made", compared after trimming.
pub const UNCLASSIFIED_SENTINELS: &[&str] = &["0", "", "NA", "None"];

/// A predicted taxon after sentinel normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prediction {
    Unclassified,
    Taxon(TaxId),
    /// Not a sentinel and not a taxid; can never be scored
    Unparseable,
}

impl Prediction {
    pub fn from_token(raw: &str) -> Self {
        let token = raw.trim();
        if UNCLASSIFIED_SENTINELS.contains(&token) {
            return Prediction::Unclassified;
        }
        match token.parse::<TaxId>() {
            Ok(taxid) => Self::from_taxid(taxid),
            Err(_) => Prediction::Unparseable,
        }
    }

    pub fn from_taxid(taxid: TaxId) -> Self {
        if taxid == UNCLASSIFIED_TAXID {
            Prediction::Unclassified
        } else {
            Prediction::Taxon(taxid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        for raw in ["0", "", "  ", "NA", "None", " 0 ", "000"] {
            assert_eq!(Prediction::from_token(raw), Prediction::Unclassified, "{:?}", raw);
        }
        assert_eq!(Prediction::from_token("9606"), Prediction::Taxon(9606));
        assert_eq!(Prediction::from_token(" 562\t"), Prediction::Taxon(562));
        assert_eq!(Prediction::from_token("Homo sapiens"), Prediction::Unparseable);
        assert_eq!(Prediction::from_taxid(0), Prediction::Unclassified);
    }
}

//! # Lexicon
//!
//! Keyword sets that drive the scorer. All matching is case-insensitive
//! substring matching on lowercase text, so entries are stored lowercase.
//!
//! - Loads from TOML; any set missing from the file keeps its seed value.
//! - `default_seed()` carries the French-news vocabulary used in production.
//! - Duplicate and blank entries are dropped on load so match counts stay honest.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::{fs, path::Path};

/// Tiered breaking-news vocabulary for the urgency signal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakingTiers {
    /// +3.0 each.
    pub high: Vec<String>,
    /// +2.5 each.
    pub very_high: Vec<String>,
    /// +2.0 each.
    pub important: Vec<String>,
    /// +1.0 each.
    pub other: Vec<String>,
}

impl Default for BreakingTiers {
    fn default() -> Self {
        Self {
            high: words(&["breaking", "urgent", "alerte", "exclusif"]),
            very_high: words(&["dernière minute", "état d'urgence"]),
            important: words(&["gouvernement", "président", "crise"]),
            other: words(&["élection", "attentat", "manifestation", "grève nationale"]),
        }
    }
}

/// Keyword sets for quality, relevance, importance and urgency scoring.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Each group contributes once when any of its words appears.
    pub quality_indicators: Vec<Vec<String>>,
    pub poor_quality: Vec<String>,
    pub high_relevance: Vec<String>,
    pub medium_relevance: Vec<String>,
    pub low_relevance: Vec<String>,
    pub relevant_categories: Vec<String>,
    pub international: Vec<String>,
    pub domestic_context: Vec<String>,
    pub importance_urgency: Vec<String>,
    pub policy: Vec<String>,
    pub economic: Vec<String>,
    pub social: Vec<String>,
    pub reputable_sources: Vec<String>,
    pub locality: Vec<String>,
    pub major_cities: Vec<String>,
    pub breaking: BreakingTiers,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl Lexicon {
    /// Load from a TOML file. Unreadable or invalid files fall back to `default_seed()`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let parsed = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|s| toml::from_str::<Lexicon>(&s).map_err(anyhow::Error::from));
        match parsed {
            Ok(lex) => lex.cleaned(),
            Err(e) => {
                tracing::warn!(target: "curate", path = %path.display(), error = %e, "lexicon load failed; using seed");
                Self::default_seed()
            }
        }
    }

    /// Lowercase, trim and dedupe every set, preserving first-seen order.
    pub fn cleaned(mut self) -> Self {
        for set in self.quality_indicators.iter_mut() {
            clean(set);
        }
        self.quality_indicators.retain(|g| !g.is_empty());
        for set in [
            &mut self.poor_quality,
            &mut self.high_relevance,
            &mut self.medium_relevance,
            &mut self.low_relevance,
            &mut self.relevant_categories,
            &mut self.international,
            &mut self.domestic_context,
            &mut self.importance_urgency,
            &mut self.policy,
            &mut self.economic,
            &mut self.social,
            &mut self.reputable_sources,
            &mut self.locality,
            &mut self.major_cities,
            &mut self.breaking.high,
            &mut self.breaking.very_high,
            &mut self.breaking.important,
            &mut self.breaking.other,
        ] {
            clean(set);
        }
        self
    }

    /// Built-in French-news vocabulary.
    pub fn default_seed() -> Self {
        Self {
            quality_indicators: vec![
                words(&["analyse", "enquête", "investigation", "reportage", "dossier"]),
                words(&["expert", "spécialiste", "professeur", "chercheur", "selon"]),
                words(&["source", "témoin", "déclaration", "interview", "entretien"]),
                words(&["contexte", "histoire", "background", "explication", "pourquoi"]),
            ],
            poor_quality: words(&["cliquez", "buzz", "choc", "scandaleux", "incroyable"]),
            high_relevance: words(&[
                // immigration & legal
                "immigration", "visa", "carte de séjour", "naturalisation", "préfecture",
                "titre de séjour", "étranger", "expatrié", "résidence", "citoyenneté",
                // daily life & services
                "sécurité sociale", "caf", "pôle emploi", "impôts", "logement", "santé",
                "transport", "sncf", "ratp", "école", "université", "formation",
                "banque", "assurance", "mutuelle", "médecin", "hôpital",
                // culture & society
                "culture française", "tradition", "laïcité", "république", "marianne",
                "gastronomie", "cuisine", "vin", "fromage", "baguette", "café",
                "festival", "patrimoine", "monument", "musée", "art français",
                // government affecting daily life
                "gouvernement", "président", "assemblée nationale", "sénat", "maire",
                "conseil municipal", "région", "département", "commune", "élection",
                "réforme", "loi", "décret", "politique sociale",
                // economy & work
                "emploi", "chômage", "smic", "salaire", "retraite", "cotisation",
                "entreprise", "startup", "innovation", "économie française", "crise",
                "inflation", "pouvoir d'achat", "marché du travail",
                // language learning
                "français langue étrangère", "fle", "apprentissage", "intégration",
                "cours de français", "alliance française",
                // regional life
                "paris", "région parisienne", "province", "métropole", "banlieue",
                "quartier", "arrondissement", "ile-de-france",
            ]),
            medium_relevance: words(&[
                "france", "français", "national", "pays", "état", "société",
                "population", "citoyen", "public", "social", "communauté",
                "actualité", "information", "débat", "polémique", "manifestation",
                "grève", "syndical", "droit", "justice", "tribunal",
                "technologie", "numérique", "internet", "intelligence artificielle",
                "startup française", "innovation française",
                "environnement", "climat", "pollution", "transport public",
                "vélo", "écologie", "recyclage", "énergie",
            ]),
            low_relevance: words(&[
                "people", "célébrité", "star", "télé-réalité", "scandale",
                "paparazzi", "instagram", "tiktok", "influenceur",
                "gossip", "rumeur", "vie privée",
            ]),
            relevant_categories: words(&[
                "politique", "société", "économie", "france", "national",
                "immigration", "education", "culture", "santé", "social",
            ]),
            international: words(&["états-unis", "chine", "russie", "ukraine", "gaza"]),
            domestic_context: words(&["france", "français", "hexagone", "paris", "gouvernement"]),
            importance_urgency: words(&[
                "breaking", "urgent", "alerte", "important", "majeur",
                "historique", "exceptionnel", "première fois", "record",
                "crise", "urgence", "décision", "annonce", "officiel",
            ]),
            policy: words(&[
                "gouvernement", "ministre", "président", "assemblée", "sénat",
                "loi", "décret", "réforme", "politique", "décision officielle",
            ]),
            economic: words(&[
                "économie", "emploi", "chômage", "inflation", "prix", "salaire",
                "impôt", "budget", "crise", "marché", "entreprise",
            ]),
            social: words(&[
                "société", "social", "manifestation", "grève", "éducation",
                "santé", "logement", "transport", "sécurité", "justice",
            ]),
            reputable_sources: words(&[
                "le monde", "le figaro", "france info", "france 24", "rfi",
                "libération", "le parisien", "afp",
            ]),
            locality: words(&["commune", "village", "petit", "local"]),
            major_cities: words(&["paris", "lyon", "marseille", "toulouse", "nice", "nantes"]),
            breaking: BreakingTiers::default(),
        }
        .cleaned()
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn clean(set: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    set.retain_mut(|w| {
        *w = w.trim().to_lowercase();
        !w.is_empty() && seen.insert(w.clone())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn seed_sets_are_lowercase_and_unique() {
        let lex = Lexicon::default_seed();
        let unique: BTreeSet<_> = lex.high_relevance.iter().collect();
        assert_eq!(unique.len(), lex.high_relevance.len());
        assert!(lex.high_relevance.iter().all(|w| *w == w.to_lowercase()));
        assert_eq!(lex.quality_indicators.len(), 4);
    }

    #[test]
    fn partial_toml_keeps_seed_for_missing_sets() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "poor_quality = [\" CLIQUEZ \", \"cliquez\", \"\"]").unwrap();
        let lex = Lexicon::load_from_file(f.path());
        assert_eq!(lex.poor_quality, vec!["cliquez".to_string()]);
        assert_eq!(lex.policy, Lexicon::default_seed().policy);
    }

    #[test]
    fn unreadable_file_falls_back_to_seed() {
        let lex = Lexicon::load_from_file("does/not/exist.toml");
        assert_eq!(lex.major_cities.len(), 6);
    }
}

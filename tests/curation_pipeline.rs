// tests/curation_pipeline.rs
use news_curator::curate::dedup::{select_representative, DedupConfig, Deduplicator, Grouping};
use news_curator::curate::scorer::Scorer;
use news_curator::curate::{reason_kind, FastTrackPolicy, REASON_DUPLICATE};
use news_curator::{CurationMode, CurationPipeline, RawArticle, ScoredArticle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOPICS: &[&str] = &[
    "Réforme des retraites : le gouvernement présente son projet",
    "Grève à la SNCF : trafic perturbé ce matin en Île-de-France",
    "Inflation : les prix alimentaires reculent pour le troisième mois",
    "Logement : la préfecture de Paris ouvre un nouveau service",
    "Budget 2026 : le Sénat adopte la première partie",
    "Santé : l'hôpital public face à la pénurie de médecins",
    "Football : le PSG s'impose face à Lyon",
    "Météo : un week-end ensoleillé sur la moitié sud",
];

/// Batch with injected near-duplicates and shared links.
fn noisy_batch(seed: u64, n: usize) -> Vec<RawArticle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out: Vec<RawArticle> = Vec::with_capacity(n);
    for i in 0..n {
        let roll = rng.random_range(0..10);
        let article = if roll < 3 && !out.is_empty() {
            // near-duplicate of an earlier item
            let base = &out[rng.random_range(0..out.len())];
            let mut copy = base.clone();
            copy.title.push_str(" !");
            copy.link = Some(format!("https://exemple.fr/copie/{i}"));
            copy.content.push_str(&" détail".repeat(rng.random_range(0..4)));
            copy
        } else if roll == 3 && !out.is_empty() {
            // same link, unrelated text
            let base = &out[rng.random_range(0..out.len())];
            let mut other = RawArticle::titled(format!("Dépêche {i}")).with_summary("Texte bref.");
            other.link = base.link.clone();
            other
        } else {
            let topic = TOPICS[rng.random_range(0..TOPICS.len())];
            RawArticle::titled(format!("{topic} ({i})"))
                .with_summary(format!(
                    "Selon le ministre, la décision {i} concerne le logement et la santé des Français."
                ))
                .with_content("Analyse détaillée. ".repeat(rng.random_range(1..20)))
                .with_source(if i % 2 == 0 { "Le Monde" } else { "Blog" })
                .with_link(format!("https://exemple.fr/article/{i}"))
        };
        out.push(article);
    }
    out
}

fn articles_of(scored: &[ScoredArticle]) -> Vec<RawArticle> {
    scored.iter().map(|s| s.article.clone()).collect()
}

#[test]
fn curated_and_rejected_partition_the_input() {
    let batch = noisy_batch(7, 60);
    let result = CurationPipeline::default().curate(batch.clone(), 18.0, CurationMode::Full);

    assert_eq!(result.curated.len() + result.rejected.len(), batch.len());
    assert!(result.rejected.iter().all(|r| r.rejection_reason.is_some()));
    assert!(result.curated.iter().all(|c| c.rejection_reason.is_none()));
    assert!(result.curated.iter().all(|c| c.total_score >= 18.0));

    // descending by total
    for w in result.curated.windows(2) {
        assert!(w[0].total_score >= w[1].total_score);
    }

    let hist_total: usize = result.rejection_histogram.values().sum();
    assert_eq!(hist_total, result.rejected.len());
    assert_eq!(result.stats.count, result.curated.len());
}

#[test]
fn recurating_a_curated_set_removes_nothing() {
    let pipeline = CurationPipeline::default();
    for seed in [1_u64, 2, 3, 99] {
        let first = pipeline.curate(noisy_batch(seed, 80), 10.0, CurationMode::Full);
        let again = pipeline.curate(articles_of(&first.curated), 10.0, CurationMode::Full);
        assert!(
            again.rejected.is_empty(),
            "seed {seed}: {:?}",
            again.rejection_histogram
        );
        assert_eq!(again.curated.len(), first.curated.len());
        assert_eq!(again.duplicate_groups, 0);
    }
}

#[test]
fn same_link_different_titles_keeps_the_higher_score() {
    let strong = RawArticle::titled("Réforme des retraites : le gouvernement annonce un accord historique")
        .with_summary("Selon le ministre du Travail, la réforme entrera en vigueur en janvier.")
        .with_content("Analyse complète de la décision officielle. ".repeat(10))
        .with_source("Le Monde")
        .with_author("Rédaction")
        .with_link("https://exemple.fr/a");
    let weak = RawArticle::titled("Buzz")
        .with_link("https://exemple.fr/a");

    let dedup = Deduplicator::default();
    assert!(!dedup.is_similar(&weak, &strong));

    // weak first so input order does not decide
    let result = CurationPipeline::default().curate(vec![weak, strong], 0.0, CurationMode::Full);
    assert_eq!(result.duplicate_groups, 1);
    assert_eq!(result.curated.len(), 1);
    assert!(result.curated[0].article.title.starts_with("Réforme"));
    assert_eq!(result.rejected[0].rejection_reason.as_deref(), Some(REASON_DUPLICATE));
}

#[test]
fn exact_links_group_under_anchor_scan_too() {
    let a = RawArticle::titled("aaaa").with_link("https://x/1");
    let b = RawArticle::titled("aaab");
    let c = RawArticle::titled("zzzz totalement différent").with_link("https://x/1");

    let anchor = Deduplicator::new(
        DedupConfig {
            title_threshold: 0.7,
            ..DedupConfig::default()
        },
        Grouping::Anchor,
    );
    let groups = anchor.find_duplicates(&[a, b, c]);
    assert!(groups
        .iter()
        .any(|g| g.members.contains(&0) && g.members.contains(&2)));
}

#[test]
fn kept_member_outscores_every_other_member() {
    let batch = noisy_batch(11, 120);
    let scorer = Scorer::default();
    let scored: Vec<ScoredArticle> = batch
        .iter()
        .map(|a| ScoredArticle::new(a.clone(), scorer.score(a), scorer.urgency(a), chrono::Utc::now()))
        .collect();

    let groups = Deduplicator::default().find_duplicates(&batch);
    assert!(!groups.is_empty());
    for g in &groups {
        let keep = select_representative(&g.members, &scored).unwrap();
        for &m in &g.members {
            let (k, o) = (&scored[keep], &scored[m]);
            assert!(k.total_score >= o.total_score);
            if k.total_score == o.total_score && m != keep {
                assert!(k.article.content.chars().count() >= o.article.content.chars().count());
            }
        }
    }
}

#[test]
fn equal_scores_break_ties_on_content_length() {
    let short = RawArticle::titled("Titre identique pour deux dépêches").with_link("https://x/t");
    let long = short.clone().with_content("x".repeat(50));
    let result = CurationPipeline::default().curate(vec![short, long], 0.0, CurationMode::Full);
    assert_eq!(result.curated.len(), 1);
    assert_eq!(result.curated[0].article.content.len(), 50);
}

#[test]
fn fast_track_admits_urgent_items_below_the_bar() {
    let pipeline = CurationPipeline::default();
    let urgent = RawArticle::titled("x").with_urgency(5.0);
    let dull = RawArticle::titled("y").with_urgency(0.0);

    let result = pipeline.curate(vec![urgent, dull], 25.0, CurationMode::FastTrack);
    assert_eq!(result.threshold, 25.0 - FastTrackPolicy::default().threshold_offset);
    assert_eq!(result.curated.len(), 1);
    assert!(result.curated[0].fast_tracked);
    assert_eq!(result.fast_tracked_count(), 1);

    let reason = result.rejected[0].rejection_reason.as_deref().unwrap();
    assert!(reason.starts_with("low_score_breaking_"));
    assert_eq!(reason_kind(reason), "low_score_breaking");
    assert_eq!(result.rejection_histogram.get("low_score_breaking"), Some(&1));
}

#[test]
fn fast_track_skips_similarity_dedup() {
    let a = RawArticle::titled("Grève nationale : les transports à l'arrêt").with_link("https://x/1");
    let b = RawArticle::titled("Grève nationale : les transports à l'arrêt !").with_link("https://x/2");

    let full = CurationPipeline::default().curate(vec![a.clone(), b.clone()], 0.0, CurationMode::Full);
    assert_eq!(full.duplicate_groups, 1);

    let fast = CurationPipeline::default().curate(vec![a, b], 0.0, CurationMode::FastTrack);
    assert_eq!(fast.duplicate_groups, 0);
    assert_eq!(fast.curated.len(), 2);
}

#[test]
fn bad_records_are_skipped_not_fatal() {
    let records = vec![
        serde_json::json!({"title": "Un titre valable", "url": "https://x/ok"}),
        serde_json::json!({"summary": "pas de titre"}),
        serde_json::json!({"title": "   "}),
        serde_json::json!(42),
    ];
    let result = CurationPipeline::default().curate_records(records, 0.0, CurationMode::Full);
    assert_eq!(result.curated.len(), 1);
    assert_eq!(result.skipped_records.len(), 3);
    assert_eq!(
        result.skipped_records.iter().map(|s| s.index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn curation_ids_follow_identity() {
    let a = RawArticle::titled("Même titre").with_link("https://x/same");
    let b = RawArticle::titled("Autre titre").with_link("https://x/same");
    let result = CurationPipeline::default().curate(vec![a, b], 0.0, CurationMode::Full);
    let all: Vec<&ScoredArticle> = result.curated.iter().chain(result.rejected.iter()).collect();
    assert_eq!(all[0].curation_id, all[1].curation_id);
    assert_eq!(all[0].curation_id.len(), 12);
}

//! Static table of publisher → search restriction patterns
//!
//! Known press-room and repository locations for the publishers the
//! pipeline sees most. Matching is by lowercase keyword against the
//! publisher name (or, for research artifacts, the artifact type).

/// One table row
struct DomainRule {
    /// Publisher keywords that select this row
    publisher_keywords: &'static [&'static str],
    /// Artifact-type keywords that select this row
    artifact_keywords: &'static [&'static str],
    patterns: &'static [&'static str],
}

const RULES: &[DomainRule] = &[
    // Catalan government
    DomainRule {
        publisher_keywords: &["generalitat", "govern", "gencat"],
        artifact_keywords: &[],
        patterns: &[
            "site:govern.cat/ca/noticies",
            "site:govern.cat/ca/comunicats",
            "site:gencat.cat/ca/actualitat",
            "site:web.gencat.cat/ca/actualitat",
        ],
    },
    // Spanish government
    DomainRule {
        publisher_keywords: &["gobierno", "ministerio", "administración"],
        artifact_keywords: &[],
        patterns: &["site:lamoncloa.gob.es/serviciosdeprensa", "site:*.gob.es/prensa"],
    },
    // Municipal press rooms
    DomainRule {
        publisher_keywords: &["ajuntament", "ayuntamiento", "badalona", "barcelona"],
        artifact_keywords: &[],
        patterns: &["site:ajuntament.barcelona.cat/premsa", "site:badalona.cat/ca/noticies"],
    },
    // Academic / survey repositories
    DomainRule {
        publisher_keywords: &[],
        artifact_keywords: &["survey", "barometer", "baròmetre", "barómetro", "enquesta", "encuesta"],
        patterns: &["site:*.edu", "site:ceo.gencat.cat", "filetype:pdf"],
    },
];

/// Patterns for a publisher/artifact pair, in table order, without repeats
pub fn patterns_for(publisher: &str, artifact_type: Option<&str>) -> Vec<&'static str> {
    let publisher = publisher.to_lowercase();
    let artifact = artifact_type.map(str::to_lowercase).unwrap_or_default();

    let mut patterns: Vec<&'static str> = Vec::new();
    for rule in RULES {
        let by_publisher = !publisher.is_empty()
            && rule.publisher_keywords.iter().any(|k| publisher.contains(k));
        let by_artifact =
            !artifact.is_empty() && rule.artifact_keywords.iter().any(|k| artifact.contains(k));
        if by_publisher || by_artifact {
            for pattern in rule.patterns {
                if !patterns.contains(pattern) {
                    patterns.push(pattern);
                }
            }
        }
    }
    patterns
}

//! Deterministic, network-free `AiEngine`.
//!
//! Scoring weights: experience 40, education 25, skills 20,
//! verification 10, completion 5. Gold profiles get a flat boost; the
//! total stays capped at 100.

use async_trait::async_trait;
use tracing::debug;

use crate::ai_engine::{
    AiEngine, CvRequest, EducationLevel, GeneratedCv, ScoreBreakdown, ScoringInput,
    ScoringOutput, SearchCriteria, SearchInput, SearchOutput, MAX_EXPERIENCE_YEARS,
};
use crate::errors::AppError;

const EXCELLENT_SCORE: u32 = 85;
const SOLID_SCORE: u32 = 60;
const GOLD_BONUS: u32 = 5;

/// Skills recognised in free-text queries, with the keywords suggested
/// alongside them.
const SKILL_VOCABULARY: &[(&str, &str, &[&str])] = &[
    ("javascript", "JavaScript", &["TypeScript", "Node.js"]),
    ("typescript", "TypeScript", &["JavaScript"]),
    ("react", "React", &["frontend", "TypeScript"]),
    ("node", "Node.js", &["API REST", "backend"]),
    ("python", "Python", &["Django", "data"]),
    ("java", "Java", &["Spring", "backend"]),
    ("php", "PHP", &["Laravel", "MySQL"]),
    ("sql", "SQL", &["PostgreSQL", "bases de données"]),
    ("excel", "Excel", &["reporting"]),
    ("comptab", "Comptabilité", &["fiscalité", "audit"]),
    ("marketing", "Marketing", &["communication digitale"]),
    ("logistique", "Logistique", &["supply chain"]),
];

const LOCATIONS: &[&str] = &[
    "Conakry",
    "Kindia",
    "Kankan",
    "Labé",
    "Boké",
    "Nzérékoré",
    "Mamou",
    "Siguiri",
];

pub struct MockAiEngine;

#[async_trait]
impl AiEngine for MockAiEngine {
    async fn score_profile(&self, input: &ScoringInput) -> Result<ScoringOutput, AppError> {
        let breakdown = ScoreBreakdown {
            experience_score: input.experience_years.clamp(0, 10) as u32 * 4,
            education_score: match input.education_level {
                EducationLevel::Bac => 10,
                EducationLevel::Licence => 15,
                EducationLevel::Master => 20,
                EducationLevel::Doctorat => 25,
            },
            skills_score: input.skills.len().min(10) as u32 * 2,
            verification_score: if input.is_verified { 10 } else { 0 },
            completion_score: input.profile_completion.unwrap_or(0).clamp(0, 100) as u32 * 5
                / 100,
            gold_bonus: if input.is_gold { GOLD_BONUS } else { 0 },
        };
        let score = (breakdown.experience_score
            + breakdown.education_score
            + breakdown.skills_score
            + breakdown.verification_score
            + breakdown.completion_score
            + breakdown.gold_bonus)
            .min(100);

        let reasoning = if score >= EXCELLENT_SCORE {
            "Excellent profil : expérience, formation et compétences de premier plan."
        } else if score >= SOLID_SCORE {
            "Profil solide avec bonne expérience et formation adaptée."
        } else {
            "Profil à renforcer : expérience ou compétences encore limitées."
        };

        debug!("Mock scoring for {}: {score}", input.candidate_id);
        Ok(ScoringOutput {
            score,
            breakdown,
            reasoning: reasoning.to_string(),
        })
    }

    async fn semantic_search(&self, input: &SearchInput) -> Result<SearchOutput, AppError> {
        let query = input.query.trim();
        let lowered = query.to_lowercase();

        let mut skills = Vec::new();
        let mut suggested_keywords = Vec::new();
        for (needle, skill, related) in SKILL_VOCABULARY {
            if lowered.contains(needle) && !skills.contains(&skill.to_string()) {
                skills.push(skill.to_string());
                for keyword in related.iter() {
                    let keyword = keyword.to_string();
                    if !suggested_keywords.contains(&keyword) {
                        suggested_keywords.push(keyword);
                    }
                }
            }
        }
        suggested_keywords.retain(|k| !skills.contains(k));

        let location = LOCATIONS
            .iter()
            .find(|city| lowered.contains(&city.to_lowercase()))
            .map(|city| city.to_string());

        let education_level = if lowered.contains("doctorat") {
            Some(EducationLevel::Doctorat)
        } else if lowered.contains("master") {
            Some(EducationLevel::Master)
        } else if lowered.contains("licence") {
            Some(EducationLevel::Licence)
        } else if lowered.contains("bac") {
            Some(EducationLevel::Bac)
        } else {
            None
        };

        let experience_min = years_of_experience(&lowered);
        let domain = if skills.iter().any(|s| {
            matches!(
                s.as_str(),
                "JavaScript" | "TypeScript" | "React" | "Node.js" | "Python" | "Java" | "PHP" | "SQL"
            )
        }) {
            Some("Informatique".to_string())
        } else if skills.iter().any(|s| s == "Comptabilité") {
            Some("Finance".to_string())
        } else {
            None
        };

        let mut relevance_factors = Vec::new();
        if !skills.is_empty() {
            relevance_factors.push("Compétences techniques".to_string());
        }
        if experience_min.is_some() {
            relevance_factors.push("Années d'expérience".to_string());
        }
        if education_level.is_some() {
            relevance_factors.push("Formation".to_string());
        }
        if location.is_some() {
            relevance_factors.push("Localisation".to_string());
        }
        if relevance_factors.is_empty() {
            relevance_factors.push("Correspondance du titre de poste".to_string());
        }

        Ok(SearchOutput {
            interpreted_query: format!("Recherche de profils correspondant à : {query}"),
            search_criteria: SearchCriteria {
                skills,
                experience_min,
                experience_max: experience_min.map(|min| min.saturating_add(5)),
                education_level,
                location,
                domain,
            },
            suggested_keywords,
            relevance_factors,
        })
    }

    async fn generate_cv(&self, input: &CvRequest) -> Result<GeneratedCv, AppError> {
        let mut content = format!("# {}\n", input.full_name.trim());
        let headline = input.target_job.as_ref().or(input.title.as_ref());
        if let Some(headline) = headline {
            content.push_str(&format!("\n**{}**\n", headline.trim()));
        }

        let mut sections = Vec::new();

        if let Some(summary) = input.summary.as_ref().filter(|s| !s.trim().is_empty()) {
            sections.push("Profil".to_string());
            content.push_str(&format!("\n## Profil\n\n{}\n", summary.trim()));
        }

        if !input.experiences.is_empty() {
            sections.push("Expérience professionnelle".to_string());
            content.push_str("\n## Expérience professionnelle\n");
            for exp in &input.experiences {
                content.push_str(&format!("\n### {} - {}", exp.title, exp.company));
                if let Some(period) = &exp.period {
                    content.push_str(&format!(" ({period})"));
                }
                content.push('\n');
                if let Some(description) = &exp.description {
                    content.push_str(&format!("\n{}\n", description.trim()));
                }
            }
        }

        if !input.education.is_empty() {
            sections.push("Formation".to_string());
            content.push_str("\n## Formation\n\n");
            for line in &input.education {
                content.push_str(&format!("- {line}\n"));
            }
        }

        if !input.skills.is_empty() {
            sections.push("Compétences".to_string());
            content.push_str(&format!("\n## Compétences\n\n{}\n", input.skills.join(", ")));
        }

        Ok(GeneratedCv {
            format: "markdown".to_string(),
            content,
            sections,
        })
    }
}

/// Finds "<n> ans" in a lowercased query. Counts outside a working
/// lifetime are ignored.
fn years_of_experience(query: &str) -> Option<i32> {
    let words: Vec<&str> = query.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let years = pair[0].trim_start_matches('+').parse::<i32>().ok()?;
        (pair[1].starts_with("an") && (0..=MAX_EXPERIENCE_YEARS).contains(&years))
            .then_some(years)
    })
}

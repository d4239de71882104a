// libs/visit-schedule-cell/src/catalog.rs
use thiserror::Error;
use tracing::debug;

use crate::clock::FULL_TERM_WEEKS;
use crate::models::{ConditionFlag, DueRule, SupplementalRule, VisitDefinition, VisitTrack};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("Supplemental rule '{rule}' references unknown anchor visit '{anchor}'")]
    DanglingAnchor { rule: String, anchor: String },

    #[error("Duplicate visit title '{0}' in {1} track")]
    DuplicateTitle(String, VisitTrack),

    #[error("Visit '{title}' is due at week {week}, past full term")]
    ThresholdPastTerm { title: String, week: u32 },

    #[error("Supplemental rule '{0}' must start at least one week after its anchor")]
    ZeroOffset(String),

    #[error("Supplemental rule '{0}' must repeat at least every week")]
    ZeroFrequency(String),

    #[error("Supplemental rule '{rule}' first occurs at week {week}, past full term")]
    StartsPastTerm { rule: String, week: u32 },

    #[error("Supplemental rule '{0}' may only anchor to an antenatal visit")]
    PostnatalAnchor(String),
}

/// Immutable, validated table of standard visits. Built once at startup;
/// a malformed catalog is a configuration error, never a per-recipient
/// runtime failure.
#[derive(Debug, Clone)]
pub struct VisitCatalog {
    antenatal: Vec<VisitDefinition>,
    postnatal: Vec<VisitDefinition>,
}

impl VisitCatalog {
    pub fn build(definitions: Vec<VisitDefinition>) -> Result<Self, CatalogError> {
        let mut antenatal: Vec<VisitDefinition> = Vec::new();
        let mut postnatal: Vec<VisitDefinition> = Vec::new();

        for definition in definitions {
            match definition.track {
                VisitTrack::Antenatal => antenatal.push(definition),
                VisitTrack::Postnatal => postnatal.push(definition),
            }
        }

        antenatal.sort_by_key(|v| due_value(&v.due_rule));
        postnatal.sort_by_key(|v| due_value(&v.due_rule));

        let catalog = Self {
            antenatal,
            postnatal,
        };
        catalog.validate()?;

        debug!(
            "Visit catalog built: {} antenatal, {} postnatal definitions",
            catalog.antenatal.len(),
            catalog.postnatal.len()
        );
        Ok(catalog)
    }

    /// The standard antenatal/postnatal schedule bundled with the engine.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::build(standard_definitions())
    }

    pub fn track(&self, track: VisitTrack) -> &[VisitDefinition] {
        match track {
            VisitTrack::Antenatal => &self.antenatal,
            VisitTrack::Postnatal => &self.postnatal,
        }
    }

    pub fn find(&self, track: VisitTrack, title: &str) -> Option<&VisitDefinition> {
        self.track(track).iter().find(|v| v.title == title)
    }

    /// Due week of the antenatal visit a supplemental rule anchors to.
    /// Build-time validation guarantees this resolves for any rule held by
    /// this catalog.
    pub fn anchor_week(&self, rule: &SupplementalRule) -> Option<u32> {
        self.find(VisitTrack::Antenatal, &rule.anchor_title)
            .and_then(|visit| match visit.due_rule {
                DueRule::GestationalWeek(week) => Some(week),
                DueRule::DaysAfterBirth(_) => None,
            })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for track in [VisitTrack::Antenatal, VisitTrack::Postnatal] {
            let definitions = self.track(track);
            for (index, definition) in definitions.iter().enumerate() {
                if definitions[..index].iter().any(|v| v.title == definition.title) {
                    return Err(CatalogError::DuplicateTitle(definition.title.clone(), track));
                }

                if let DueRule::GestationalWeek(week) = definition.due_rule {
                    if week > FULL_TERM_WEEKS {
                        return Err(CatalogError::ThresholdPastTerm {
                            title: definition.title.clone(),
                            week,
                        });
                    }
                }

                for (_, rule) in &definition.supplemental {
                    self.validate_rule(rule)?;
                }
            }
        }
        Ok(())
    }

    fn validate_rule(&self, rule: &SupplementalRule) -> Result<(), CatalogError> {
        let anchor = self
            .find(VisitTrack::Antenatal, &rule.anchor_title)
            .ok_or_else(|| CatalogError::DanglingAnchor {
                rule: rule.title.clone(),
                anchor: rule.anchor_title.clone(),
            })?;

        let anchor_week = match anchor.due_rule {
            DueRule::GestationalWeek(week) => week,
            DueRule::DaysAfterBirth(_) => {
                return Err(CatalogError::PostnatalAnchor(rule.title.clone()))
            }
        };

        if rule.offset_weeks == 0 {
            return Err(CatalogError::ZeroOffset(rule.title.clone()));
        }
        if rule.frequency_weeks == 0 {
            return Err(CatalogError::ZeroFrequency(rule.title.clone()));
        }

        let first_week = anchor_week + rule.offset_weeks;
        if first_week > FULL_TERM_WEEKS {
            return Err(CatalogError::StartsPastTerm {
                rule: rule.title.clone(),
                week: first_week,
            });
        }

        Ok(())
    }
}

fn due_value(rule: &DueRule) -> u32 {
    match rule {
        DueRule::GestationalWeek(week) => *week,
        DueRule::DaysAfterBirth(days) => *days,
    }
}

// ==============================================================================
// STANDARD VISIT SCHEDULE
// ==============================================================================

fn antenatal_visit(
    title: &str,
    week: u32,
    details: &[&str],
) -> VisitDefinition {
    VisitDefinition {
        title: title.to_string(),
        track: VisitTrack::Antenatal,
        due_rule: DueRule::GestationalWeek(week),
        details: details.iter().map(|d| d.to_string()).collect(),
        enhancements: Vec::new(),
        supplemental: Vec::new(),
    }
}

fn postnatal_visit(title: &str, days: u32, details: &[&str]) -> VisitDefinition {
    VisitDefinition {
        title: title.to_string(),
        track: VisitTrack::Postnatal,
        due_rule: DueRule::DaysAfterBirth(days),
        details: details.iter().map(|d| d.to_string()).collect(),
        enhancements: Vec::new(),
        supplemental: Vec::new(),
    }
}

fn enhancement(flag: ConditionFlag, details: &[&str]) -> (ConditionFlag, Vec<String>) {
    (flag, details.iter().map(|d| d.to_string()).collect())
}

fn standard_definitions() -> Vec<VisitDefinition> {
    let mut booking = antenatal_visit(
        "First Antenatal Contact",
        12,
        &[
            "Confirm pregnancy and estimate due date",
            "Record weight, height and baseline blood pressure",
            "Baseline blood tests and urinalysis",
            "Start folic acid and iron supplementation",
        ],
    );
    booking.enhancements = vec![
        enhancement(
            ConditionFlag::Hypertension,
            &["Baseline blood pressure series", "Urine protein dipstick"],
        ),
        enhancement(
            ConditionFlag::Diabetes,
            &["Fasting blood glucose", "Nutrition counselling referral"],
        ),
        enhancement(
            ConditionFlag::Hiv,
            &["Viral load review", "ART adherence check"],
        ),
        enhancement(
            ConditionFlag::ElevatedMentalHealthScore,
            &["Structured mental wellbeing assessment"],
        ),
    ];

    let mut second = antenatal_visit(
        "Second Antenatal Contact",
        16,
        &[
            "Blood pressure and weight check",
            "Fetal heartbeat check",
            "Review supplement adherence",
        ],
    );
    second.enhancements = vec![enhancement(
        ConditionFlag::ElevatedMentalHealthScore,
        &["Repeat depression, anxiety and stress screening"],
    )];
    second.supplemental = vec![
        (
            ConditionFlag::Hypertension,
            SupplementalRule {
                title: "Blood Pressure Review".to_string(),
                anchor_title: "Second Antenatal Contact".to_string(),
                offset_weeks: 2,
                frequency_weeks: 2,
                details: vec![
                    "Blood pressure measurement".to_string(),
                    "Check for headache, visual changes or swelling".to_string(),
                ],
            },
        ),
        (
            ConditionFlag::Diabetes,
            SupplementalRule {
                title: "Blood Glucose Review".to_string(),
                anchor_title: "Second Antenatal Contact".to_string(),
                offset_weeks: 2,
                frequency_weeks: 3,
                details: vec![
                    "Blood glucose measurement".to_string(),
                    "Review diet and medication adherence".to_string(),
                ],
            },
        ),
    ];

    let third = antenatal_visit(
        "Third Antenatal Contact",
        22,
        &[
            "Anatomy ultrasound review",
            "Blood pressure and weight check",
            "Tetanus toxoid vaccination",
        ],
    );

    let mut fourth = antenatal_visit(
        "Fourth Antenatal Contact",
        28,
        &[
            "Blood pressure and weight check",
            "Fundal height measurement",
            "Screen for anaemia",
        ],
    );
    fourth.enhancements = vec![
        enhancement(
            ConditionFlag::HighParity,
            &["Birth preparedness and facility delivery plan"],
        ),
        enhancement(
            ConditionFlag::HighGravidity,
            &["Birth preparedness and facility delivery plan"],
        ),
        enhancement(
            ConditionFlag::PriorComplications,
            &["Obstetric history review with clinician"],
        ),
    ];
    fourth.supplemental = vec![(
        ConditionFlag::Hiv,
        SupplementalRule {
            title: "Viral Load Follow-up".to_string(),
            anchor_title: "Fourth Antenatal Contact".to_string(),
            offset_weeks: 4,
            frequency_weeks: 4,
            details: vec![
                "Viral load measurement".to_string(),
                "ART adherence counselling".to_string(),
            ],
        },
    )];

    let fifth = antenatal_visit(
        "Fifth Antenatal Contact",
        32,
        &[
            "Blood pressure and weight check",
            "Fetal growth and position assessment",
        ],
    );

    let mut sixth = antenatal_visit(
        "Sixth Antenatal Contact",
        36,
        &[
            "Blood pressure and weight check",
            "Confirm fetal presentation",
            "Discuss labour signs and birth plan",
        ],
    );
    sixth.enhancements = vec![enhancement(
        ConditionFlag::PriorComplications,
        &["Delivery mode review with obstetric clinician"],
    )];

    let seventh = antenatal_visit(
        "Seventh Antenatal Contact",
        38,
        &["Blood pressure check", "Confirm facility delivery arrangements"],
    );

    let eighth = antenatal_visit(
        "Eighth Antenatal Contact",
        40,
        &["Blood pressure check", "Assess for onset of labour", "Plan for post-term review"],
    );

    let first_postnatal = postnatal_visit(
        "First Postnatal Check",
        3,
        &[
            "Assess maternal bleeding and vital signs",
            "Newborn feeding and cord care check",
        ],
    );

    let second_postnatal = postnatal_visit(
        "Second Postnatal Check",
        7,
        &[
            "Maternal recovery assessment",
            "Newborn weight check",
            "Breastfeeding support",
        ],
    );

    let mut final_postnatal = postnatal_visit(
        "Final Postnatal Check",
        42,
        &[
            "Full maternal recovery review",
            "Family planning counselling",
            "Newborn immunisation review",
        ],
    );
    final_postnatal.enhancements = vec![enhancement(
        ConditionFlag::ElevatedMentalHealthScore,
        &["Postpartum depression screening"],
    )];

    vec![
        booking,
        second,
        third,
        fourth,
        fifth,
        sixth,
        seventh,
        eighth,
        first_postnatal,
        second_postnatal,
        final_postnatal,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_builds_and_orders_by_threshold() {
        let catalog = VisitCatalog::standard().unwrap();

        let weeks: Vec<u32> = catalog
            .track(VisitTrack::Antenatal)
            .iter()
            .map(|v| match v.due_rule {
                DueRule::GestationalWeek(week) => week,
                DueRule::DaysAfterBirth(_) => unreachable!(),
            })
            .collect();

        let mut sorted = weeks.clone();
        sorted.sort_unstable();
        assert_eq!(weeks, sorted);
        assert!(weeks.contains(&12) && weeks.contains(&28));
    }

    #[test]
    fn dangling_anchor_is_rejected_at_build() {
        let mut visit = antenatal_visit("Only Visit", 16, &["Check"]);
        visit.supplemental = vec![(
            ConditionFlag::Hypertension,
            SupplementalRule {
                title: "Orphan Series".to_string(),
                anchor_title: "No Such Visit".to_string(),
                offset_weeks: 2,
                frequency_weeks: 2,
                details: vec![],
            },
        )];

        let err = VisitCatalog::build(vec![visit]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DanglingAnchor {
                rule: "Orphan Series".to_string(),
                anchor: "No Such Visit".to_string(),
            }
        );
    }

    #[test]
    fn duplicate_titles_within_a_track_are_rejected() {
        let visits = vec![
            antenatal_visit("Repeat Visit", 12, &["a"]),
            antenatal_visit("Repeat Visit", 16, &["b"]),
        ];
        let err = VisitCatalog::build(visits).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateTitle("Repeat Visit".to_string(), VisitTrack::Antenatal)
        );
    }

    #[test]
    fn rule_starting_past_term_is_rejected() {
        let mut visit = antenatal_visit("Late Visit", 38, &["Check"]);
        visit.supplemental = vec![(
            ConditionFlag::Diabetes,
            SupplementalRule {
                title: "Too Late Series".to_string(),
                anchor_title: "Late Visit".to_string(),
                offset_weeks: 4,
                frequency_weeks: 1,
                details: vec![],
            },
        )];

        let err = VisitCatalog::build(vec![visit]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::StartsPastTerm {
                rule: "Too Late Series".to_string(),
                week: 42,
            }
        );
    }

    #[test]
    fn zero_cadence_rules_are_rejected() {
        let mut visit = antenatal_visit("Base Visit", 16, &["Check"]);
        visit.supplemental = vec![(
            ConditionFlag::Hypertension,
            SupplementalRule {
                title: "Static Series".to_string(),
                anchor_title: "Base Visit".to_string(),
                offset_weeks: 2,
                frequency_weeks: 0,
                details: vec![],
            },
        )];

        let err = VisitCatalog::build(vec![visit]).unwrap_err();
        assert_eq!(err, CatalogError::ZeroFrequency("Static Series".to_string()));
    }

    #[test]
    fn anchor_week_resolves_for_bundled_rules() {
        let catalog = VisitCatalog::standard().unwrap();
        let second = catalog
            .find(VisitTrack::Antenatal, "Second Antenatal Contact")
            .unwrap();
        let rule = second
            .supplemental_for(ConditionFlag::Hypertension)
            .unwrap();

        assert_eq!(catalog.anchor_week(rule), Some(16));
    }
}

//! Canvas field catalogue and the typed contract the model must produce.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Field Keys
// =============================================================================

/// One section of a business canvas.
///
/// The serialized form is the display name used on the wire and inside
/// prompts (`"Problem Statement"`); snake_case spellings are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldKey {
    #[serde(rename = "Title", alias = "title")]
    Title,
    #[serde(rename = "Problem Statement", alias = "problem_statement")]
    ProblemStatement,
    #[serde(rename = "Objectives", alias = "objectives")]
    Objectives,
    #[serde(rename = "KPIs", alias = "kpis")]
    Kpis,
    #[serde(rename = "Success Criteria", alias = "success_criteria")]
    SuccessCriteria,
    #[serde(rename = "Key Features", alias = "key_features")]
    KeyFeatures,
    #[serde(rename = "Risks", alias = "risks")]
    Risks,
    #[serde(rename = "Assumptions", alias = "assumptions")]
    Assumptions,
    #[serde(
        rename = "Non Functional Requirements",
        alias = "non_functional_requirements"
    )]
    NonFunctionalRequirements,
    #[serde(rename = "Use Cases", alias = "use_cases")]
    UseCases,
    #[serde(rename = "Governance", alias = "governance")]
    Governance,
    #[serde(rename = "Relevant Facts", alias = "relevant_facts")]
    RelevantFacts,
}

/// How a field is laid out when a canvas is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderKind {
    Heading,
    Paragraph,
    Bullets,
    Table,
    Object,
}

impl FieldKey {
    /// Every field in canvas order.
    pub const ALL: [FieldKey; 12] = [
        FieldKey::Title,
        FieldKey::ProblemStatement,
        FieldKey::Objectives,
        FieldKey::Kpis,
        FieldKey::SuccessCriteria,
        FieldKey::KeyFeatures,
        FieldKey::Risks,
        FieldKey::Assumptions,
        FieldKey::NonFunctionalRequirements,
        FieldKey::UseCases,
        FieldKey::Governance,
        FieldKey::RelevantFacts,
    ];

    /// Fields a generated canvas is expected to contain.
    pub const REQUIRED: [FieldKey; 11] = [
        FieldKey::Title,
        FieldKey::ProblemStatement,
        FieldKey::Objectives,
        FieldKey::Kpis,
        FieldKey::SuccessCriteria,
        FieldKey::KeyFeatures,
        FieldKey::Risks,
        FieldKey::Assumptions,
        FieldKey::NonFunctionalRequirements,
        FieldKey::UseCases,
        FieldKey::Governance,
    ];

    /// Display / wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Title => "Title",
            FieldKey::ProblemStatement => "Problem Statement",
            FieldKey::Objectives => "Objectives",
            FieldKey::Kpis => "KPIs",
            FieldKey::SuccessCriteria => "Success Criteria",
            FieldKey::KeyFeatures => "Key Features",
            FieldKey::Risks => "Risks",
            FieldKey::Assumptions => "Assumptions",
            FieldKey::NonFunctionalRequirements => "Non Functional Requirements",
            FieldKey::UseCases => "Use Cases",
            FieldKey::Governance => "Governance",
            FieldKey::RelevantFacts => "Relevant Facts",
        }
    }

    /// Title and problem statement can never be switched off.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, FieldKey::Title | FieldKey::ProblemStatement)
    }

    pub fn render_kind(&self) -> RenderKind {
        match self {
            FieldKey::Title => RenderKind::Heading,
            FieldKey::ProblemStatement => RenderKind::Paragraph,
            FieldKey::Objectives
            | FieldKey::SuccessCriteria
            | FieldKey::Assumptions
            | FieldKey::RelevantFacts => RenderKind::Bullets,
            FieldKey::Kpis
            | FieldKey::KeyFeatures
            | FieldKey::Risks
            | FieldKey::NonFunctionalRequirements
            | FieldKey::UseCases => RenderKind::Table,
            FieldKey::Governance => RenderKind::Object,
        }
    }

    /// Whether the field holds an array.
    pub fn is_list(&self) -> bool {
        !matches!(
            self,
            FieldKey::Title | FieldKey::ProblemStatement | FieldKey::Governance
        )
    }

    /// Check that `value` has the shape this field expects.
    pub fn check_value(&self, value: &Value) -> Result<(), String> {
        match self {
            FieldKey::Title | FieldKey::ProblemStatement => check::<String>(value),
            FieldKey::Objectives | FieldKey::Assumptions | FieldKey::RelevantFacts => {
                check::<Vec<String>>(value)
            }
            FieldKey::Kpis => check::<Vec<Kpi>>(value),
            FieldKey::SuccessCriteria => check::<Vec<SuccessCriterion>>(value),
            FieldKey::KeyFeatures => check::<Vec<KeyFeature>>(value),
            FieldKey::Risks => check::<Vec<Risk>>(value),
            FieldKey::NonFunctionalRequirements => {
                #[derive(Deserialize)]
                #[allow(dead_code)]
                struct Wrapper(#[serde(deserialize_with = "nfr_list")] Vec<NonFunctionalRequirement>);
                check::<Wrapper>(value)
            }
            FieldKey::UseCases => check::<Vec<UseCase>>(value),
            FieldKey::Governance => check::<BTreeMap<String, Value>>(value),
        }
        .map_err(|err| format!("'{}' has an invalid value: {}", self.as_str(), err))
    }
}

fn check<T: DeserializeOwned>(value: &Value) -> Result<(), serde_json::Error> {
    T::deserialize(value).map(|_| ())
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        FieldKey::ALL
            .into_iter()
            .find(|key| normalize(key.as_str()) == wanted)
            .ok_or_else(|| format!("Unknown canvas field: {}", s))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// =============================================================================
// Typed Canvas Contract
// =============================================================================

/// Key performance indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Kpi {
    pub metric: String,
    /// Current value; "Baseline TBD" when unknown.
    #[serde(default)]
    pub baseline: String,
    pub target: String,
    pub measurement_frequency: String,
}

/// A success criterion, either a plain statement or a measured target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SuccessCriterion {
    Measured {
        metric: String,
        target: String,
        #[serde(default)]
        measurement: String,
    },
    Statement(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeyFeature {
    pub feature: String,
    pub description: String,
    /// MoSCoW bucket ("Must Have", "Should Have", "Could Have").
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Risk {
    pub risk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<String>,
    pub mitigation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NonFunctionalRequirement {
    pub category: String,
    pub requirement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UseCase {
    pub use_case: String,
    pub actor: String,
    #[serde(default)]
    pub goal: String,
    #[serde(alias = "scenario")]
    pub description: String,
}

/// Sources and confidence the model attached to one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldEvidence {
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// The business canvas as produced by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CanvasFields {
    /// Concise, descriptive title (max 100 characters).
    #[serde(rename = "Title", alias = "title")]
    pub title: String,
    /// The core business problem in 2-4 sentences.
    #[serde(rename = "Problem Statement", alias = "problem_statement")]
    pub problem_statement: String,
    #[serde(rename = "Objectives", alias = "objectives", default)]
    pub objectives: Vec<String>,
    #[serde(rename = "KPIs", alias = "kpis", default)]
    pub kpis: Vec<Kpi>,
    #[serde(rename = "Success Criteria", alias = "success_criteria", default)]
    pub success_criteria: Vec<SuccessCriterion>,
    #[serde(rename = "Key Features", alias = "key_features", default)]
    pub key_features: Vec<KeyFeature>,
    #[serde(rename = "Risks", alias = "risks", default)]
    pub risks: Vec<Risk>,
    #[serde(rename = "Assumptions", alias = "assumptions", default)]
    pub assumptions: Vec<String>,
    #[serde(
        rename = "Non Functional Requirements",
        alias = "non_functional_requirements",
        default,
        deserialize_with = "nfr_list"
    )]
    pub non_functional_requirements: Vec<NonFunctionalRequirement>,
    #[serde(rename = "Use Cases", alias = "use_cases", default)]
    pub use_cases: Vec<UseCase>,
    #[serde(
        rename = "Governance",
        alias = "governance",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub governance: Option<BTreeMap<String, Value>>,
    #[serde(
        rename = "Relevant Facts",
        alias = "relevant_facts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relevant_facts: Option<Vec<String>>,
    /// Per-field sources and confidence, keyed by field name.
    #[serde(
        rename = "Field Evidence",
        alias = "field_evidence",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub field_evidence: BTreeMap<String, FieldEvidence>,
}

impl CanvasFields {
    /// Decode a model-produced canvas object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Value of a single field, `None` when the field is absent.
    pub fn value_of(&self, key: FieldKey) -> Option<Value> {
        let value = match key {
            FieldKey::Title => serde_json::to_value(&self.title),
            FieldKey::ProblemStatement => serde_json::to_value(&self.problem_statement),
            FieldKey::Objectives => serde_json::to_value(&self.objectives),
            FieldKey::Kpis => serde_json::to_value(&self.kpis),
            FieldKey::SuccessCriteria => serde_json::to_value(&self.success_criteria),
            FieldKey::KeyFeatures => serde_json::to_value(&self.key_features),
            FieldKey::Risks => serde_json::to_value(&self.risks),
            FieldKey::Assumptions => serde_json::to_value(&self.assumptions),
            FieldKey::NonFunctionalRequirements => {
                serde_json::to_value(&self.non_functional_requirements)
            }
            FieldKey::UseCases => serde_json::to_value(&self.use_cases),
            FieldKey::Governance => {
                return self
                    .governance
                    .as_ref()
                    .and_then(|g| serde_json::to_value(g).ok())
            }
            FieldKey::RelevantFacts => {
                return self
                    .relevant_facts
                    .as_ref()
                    .and_then(|f| serde_json::to_value(f).ok())
            }
        };
        value.ok()
    }

    /// Evidence recorded for `key`, matched leniently on the field name.
    pub fn evidence_for(&self, key: FieldKey) -> Option<&FieldEvidence> {
        self.field_evidence
            .iter()
            .find(|(name, _)| name.parse::<FieldKey>().ok() == Some(key))
            .map(|(_, evidence)| evidence)
    }
}

/// Accept both the flat `[{category, requirement}]` list and the grouped
/// `{ "Performance & Scalability": ["..."] }` layout some prompts produce.
fn nfr_list<'de, D>(deserializer: D) -> Result<Vec<NonFunctionalRequirement>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Flat(Vec<NonFunctionalRequirement>),
        Grouped(BTreeMap<String, Vec<String>>),
    }

    Ok(match Shape::deserialize(deserializer)? {
        Shape::Flat(list) => list,
        Shape::Grouped(groups) => groups
            .into_iter()
            .flat_map(|(category, requirements)| {
                requirements
                    .into_iter()
                    .map(move |requirement| NonFunctionalRequirement {
                        category: category.clone(),
                        requirement,
                    })
            })
            .collect(),
    })
}

// =============================================================================
// Structure Validation
// =============================================================================

/// Basic structural checks on a raw canvas object.
///
/// Returns every problem found; an empty list means the canvas is well formed.
pub fn validate_canvas_structure(canvas: &Value) -> Vec<String> {
    let Some(object) = canvas.as_object() else {
        return vec!["Canvas must be a JSON object".to_string()];
    };

    let mut errors = Vec::new();

    for key in FieldKey::REQUIRED {
        if !object.contains_key(key.as_str()) {
            errors.push(format!("Missing required field: '{}'", key));
        }
    }

    for key in [FieldKey::Title, FieldKey::ProblemStatement] {
        if object.get(key.as_str()).is_some_and(|v| !v.is_string()) {
            errors.push(format!("'{}' must be a string", key));
        }
    }

    for key in FieldKey::REQUIRED.into_iter().filter(FieldKey::is_list) {
        let Some(value) = object.get(key.as_str()) else {
            continue;
        };
        // Grouped NFRs are normalized on decode.
        let grouped_nfr = key == FieldKey::NonFunctionalRequirements && value.is_object();
        if !value.is_array() && !grouped_nfr {
            errors.push(format!("'{}' must be an array", key));
        }
    }

    if object
        .get(FieldKey::Governance.as_str())
        .is_some_and(|v| !v.is_object())
    {
        errors.push("'Governance' must be an object".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_canvas() -> Value {
        json!({
            "Title": "Claims Triage Copilot",
            "Problem Statement": "Adjusters spend 40% of their time on manual triage.",
            "Objectives": ["Reduce triage time by 50% within two quarters"],
            "KPIs": [{
                "metric": "Average triage time",
                "baseline": "45 min",
                "target": "20 min",
                "measurement_frequency": "Weekly"
            }],
            "Success Criteria": [
                {"metric": "Triage time", "target": "< 20 min", "measurement": "Median per claim"},
                "Adjuster satisfaction above 4/5"
            ],
            "Key Features": [{"feature": "Auto routing", "description": "Route claims", "priority": "Must Have"}],
            "Risks": [{"risk": "Model drift", "impact": "High", "probability": "Medium", "mitigation": "Monitor"}],
            "Assumptions": ["Historical claims are labelled"],
            "Non Functional Requirements": [{"category": "Performance", "requirement": "p95 < 2s"}],
            "Use Cases": [{"use_case": "Route claim", "actor": "Adjuster", "goal": "Faster routing", "scenario": "Open queue"}],
            "Governance": {"owner": "Claims Ops"}
        })
    }

    #[test]
    fn well_formed_canvas_has_no_structure_errors() {
        assert!(validate_canvas_structure(&sample_canvas()).is_empty());
    }

    #[test]
    fn structure_validation_reports_missing_and_mistyped_fields() {
        let errors = validate_canvas_structure(&json!({
            "Title": 42,
            "Objectives": "not a list",
            "Governance": []
        }));

        assert!(errors.contains(&"Missing required field: 'Problem Statement'".to_string()));
        assert!(errors.contains(&"'Title' must be a string".to_string()));
        assert!(errors.contains(&"'Objectives' must be an array".to_string()));
        assert!(errors.contains(&"'Governance' must be an object".to_string()));
    }

    #[test]
    fn decodes_model_output_with_aliases_and_mixed_shapes() {
        let fields = CanvasFields::from_value(sample_canvas()).unwrap();
        assert_eq!(fields.title, "Claims Triage Copilot");
        assert_eq!(fields.success_criteria.len(), 2);
        assert!(matches!(
            fields.success_criteria[1],
            SuccessCriterion::Statement(_)
        ));
        assert_eq!(fields.use_cases[0].description, "Open queue");

        let snake = CanvasFields::from_value(json!({
            "title": "T",
            "problem_statement": "P",
            "non_functional_requirements": {
                "Reliability": ["99.9% uptime", "Daily backups"]
            }
        }))
        .unwrap();
        assert_eq!(snake.non_functional_requirements.len(), 2);
        assert_eq!(snake.non_functional_requirements[0].category, "Reliability");
    }

    #[test]
    fn field_keys_parse_from_display_and_snake_case() {
        assert_eq!("Problem Statement".parse::<FieldKey>(), Ok(FieldKey::ProblemStatement));
        assert_eq!("use_cases".parse::<FieldKey>(), Ok(FieldKey::UseCases));
        assert_eq!("kpis".parse::<FieldKey>(), Ok(FieldKey::Kpis));
        assert!("Stakeholders".parse::<FieldKey>().is_err());
    }

    #[test]
    fn check_value_rejects_wrong_shapes() {
        assert!(FieldKey::Title.check_value(&json!("A title")).is_ok());
        assert!(FieldKey::Kpis.check_value(&json!([{"metric": "m"}])).is_err());
        assert!(FieldKey::Objectives.check_value(&json!(["a", "b"])).is_ok());
        assert!(FieldKey::Governance.check_value(&json!("x")).is_err());
    }

    #[test]
    fn evidence_lookup_is_lenient_on_names() {
        let mut fields = CanvasFields::default();
        fields.field_evidence.insert(
            "problem_statement".into(),
            FieldEvidence {
                evidence: vec!["report.pdf p.3".into()],
                confidence: Some(0.8),
            },
        );
        assert!(fields.evidence_for(FieldKey::ProblemStatement).is_some());
        assert!(fields.evidence_for(FieldKey::Title).is_none());
    }
}

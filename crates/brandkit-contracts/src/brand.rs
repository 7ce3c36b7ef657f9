use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text::{coerce_text_list, normalize_hex_color, value_as_clean_text};

pub const FALLBACK_BRAND_NAME: &str = "Your Brand";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandIdentity {
    pub brand_name: String,
    pub industry: String,
    pub palette: Vec<String>,
    pub style: String,
    pub tone: String,
    pub target_audience: String,
    pub keywords: Vec<String>,
    pub summary: String,
}

impl BrandIdentity {
    /// Canned identity used when the image cannot be analyzed.
    pub fn fallback() -> Self {
        Self {
            brand_name: FALLBACK_BRAND_NAME.to_string(),
            industry: "lifestyle".to_string(),
            palette: vec![
                "#1F2937".to_string(),
                "#F59E0B".to_string(),
                "#F9FAFB".to_string(),
            ],
            style: "clean modern minimalism".to_string(),
            tone: "confident and friendly".to_string(),
            target_audience: "young professionals".to_string(),
            keywords: vec![
                "quality".to_string(),
                "modern".to_string(),
                "trusted".to_string(),
            ],
            summary: "A modern brand with a clean, confident visual identity.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandAnalysis {
    pub identity: BrandIdentity,
    pub source: AnalysisSource,
    pub model: Option<String>,
    pub warning: Option<String>,
}

impl BrandAnalysis {
    pub fn from_model(identity: BrandIdentity, model: impl Into<String>) -> Self {
        Self {
            identity,
            source: AnalysisSource::Model,
            model: Some(model.into()),
            warning: None,
        }
    }

    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            identity: BrandIdentity::fallback(),
            source: AnalysisSource::Fallback,
            model: None,
            warning: Some(reason.into()),
        }
    }

    pub fn used_fallback(&self) -> bool {
        self.source == AnalysisSource::Fallback
    }
}

pub fn brand_analysis_instruction() -> &'static str {
    "You are a senior brand strategist. Study the attached brand image (logo, product shot, or marketing visual) and infer the brand identity behind it.\nRespond with JSON only (no markdown):\n{\n  \"brand_name\": \"name if visible or a fitting placeholder\",\n  \"industry\": \"short industry label\",\n  \"palette\": [\"#RRGGBB\", \"...\"],\n  \"style\": \"short visual style phrase\",\n  \"tone\": \"short voice/tone phrase\",\n  \"target_audience\": \"short audience description\",\n  \"keywords\": [\"3-6 single-word brand values\"],\n  \"summary\": \"one sentence brand positioning\"\n}\nRules: 3-6 palette entries taken from the dominant colors. Keep every phrase under 8 words. Summary must be <= 24 words."
}

/// Normalizes a model payload into an identity. Fields the model omitted are
/// taken from the fallback; a payload without a single usable field is
/// rejected.
pub fn parse_brand_payload(payload: &Map<String, Value>) -> Option<BrandIdentity> {
    let fallback = BrandIdentity::fallback();
    let mut recognized = 0usize;
    let mut text_field = |keys: &[&str], max_chars: usize, default: &str| -> String {
        for key in keys {
            if let Some(value) = value_as_clean_text(payload.get(*key), max_chars) {
                recognized += 1;
                return value;
            }
        }
        default.to_string()
    };

    let brand_name = text_field(&["brand_name", "brandName", "name"], 60, &fallback.brand_name);
    let industry = text_field(&["industry", "category"], 60, &fallback.industry);
    let style = text_field(&["style", "visual_style", "visualStyle"], 80, &fallback.style);
    let tone = text_field(&["tone", "voice", "brand_voice"], 80, &fallback.tone);
    let target_audience = text_field(
        &["target_audience", "targetAudience", "audience"],
        100,
        &fallback.target_audience,
    );
    let summary = text_field(&["summary", "positioning"], 200, &fallback.summary);

    let mut palette = Vec::new();
    let palette_source = payload
        .get("palette")
        .or_else(|| payload.get("colors"))
        .or_else(|| payload.get("brand_colors"));
    for row in coerce_text_list(palette_source, 12, 16) {
        if let Some(code) = normalize_hex_color(&row) {
            if !palette.contains(&code) {
                palette.push(code);
            }
        }
        if palette.len() >= 6 {
            break;
        }
    }
    if palette.is_empty() {
        palette = fallback.palette.clone();
    } else {
        recognized += 1;
    }

    let mut keywords = coerce_text_list(
        payload.get("keywords").or_else(|| payload.get("values")),
        6,
        32,
    );
    if keywords.is_empty() {
        keywords = fallback.keywords.clone();
    } else {
        recognized += 1;
    }

    if recognized == 0 {
        return None;
    }
    Some(BrandIdentity {
        brand_name,
        industry,
        palette,
        style,
        tone,
        target_audience,
        keywords,
        summary,
    })
}

use crate::aspect::{AspectRatio, ImageSlot};
use crate::assets::copy_instruction_schema;
use crate::brand::BrandIdentity;

const COMPOSITION_CUES: [&str; 4] = [
    "hero product shot with generous negative space for headline text",
    "lifestyle scene showing the product in everyday use",
    "bold graphic layout built from the brand palette",
    "close-up detail shot highlighting texture and craft",
];

fn brand_context(identity: &BrandIdentity) -> String {
    let palette = if identity.palette.is_empty() {
        "neutral tones".to_string()
    } else {
        identity.palette.join(", ")
    };
    format!(
        "Brand: {}. Industry: {}. Visual style: {}. Tone: {}. Audience: {}. Palette: {}. Values: {}.",
        identity.brand_name,
        identity.industry,
        identity.style,
        identity.tone,
        identity.target_audience,
        palette,
        identity.keywords.join(", ")
    )
}

pub fn composition_cue(variant: u32) -> &'static str {
    let idx = (variant.max(1) as usize - 1) % COMPOSITION_CUES.len();
    COMPOSITION_CUES[idx]
}

pub fn image_prompt(identity: &BrandIdentity, slot: &ImageSlot) -> String {
    format!(
        "Create a polished marketing image for a {placement} ({ratio}). {context} Composition: {cue}. Use the palette faithfully, keep the look on-brand and photorealistic, and do not render any text or logos.",
        placement = slot.aspect_ratio.placement(),
        ratio = slot.aspect_ratio,
        context = brand_context(identity),
        cue = composition_cue(slot.variant),
    )
}

pub fn video_prompt(identity: &BrandIdentity, aspect_ratio: AspectRatio) -> String {
    format!(
        "Create a short 5-8 second promotional video clip framed for a {placement} ({ratio}). {context} Smooth cinematic camera motion, soft lighting that matches the palette, ending on a calm product beauty shot. No on-screen text.",
        placement = aspect_ratio.placement(),
        ratio = aspect_ratio,
        context = brand_context(identity),
    )
}

pub fn copy_prompt(identity: &BrandIdentity, ratios: &[AspectRatio]) -> String {
    let formats = if ratios.is_empty() {
        "social feed".to_string()
    } else {
        ratios
            .iter()
            .map(|ratio| format!("{} ({ratio})", ratio.placement()))
            .collect::<Vec<String>>()
            .join(", ")
    };
    format!(
        "Write ad copy for a campaign that runs as: {formats}. {context} Match the brand tone exactly and speak directly to the audience.\n{schema}",
        context = brand_context(identity),
        schema = copy_instruction_schema(),
    )
}

#[cfg(test)]
mod tests {
    use crate::aspect::{AspectPlan, AspectRatio};
    use crate::brand::BrandIdentity;

    use super::{composition_cue, copy_prompt, image_prompt, video_prompt};

    #[test]
    fn image_prompts_embed_brand_and_ratio_and_vary_by_variant() {
        let identity = BrandIdentity::fallback();
        let slots = AspectPlan::default().fan_out();
        let first = image_prompt(&identity, &slots[0]);
        let second = image_prompt(&identity, &slots[1]);
        assert!(first.contains("Your Brand"));
        assert!(first.contains("(1:1)"));
        assert!(first.contains("#F59E0B"));
        assert_ne!(first, second);
        assert!(image_prompt(&identity, &slots[3]).contains("(16:9)"));
    }

    #[test]
    fn composition_cues_cycle() {
        assert_eq!(composition_cue(1), composition_cue(5));
        assert_eq!(composition_cue(0), composition_cue(1));
        assert_ne!(composition_cue(1), composition_cue(2));
    }

    #[test]
    fn video_and_copy_prompts_mention_formats() {
        let identity = BrandIdentity::fallback();
        assert!(video_prompt(&identity, AspectRatio::Story).contains("(9:16)"));
        let copy = copy_prompt(&identity, &[AspectRatio::Square, AspectRatio::Story]);
        assert!(copy.contains("square social feed post (1:1)"));
        assert!(copy.contains("\"headline\""));
        assert!(copy_prompt(&identity, &[]).contains("social feed"));
    }
}

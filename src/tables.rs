// Static lookup tables used to enrich backend labels for display

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const PLACEHOLDER_CROP_IMAGE: &str = "/static/crops/placeholder.jpg";

pub struct CropInfo {
    pub image: String,
    pub description: &'static str,
}

// Labels produced by the crop model, lowercased
const CROP_DESCRIPTIONS: &[(&str, &str)] = &[
    ("rice", "Thrives in warm, humid conditions with standing water; suited to clayey or loamy soils that hold moisture."),
    ("maize", "Warm-season cereal that prefers well-drained loamy soil, moderate rainfall and plenty of nitrogen."),
    ("chickpea", "Cool-season legume tolerant of dry spells; fixes nitrogen and does well on light, well-drained soils."),
    ("kidneybeans", "Legume that needs mild temperatures and well-drained soil; sensitive to waterlogging."),
    ("pigeonpeas", "Drought-tolerant pulse with a deep root system, well suited to semi-arid regions."),
    ("mothbeans", "Hardy pulse for hot, arid areas with sandy soils and scanty rainfall."),
    ("mungbean", "Short-duration pulse that grows in warm weather and improves soil nitrogen."),
    ("blackgram", "Warm-season pulse tolerant of heavier soils; good as a catch crop between cereals."),
    ("lentil", "Cool-season pulse for the rabi season; prefers neutral soils and little irrigation."),
    ("pomegranate", "Fruit crop for semi-arid climates; tolerates drought and slightly alkaline soil."),
    ("banana", "Needs high humidity, warmth and regular water; responds well to potassium."),
    ("mango", "Tropical fruit tree that prefers a dry spell before flowering and deep, well-drained soil."),
    ("grapes", "Vine crop for warm, dry climates; needs good drainage and careful pruning."),
    ("watermelon", "Warm-season vine that prefers sandy loam and plenty of sunshine."),
    ("muskmelon", "Warm-season vine for light soils; dry weather at ripening improves sweetness."),
    ("apple", "Temperate fruit needing winter chill hours and well-drained, slightly acidic soil."),
    ("orange", "Citrus crop for subtropical climates; sensitive to waterlogging."),
    ("papaya", "Fast-growing tropical fruit that needs warmth, drainage and protection from frost."),
    ("coconut", "Coastal palm that likes high humidity, sandy soils and evenly spread rainfall."),
    ("cotton", "Fibre crop for black soils with a long frost-free season and moderate rainfall."),
    ("jute", "Fibre crop for hot, humid regions with alluvial soil and heavy rainfall."),
    ("coffee", "Shade-loving plantation crop for cool highlands with well-drained, acidic soil."),
];

static CROP_TABLE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| CROP_DESCRIPTIONS.iter().copied().collect());

/// Looks up a crop label (case-insensitive). Unknown labels get the placeholder image and no description.
pub fn crop_info(label: &str) -> CropInfo {
    let key = label.trim().to_lowercase();
    match CROP_TABLE.get(key.as_str()) {
        Some(description) => CropInfo {
            image: format!("/static/crops/{}.jpg", key),
            description,
        },
        None => CropInfo {
            image: PLACEHOLDER_CROP_IMAGE.to_string(),
            description: "",
        },
    }
}

pub struct FertilizerInfo {
    pub name: &'static str,
    pub image: &'static str,
    pub description: &'static str,
    pub tips: &'static str,
}

pub const FERTILIZERS: &[FertilizerInfo] = &[
    FertilizerInfo { name: "10-26-26", image: "/static/fertilizers/10-26-26.jpg", description: "High phosphorus and potassium mix for flowering and fruiting stages.", tips: "Apply before flowering. Not suitable for early vegetative stages." },
    FertilizerInfo { name: "10-10-10", image: "/static/fertilizers/10-10-10.jpg", description: "Balanced NPK fertilizer suitable for general crop use.", tips: "Great for gardens and lawns. Apply during early stages of plant growth." },
    FertilizerInfo { name: "14-14-14", image: "/static/fertilizers/14-14-14.jpg", description: "Uniform nutrient blend for general purpose use.", tips: "Apply monthly. Water the soil after application." },
    FertilizerInfo { name: "14-35-14", image: "/static/fertilizers/14-35-14.jpg", description: "Promotes blooming and root development.", tips: "Apply before flowering for best results." },
    FertilizerInfo { name: "15-15-15", image: "/static/fertilizers/15-15-15.jpg", description: "Triple mix for balanced crop development.", tips: "Spread evenly and water the plant base after use." },
    FertilizerInfo { name: "17-17-17", image: "/static/fertilizers/17-17-17.jpg", description: "High strength fertilizer for cereals and legumes.", tips: "Use during vegetative stages. Avoid overuse." },
    FertilizerInfo { name: "20-20", image: "/static/fertilizers/20-20.jpg", description: "High nitrogen and phosphorus for strong early growth.", tips: "Apply in moist soil. Avoid excessive use." },
    FertilizerInfo { name: "28-28", image: "/static/fertilizers/28-28.jpg", description: "Strong NPK mix for rapid plant development.", tips: "Good for fast-growing plants. Use with caution." },
    FertilizerInfo { name: "DAP", image: "/static/fertilizers/dap.jpg", description: "Diammonium phosphate, rich in phosphorus.", tips: "Best used at planting time. Do not mix with urea in storage." },
    FertilizerInfo { name: "Potassium chloride", image: "/static/fertilizers/potassium-chloride.jpg", description: "Potassium source improving drought resistance.", tips: "Avoid use on chloride-sensitive crops like potatoes." },
    FertilizerInfo { name: "Potassium sulfate", image: "/static/fertilizers/potassium-sulfate.jpg", description: "Chlorine-free potassium, ideal for sensitive crops.", tips: "Use on fruits, vegetables, and high-value crops." },
    FertilizerInfo { name: "Superphosphate", image: "/static/fertilizers/superphosphate.jpg", description: "Enriches soil with phosphorus and calcium.", tips: "Apply during soil preparation. Mix well into soil." },
    FertilizerInfo { name: "TSP", image: "/static/fertilizers/tsp.jpg", description: "Triple super phosphate for phosphorus-deficient soils.", tips: "Apply in furrows near the seed. Do not mix with alkaline substances." },
    FertilizerInfo { name: "Urea", image: "/static/fertilizers/urea.jpg", description: "High nitrogen fertilizer for leafy crops.", tips: "Use in moist soil. Split dosage for best results." },
];

pub const PLACEHOLDER_FERTILIZER_IMAGE: &str = "/static/fertilizers/placeholder.jpg";

pub fn fertilizer_info(name: &str) -> Option<&'static FertilizerInfo> {
    FERTILIZERS.iter().find(|f| f.name.eq_ignore_ascii_case(name.trim()))
}

// Label encodings the fertilizer model was trained with (alphabetical order)
pub const SOIL_TYPES: &[&str] = &["Black", "Clayey", "Loamy", "Red", "Sandy"];
pub const FERTILIZER_CROP_TYPES: &[&str] = &[
    "Barley", "Cotton", "Ground Nuts", "Maize", "Millets", "Oil seeds", "Paddy", "Pulses", "Sugarcane", "Tobacco", "Wheat",
];

pub fn label_code(table: &[&str], label: &str) -> Option<u8> {
    table.iter().position(|l| *l == label).map(|i| i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_lookup_is_case_insensitive() {
        let info = crop_info("Rice");
        assert_eq!(info.image, "/static/crops/rice.jpg");
        assert!(!info.description.is_empty());
    }

    #[test]
    fn unknown_crop_falls_back_to_placeholder() {
        let info = crop_info("Quinoa");
        assert_eq!(info.image, PLACEHOLDER_CROP_IMAGE);
        assert_eq!(info.description, "");
    }

    #[test]
    fn label_codes_follow_training_order() {
        assert_eq!(label_code(SOIL_TYPES, "Loamy"), Some(2));
        assert_eq!(label_code(FERTILIZER_CROP_TYPES, "Wheat"), Some(10));
        assert_eq!(label_code(FERTILIZER_CROP_TYPES, "Rice"), None);
    }

    #[test]
    fn every_crop_label_is_lowercase() {
        assert_eq!(CROP_DESCRIPTIONS.len(), 22);
        assert!(CROP_DESCRIPTIONS.iter().all(|(k, _)| *k == k.to_lowercase()));
    }
}

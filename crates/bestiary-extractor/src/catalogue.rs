//! Default schema and few-shot example for the animal catalogue

use crate::prompt::ContextFragment;
use serde_json::{json, Value};

/// Target schema: field name → description
pub fn default_schema() -> Value {
    json!({
        "category": "Tierkategorie (z.B. Affen, Raubtiere, ...)",
        "latin": "Wissenschaftlicher Name",
        "russian": "Russischer Name",
        "gender_russian": "Genus im Russischen (M oder F)",
        "gender_german": "Genus im Deutschen (M, F oder N)"
    })
}

/// Few-shot example showing a raw catalogue excerpt and the expected output
pub fn default_example() -> ContextFragment {
    ContextFragment::Example {
        input: concat!(
            "Affen\n",
            "Latein       Russisch                     M/F  Deutsch\n",
            "Cercopithecus cephus  Голуболицая мартышка   F    F\n",
            "Ateles fusciceps rufiventris  Буроголовая коата   F    M"
        )
        .to_string(),
        output: json!([{
            "category": "Affen",
            "latin": "Pan troglodytes",
            "german": "Schimpanse",
            "russian": "Обыкновенный шимпанзе",
            "gender_russian": "M",
            "gender_german": "M",
            "score": 0.95,
            "reason": "Schimpansen teilen etwa 98,8 % ihrer DNA mit dem Menschen, zeigen komplexe soziale Strukturen, Werkzeuggebrauch und kognitive Fähigkeiten.",
            "gender_reason": "Genusregel: Maskulin, da 'Schimpanse' im Deutschen maskulin ist."
        }]),
    }
}

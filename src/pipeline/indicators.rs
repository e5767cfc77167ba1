use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::units::canonical_unit;
use super::DictionaryError;
use crate::models::slugify;

/// One canonical lab indicator with its aliases and default reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDef {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_low: Option<f64>,
    #[serde(default)]
    pub reference_high: Option<f64>,
}

/// Case- and diacritic-insensitive lookup over names and aliases.
#[derive(Debug, Clone)]
pub struct IndicatorDictionary {
    entries: Vec<IndicatorDef>,
    index: HashMap<String, usize>,
}

type BuiltinRow = (&'static str, &'static str, &'static [&'static str], Option<&'static str>, Option<f64>, Option<f64>);

#[rustfmt::skip]
const BUILTIN: &[BuiltinRow] = &[
    // Complete blood count
    ("Hemoglobin", "hemoglobin", &["hb", "hgb", "haemoglobin", "хемоглобин"], Some("g/L"), Some(120.0), Some(160.0)),
    ("Hematocrit", "hematocrit", &["hct", "ht", "haematocrit", "хематокрит"], Some("L/L"), Some(0.36), Some(0.48)),
    ("Erythrocytes", "erythrocytes", &["rbc", "red blood cells", "еритроцити"], Some("×10^12/L"), Some(4.0), Some(5.5)),
    ("Leukocytes", "leukocytes", &["wbc", "white blood cells", "leucocytes", "левкоцити"], Some("×10^9/L"), Some(3.5), Some(10.5)),
    ("Platelets", "platelets", &["plt", "thrombocytes", "тромбоцити"], Some("×10^9/L"), Some(140.0), Some(440.0)),
    ("MCV", "mcv", &["mean corpuscular volume"], Some("fL"), Some(80.0), Some(100.0)),
    ("MCH", "mch", &["mean corpuscular hemoglobin"], Some("pg"), Some(27.0), Some(33.0)),
    ("MCHC", "mchc", &[], Some("g/L"), Some(320.0), Some(360.0)),
    ("RDW", "rdw", &["rdw-cv", "rdw cv"], Some("%"), Some(11.5), Some(14.5)),
    ("MPV", "mpv", &["mean platelet volume"], Some("fL"), Some(7.4), Some(10.4)),
    ("Neutrophils %", "neutrophils-pct", &["neu %", "neut %", "gran %", "неутрофили %", "сегментоядрени %"], Some("%"), Some(40.0), Some(75.0)),
    ("Lymphocytes %", "lymphocytes-pct", &["lym %", "lymph %", "лимфоцити %"], Some("%"), Some(20.0), Some(45.0)),
    ("Monocytes %", "monocytes-pct", &["mon %", "mono %", "моноцити %"], Some("%"), Some(2.0), Some(10.0)),
    ("Eosinophils %", "eosinophils-pct", &["eos %", "eo %", "еозинофили %"], Some("%"), Some(0.0), Some(6.0)),
    ("Basophils %", "basophils-pct", &["bas %", "baso %", "базофили %"], Some("%"), Some(0.0), Some(1.0)),
    ("Neutrophils", "neutrophils", &["neu #", "neu", "neutrophils #", "неутрофили", "неутрофили бр."], Some("×10^9/L"), Some(2.0), Some(7.0)),
    ("Lymphocytes", "lymphocytes", &["lym #", "lym", "lymphocytes #", "лимфоцити", "лимфоцити бр."], Some("×10^9/L"), Some(1.0), Some(3.5)),
    ("Monocytes", "monocytes", &["mon #", "mon", "monocytes #", "моноцити", "моноцити бр."], Some("×10^9/L"), Some(0.1), Some(0.9)),
    ("Eosinophils", "eosinophils", &["eos #", "eos", "eosinophils #", "еозинофили", "еозинофили бр."], Some("×10^9/L"), Some(0.0), Some(0.5)),
    ("Basophils", "basophils", &["bas #", "baso", "basophils #", "базофили", "базофили бр."], Some("×10^9/L"), Some(0.0), Some(0.1)),
    ("ESR", "esr", &["erythrocyte sedimentation rate", "суе", "утаяване"], Some("mm/h"), Some(0.0), Some(20.0)),
    // Chemistry
    ("Glucose", "glucose", &["glu", "blood glucose", "кръвна захар", "глюкоза"], Some("mmol/L"), Some(3.9), Some(6.1)),
    ("HbA1c", "hba1c", &["hb a1c", "glycated hemoglobin", "гликиран хемоглобин"], Some("%"), Some(4.0), Some(6.0)),
    ("Creatinine", "creatinine", &["crea", "creat", "креатинин"], Some("µmol/L"), Some(62.0), Some(106.0)),
    ("Urea", "urea", &["карбамид", "урея"], Some("mmol/L"), Some(2.5), Some(8.3)),
    ("Uric acid", "uric-acid", &["ua", "пикочна киселина"], Some("µmol/L"), Some(200.0), Some(420.0)),
    ("ALT", "alt", &["alat", "sgpt", "алат"], Some("U/L"), Some(0.0), Some(41.0)),
    ("AST", "ast", &["asat", "sgot", "асат"], Some("U/L"), Some(0.0), Some(40.0)),
    ("GGT", "ggt", &["gamma gt", "gamma-gt", "ггт"], Some("U/L"), Some(0.0), Some(60.0)),
    ("ALP", "alp", &["alkaline phosphatase", "алкална фосфатаза", "ап"], Some("U/L"), Some(40.0), Some(130.0)),
    ("Total bilirubin", "total-bilirubin", &["bilirubin total", "tbil", "t-bil", "общ билирубин"], Some("µmol/L"), Some(3.4), Some(20.5)),
    ("Total protein", "total-protein", &["общ белтък", "общ протеин"], Some("g/L"), Some(64.0), Some(83.0)),
    ("Albumin", "albumin", &["alb", "албумин"], Some("g/L"), Some(35.0), Some(52.0)),
    ("CRP", "crp", &["c-reactive protein", "hs-crp", "с-реактивен протеин", "срп"], Some("mg/L"), Some(0.0), Some(5.0)),
    ("Ferritin", "ferritin", &["феритин"], Some("µg/L"), Some(30.0), Some(400.0)),
    ("Iron", "iron", &["serum iron", "fe", "желязо", "серумно желязо"], Some("µmol/L"), Some(11.0), Some(28.0)),
    ("Vitamin D", "vitamin-d", &["25(oh)d", "vit d", "25-oh vitamin d", "витамин d"], Some("ng/mL"), Some(30.0), Some(100.0)),
    ("Vitamin B12", "vitamin-b12", &["b12", "cobalamin", "витамин b12"], Some("pmol/L"), Some(145.0), Some(569.0)),
    // Lipids
    ("Total cholesterol", "total-cholesterol", &["cholesterol", "chol", "total chol", "общ холестерол", "холестерол"], Some("mmol/L"), None, Some(5.2)),
    ("LDL cholesterol", "ldl-cholesterol", &["ldl", "ldl-c", "ldl холестерол"], Some("mmol/L"), None, Some(3.0)),
    ("HDL cholesterol", "hdl-cholesterol", &["hdl", "hdl-c", "hdl холестерол"], Some("mmol/L"), Some(1.0), None),
    ("Triglycerides", "triglycerides", &["tg", "trig", "триглицериди"], Some("mmol/L"), None, Some(1.7)),
    // Thyroid
    ("TSH", "tsh", &["тсх", "thyrotropin"], Some("mIU/L"), Some(0.4), Some(4.0)),
    ("FT4", "ft4", &["free t4", "ft-4", "свободен т4"], Some("pmol/L"), Some(12.0), Some(22.0)),
    ("FT3", "ft3", &["free t3", "ft-3", "свободен т3"], Some("pmol/L"), Some(3.1), Some(6.8)),
    // Coagulation
    ("INR", "inr", &[], None, Some(0.8), Some(1.2)),
    ("Prothrombin time", "prothrombin-time", &["pt", "протромбиново време"], Some("s"), Some(11.0), Some(13.5)),
    ("APTT", "aptt", &["aptt", "апвт"], Some("s"), Some(25.0), Some(35.0)),
    ("Fibrinogen", "fibrinogen", &["фибриноген"], Some("g/L"), Some(2.0), Some(4.0)),
    ("D-dimer", "d-dimer", &["d dimer", "д-димер"], Some("mg/L"), None, Some(0.5)),
    // Electrolytes
    ("Sodium", "sodium", &["na", "натрий"], Some("mmol/L"), Some(136.0), Some(145.0)),
    ("Potassium", "potassium", &["k", "калий"], Some("mmol/L"), Some(3.5), Some(5.1)),
    ("Chloride", "chloride", &["cl", "хлориди", "хлор"], Some("mmol/L"), Some(98.0), Some(107.0)),
    ("Calcium", "calcium", &["ca", "калций"], Some("mmol/L"), Some(2.15), Some(2.55)),
    ("Magnesium", "magnesium", &["mg", "магнезий"], Some("mmol/L"), Some(0.66), Some(1.07)),
    ("Phosphorus", "phosphorus", &["phosphate", "фосфор"], Some("mmol/L"), Some(0.81), Some(1.45)),
];

impl IndicatorDictionary {
    /// Build the index. Keys that collide keep the first entry.
    pub fn new(entries: Vec<IndicatorDef>) -> Self {
        let mut entries = entries;
        let mut index = HashMap::new();
        for (i, entry) in entries.iter_mut().enumerate() {
            if entry.slug.trim().is_empty() {
                entry.slug = slugify(&entry.name);
            }
            entry.unit = entry.unit.as_deref().map(canonical_unit);
            for key in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
                let folded = fold_key(key);
                if folded.is_empty() {
                    continue;
                }
                index.entry(folded).or_insert(i);
            }
        }
        Self { entries, index }
    }

    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(name, slug, aliases, unit, low, high)| IndicatorDef {
                name: (*name).into(),
                slug: (*slug).into(),
                aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
                unit: unit.map(String::from),
                reference_low: *low,
                reference_high: *high,
            })
            .collect();
        Self::new(entries)
    }

    pub fn from_json(json: &str) -> Result<Self, DictionaryError> {
        let entries: Vec<IndicatorDef> = serde_json::from_str(json)?;
        if entries.is_empty() {
            return Err(DictionaryError::Empty);
        }
        Ok(Self::new(entries))
    }

    /// Load a JSON array of indicator definitions.
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| DictionaryError::Load(path.display().to_string(), e.to_string()))?;
        let dictionary = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), indicators = dictionary.len(), "Loaded indicator dictionary");
        Ok(dictionary)
    }

    pub fn lookup(&self, name: &str) -> Option<&IndicatorDef> {
        self.index.get(&fold_key(name)).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[IndicatorDef] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IndicatorDictionary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lookup key: lowercase, diacritics folded, `-`/`_` as spaces, whitespace
/// collapsed, no space before `%` or `#`, trailing `:` dropped.
pub fn fold_key(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match c {
            '-' | '_' | '–' => folded.push(' '),
            'μ' => folded.push('µ'),
            c => match fold_char(c) {
                Some(s) => folded.push_str(s),
                None => folded.push(c),
            },
        }
    }
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(':')
        .trim_end()
        .replace(" %", "%")
        .replace(" #", "#")
}

fn fold_char(c: char) -> Option<&'static str> {
    Some(match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'ç' | 'ć' | 'č' => "c",
        'ď' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ť' | 'ţ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        'й' | 'ѝ' => "и",
        'ё' => "е",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_english_and_bulgarian() {
        let dict = IndicatorDictionary::builtin();
        assert_eq!(dict.lookup("HGB").unwrap().name, "Hemoglobin");
        assert_eq!(dict.lookup("Хемоглобин").unwrap().name, "Hemoglobin");
        assert_eq!(dict.lookup("glucose").unwrap().slug, "glucose");
        assert_eq!(dict.lookup("Gamma-GT").unwrap().name, "GGT");
    }

    #[test]
    fn lookup_ignores_case_diacritics_and_spacing() {
        let dict = IndicatorDictionary::builtin();
        assert_eq!(dict.lookup("HÉMOGLOBIN").map(|d| d.slug.as_str()), Some("hemoglobin"));
        assert_eq!(dict.lookup("Haemoglobin").unwrap().name, "Hemoglobin");
        assert_eq!(dict.lookup("Neutrophils%").unwrap().name, "Neutrophils %");
        assert_eq!(dict.lookup("  neutrophils   % ").unwrap().name, "Neutrophils %");
        assert_eq!(dict.lookup("Неутрофили бр.").unwrap().name, "Neutrophils");
        assert!(dict.lookup("Unobtainium").is_none());
    }

    #[test]
    fn fold_key_rules() {
        assert_eq!(fold_key("Créatinine"), "creatinine");
        assert_eq!(fold_key("LDL-C:"), "ldl c");
        assert_eq!(fold_key("Eosinophils #"), "eosinophils#");
        assert_eq!(fold_key("Калций"), "калции");
    }

    #[test]
    fn builtin_units_are_canonical() {
        let dict = IndicatorDictionary::builtin();
        for entry in dict.entries() {
            if let Some(unit) = &entry.unit {
                assert_eq!(&canonical_unit(unit), unit, "{}", entry.name);
            }
            assert!(!entry.slug.is_empty());
        }
    }

    #[test]
    fn builtin_slugs_are_unique() {
        let dict = IndicatorDictionary::builtin();
        let mut slugs: Vec<&str> = dict.entries().iter().map(|e| e.slug.as_str()).collect();
        slugs.sort_unstable();
        let before = slugs.len();
        slugs.dedup();
        assert_eq!(before, slugs.len());
    }

    #[test]
    fn from_json_fills_slug_and_unit() {
        let dict = IndicatorDictionary::from_json(
            r#"[{"name": "Lipase", "aliases": ["липаза"], "unit": "u/l", "reference_high": 60}]"#,
        )
        .unwrap();
        let lipase = dict.lookup("ЛИПАЗА").unwrap();
        assert_eq!(lipase.slug, "lipase");
        assert_eq!(lipase.unit.as_deref(), Some("U/L"));
        assert_eq!(lipase.reference_high, Some(60.0));
    }

    #[test]
    fn from_json_rejects_empty_and_invalid() {
        assert!(matches!(IndicatorDictionary::from_json("[]"), Err(DictionaryError::Empty)));
        assert!(matches!(IndicatorDictionary::from_json("{"), Err(DictionaryError::Parse(_))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indicators.json");
        std::fs::write(&path, r#"[{"name": "Amylase", "unit": "U/L"}]"#).unwrap();
        let dict = IndicatorDictionary::load(&path).unwrap();
        assert_eq!(dict.len(), 1);
        assert!(dict.lookup("amylase").is_some());

        let missing = IndicatorDictionary::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(DictionaryError::Load(_, _))));
    }

    #[test]
    fn first_entry_wins_on_alias_collision() {
        let dict = IndicatorDictionary::new(vec![
            IndicatorDef {
                name: "Alpha".into(),
                slug: String::new(),
                aliases: vec!["shared".into()],
                unit: None,
                reference_low: None,
                reference_high: None,
            },
            IndicatorDef {
                name: "Beta".into(),
                slug: String::new(),
                aliases: vec!["shared".into()],
                unit: None,
                reference_low: None,
                reference_high: None,
            },
        ]);
        assert_eq!(dict.lookup("Shared").unwrap().name, "Alpha");
    }
}

use std::sync::LazyLock;

use regex::Regex;

/// Lowercased OCR spellings mapped to the canonical unit.
const UNIT_ALIASES: &[(&str, &str)] = &[
    ("g/dl", "g/dL"),
    ("g/l", "g/L"),
    ("mg/dl", "mg/dL"),
    ("mg/l", "mg/L"),
    ("µg/dl", "µg/dL"),
    ("ug/dl", "µg/dL"),
    ("µg/l", "µg/L"),
    ("ug/l", "µg/L"),
    ("µg/ml", "µg/mL"),
    ("ug/ml", "µg/mL"),
    ("ng/ml", "ng/mL"),
    ("ng/dl", "ng/dL"),
    ("ng/l", "ng/L"),
    ("pg/ml", "pg/mL"),
    ("iu/l", "IU/L"),
    ("iu/ml", "IU/mL"),
    ("miu/l", "mIU/L"),
    ("miu/ml", "mIU/mL"),
    ("µiu/ml", "µIU/mL"),
    ("uiu/ml", "µIU/mL"),
    ("u/l", "U/L"),
    ("ku/l", "kU/L"),
    ("mmol/l", "mmol/L"),
    ("mol/l", "mol/L"),
    ("µmol/l", "µmol/L"),
    ("umol/l", "µmol/L"),
    ("nmol/l", "nmol/L"),
    ("pmol/l", "pmol/L"),
    ("meq/l", "mEq/L"),
    ("l/l", "L/L"),
    ("fl", "fL"),
    ("pg", "pg"),
    ("mm/h", "mm/h"),
    ("mm/hr", "mm/h"),
    ("sec", "s"),
    ("s", "s"),
    ("%", "%"),
];

/// Count units such as `x10^9/l`, `10^12/L`, `×10^3/µl`, `x10e9/L`.
static EXPONENT_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[x×*]\s*)?10\s*(?:\^|e|\*\*)?\s*(\d{1,2})\s*/\s*([µu]?l)$").unwrap()
});

/// Canonical spelling of a unit token. Unknown units are returned trimmed.
pub fn canonical_unit(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase().replace('μ', "µ");
    if let Some((_, canonical)) = UNIT_ALIASES.iter().find(|(alias, _)| *alias == lowered) {
        return (*canonical).to_string();
    }
    if let Some(caps) = EXPONENT_UNIT.captures(&lowered) {
        let volume = if caps[2].len() == 1 { "L" } else { "µL" };
        return format!("×10^{}/{}", &caps[1], volume);
    }
    trimmed.to_string()
}

/// Units compare equal when their canonical spellings match.
pub fn same_unit(a: &str, b: &str) -> bool {
    canonical_unit(a) == canonical_unit(b)
}

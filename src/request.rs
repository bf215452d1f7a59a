use crate::badge::LabelSet;

/// Prefix marking a form field as an extra vital, e.g. `health_vitals_SpO2=98%`.
pub const HEALTH_VITALS_PREFIX: &str = "health_vitals_";

const PROFILE_FIELDS: [(&str, &str, &str); 4] = [
    ("name", "Name", "Default Name"),
    ("age", "Age", "Default Age"),
    ("gender", "Gender", "Default Gender"),
    ("nationality", "Nationality", "Default Nationality"),
];

const DEFAULT_VITALS: [(&str, &str, &str); 2] = [
    ("blood_pressure", "Blood Pressure", "120/80"),
    ("pulse", "Pulse", "70"),
];

/// Build the badge labels for one personalization request.
///
/// Profile fields come first, then the default vitals, then every `health_vitals_*` field in
/// the order it was submitted. Missing fields fall back to placeholder values. A
/// `health_vitals_` field named like a default vital overrides it in place. When a field is
/// submitted more than once, its first value is used.
pub fn labels_from_fields<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> LabelSet {
    let fields: Vec<(&str, &str)> = fields.into_iter().collect();
    let lookup = |key: &str| {
        fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    };

    let mut labels = LabelSet::new();
    for &(key, label, default) in PROFILE_FIELDS.iter().chain(DEFAULT_VITALS.iter()) {
        labels.set(label, lookup(key).unwrap_or(default));
    }
    for (i, &(key, value)) in fields.iter().enumerate() {
        let repeated = fields[..i].iter().any(|(k, _)| *k == key);
        if let Some(label) = key.strip_prefix(HEALTH_VITALS_PREFIX)
            && !label.is_empty()
            && !repeated
        {
            labels.set(label, value);
        }
    }
    labels
}

/// Split a `key=value` argument. The value may itself contain `=`.
pub fn parse_field(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let k = k.trim();
    if k.is_empty() {
        return Err(format!("empty field name in '{s}'"));
    }
    Ok((k.to_string(), v.to_string()))
}

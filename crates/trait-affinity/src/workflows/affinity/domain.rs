use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// VNDB identifiers arrive as `"i123"`-style strings, but older documents carry bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match RawId::deserialize(deserializer)? {
        RawId::Text(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(serde::de::Error::custom("identifier must not be blank"))
            } else {
                Ok(trimmed.to_string())
            }
        }
        RawId::Number(value) => Ok(value.to_string()),
    }
}

macro_rules! vndb_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(#[serde(deserialize_with = "deserialize_id")] pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

vndb_id!(
    /// Trait identifier; trait groups are traits too and share this type.
    TraitId
);
vndb_id!(CharacterId);
vndb_id!(VnId);
vndb_id!(
    /// User list label. Exports from the browser app write these as bare numbers.
    LabelId
);

/// Character sex as reported by VNDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
    #[serde(rename = "b")]
    Both,
    #[serde(rename = "n")]
    Sexless,
}

impl Sex {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Male => "m",
            Self::Female => "f",
            Self::Both => "b",
            Self::Sexless => "n",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Both => "Both",
            Self::Sexless => "Sexless",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "m" => Some(Self::Male),
            "f" => Some(Self::Female),
            "b" => Some(Self::Both),
            "n" => Some(Self::Sexless),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSex {
    Code(String),
    Pair(Vec<Option<String>>),
}

/// Reads `"f"`, VNDB's `["f", "f"]` apparent/real pair, or `"unknown"`.
/// Codes that name no sex become `None` instead of failing the document.
pub(crate) fn deserialize_sex<'de, D>(deserializer: D) -> Result<Option<Sex>, D::Error>
where
    D: Deserializer<'de>,
{
    let code = match Option::<RawSex>::deserialize(deserializer)? {
        Some(RawSex::Code(code)) => Some(code),
        Some(RawSex::Pair(codes)) => codes.into_iter().next().flatten(),
        None => None,
    };
    Ok(code.as_deref().and_then(Sex::from_code))
}

/// Either "no preference" or a single sex. Used both for the user's stated
/// preference and for the candidate gender filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenderPreference {
    #[default]
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
    #[serde(rename = "b")]
    Both,
    #[serde(rename = "n")]
    Sexless,
}

impl GenderPreference {
    pub const fn sex(self) -> Option<Sex> {
        match self {
            Self::Any => None,
            Self::Male => Some(Sex::Male),
            Self::Female => Some(Sex::Female),
            Self::Both => Some(Sex::Both),
            Self::Sexless => Some(Sex::Sexless),
        }
    }

    pub const fn code(self) -> &'static str {
        match self.sex() {
            Some(sex) => sex.code(),
            None => "any",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("any") {
            return Some(Self::Any);
        }
        Sex::from_code(value).map(Self::from)
    }

    /// True only when a preference is declared, the sex is known, and they differ.
    pub fn mismatches(self, sex: Option<Sex>) -> bool {
        match (self.sex(), sex) {
            (Some(preferred), Some(actual)) => preferred != actual,
            _ => false,
        }
    }

    /// Filter semantics: `Any` admits everyone, otherwise the known sex must match.
    pub fn admits(self, sex: Option<Sex>) -> bool {
        match self.sex() {
            None => true,
            Some(preferred) => sex == Some(preferred),
        }
    }
}

impl From<Sex> for GenderPreference {
    fn from(value: Sex) -> Self {
        match value {
            Sex::Male => Self::Male,
            Sex::Female => Self::Female,
            Sex::Both => Self::Both,
            Sex::Sexless => Self::Sexless,
        }
    }
}

/// A character's role in the visual novel it was sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRole {
    Main,
    Primary,
    Side,
    Appears,
    #[default]
    #[serde(other)]
    Unknown,
}

impl CharacterRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Main => "Protagonist",
            Self::Primary => "Main character",
            Self::Side => "Side character",
            Self::Appears => "Makes an appearance",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleFilter {
    #[default]
    Any,
    Main,
    Primary,
    /// Matches both `side` and `appears`.
    Side,
}

impl RoleFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" => Some(Self::Any),
            "main" => Some(Self::Main),
            "primary" => Some(Self::Primary),
            "side" => Some(Self::Side),
            _ => None,
        }
    }

    pub fn admits(self, work: &SourceWork) -> bool {
        if self == Self::Any {
            return true;
        }
        if work.spoiler > 0 {
            return false;
        }
        match self {
            Self::Any => true,
            Self::Main => work.role == CharacterRole::Main,
            Self::Primary => work.role == CharacterRole::Primary,
            Self::Side => matches!(work.role, CharacterRole::Side | CharacterRole::Appears),
        }
    }
}

/// Descriptive attribute attached to a character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    pub id: TraitId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<TraitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, alias = "spoiler")]
    pub spoiler_level: u8,
}

/// The visual novel a character was picked from, with the role they play in it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceWork {
    #[serde(default)]
    pub id: Option<VnId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub role: CharacterRole,
    #[serde(default)]
    pub spoiler: u8,
}

/// Character as delivered by the upstream source, traits included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, alias = "gender", deserialize_with = "deserialize_sex")]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub traits: Vec<Trait>,
    #[serde(default)]
    pub source_work: SourceWork,
}

impl Character {
    /// Name for display: the original-script name when present, else the romanized one.
    pub fn display_name(&self) -> &str {
        self.original_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name)
    }

    pub fn visible_traits(&self, max_spoiler: u8) -> Vec<Trait> {
        self.traits
            .iter()
            .filter(|item| item.spoiler_level <= max_spoiler)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_numbers_and_strings() {
        let from_number: TraitId = serde_json::from_str("42").expect("number id");
        let from_text: TraitId = serde_json::from_str("\" i42 \"").expect("text id");
        assert_eq!(from_number.as_str(), "42");
        assert_eq!(from_text.as_str(), "i42");
        assert!(serde_json::from_str::<TraitId>("\"  \"").is_err());
    }

    #[test]
    fn label_ids_accept_numbers_from_browser_exports() {
        let labels: Vec<LabelId> = serde_json::from_str("[2, \"7\"]").expect("labels parse");
        assert_eq!(labels, vec![LabelId::from("2"), LabelId::from("7")]);
    }

    #[test]
    fn unknown_sex_codes_read_as_missing() {
        let parse = |sex: serde_json::Value| -> Character {
            serde_json::from_value(serde_json::json!({"id": "c1", "name": "Kurumi", "sex": sex}))
                .expect("character parses")
        };
        assert_eq!(parse(serde_json::json!("unknown")).sex, None);
        assert_eq!(parse(serde_json::json!(null)).sex, None);
        assert_eq!(parse(serde_json::json!(["f", "m"])).sex, Some(Sex::Female));
        assert_eq!(parse(serde_json::json!([null, "m"])).sex, None);
        assert_eq!(parse(serde_json::json!("M")).sex, Some(Sex::Male));
    }

    #[test]
    fn gender_preference_only_mismatches_known_sex() {
        assert!(GenderPreference::Female.mismatches(Some(Sex::Male)));
        assert!(!GenderPreference::Female.mismatches(Some(Sex::Female)));
        assert!(!GenderPreference::Female.mismatches(None));
        assert!(!GenderPreference::Any.mismatches(Some(Sex::Male)));
    }

    #[test]
    fn role_filter_side_admits_appearances_but_not_spoilers() {
        let appears = SourceWork {
            id: Some(VnId::from("v17")),
            title: "Ever17".to_string(),
            role: CharacterRole::Appears,
            spoiler: 0,
        };
        assert!(RoleFilter::Side.admits(&appears));
        assert!(!RoleFilter::Main.admits(&appears));

        let hidden = SourceWork {
            spoiler: 2,
            role: CharacterRole::Main,
            ..appears
        };
        assert!(!RoleFilter::Main.admits(&hidden));
        assert!(RoleFilter::Any.admits(&hidden));
    }

    #[test]
    fn character_accepts_gender_alias_and_spoiler_alias() {
        let character: Character = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "Kurumi",
            "gender": "f",
            "traits": [{"id": "i1", "name": "Twintails", "group_id": "i1000", "spoiler": 1}],
            "sourceWork": {"id": "v2", "title": "Example", "role": "primary"}
        }))
        .expect("character parses");

        assert_eq!(character.sex, Some(Sex::Female));
        assert_eq!(character.traits[0].spoiler_level, 1);
        assert_eq!(character.source_work.role, CharacterRole::Primary);
        assert!(character.visible_traits(0).is_empty());
        assert_eq!(character.visible_traits(1).len(), 1);
    }
}

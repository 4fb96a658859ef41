// Field schema - the catalogue of known PalWorldSettings fields, their
// value kinds and stock defaults, following the official server
// documentation.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use lazy_static::lazy_static;

use crate::settings::SectionValues;

/// How a field's value is typed in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Free-form text.
    Text,
    Integer,
    Float,
    /// Encoded as the literal `True` or `False`.
    Bool,
    /// Closed set of legal tokens.
    Enum(&'static [&'static str]),
}

impl ValueKind {
    /// Whether `value` is legal for this kind. Booleans are accepted in any
    /// case on read; the canonical `True`/`False` casing matters only when
    /// writing.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ValueKind::Text => true,
            ValueKind::Integer => value.parse::<i64>().is_ok(),
            ValueKind::Float => value.parse::<f64>().is_ok(),
            ValueKind::Bool => {
                value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
            }
            ValueKind::Enum(allowed) => allowed.contains(&value),
        }
    }

    /// Canonical file token for operator input, or `None` when the input does
    /// not fit the kind. Booleans are recognised case-insensitively and come
    /// back canonical; other kinds pass through unchanged once they check out.
    pub fn normalize(&self, value: &str) -> Option<String> {
        match self {
            ValueKind::Bool => {
                if value.eq_ignore_ascii_case("true") {
                    Some("True".to_string())
                } else if value.eq_ignore_ascii_case("false") {
                    Some("False".to_string())
                } else {
                    None
                }
            }
            _ => self.accepts(value).then(|| value.to_string()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Text => write!(f, "text"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Bool => write!(f, "True or False"),
            ValueKind::Enum(allowed) => write!(f, "one of {}", allowed.join(", ")),
        }
    }
}

/// One known settings field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: ValueKind,
    /// Display group, mirroring the official documentation's sections.
    pub category: &'static str,
    /// Value shipped in DefaultPalWorldSettings.ini.
    pub default: &'static str,
}

/// Lookup table over the known fields. Unknown fields are not an error
/// anywhere in the engine; the server ignores keys it does not recognise and
/// so do we.
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
    by_name: HashMap<&'static str, usize>,
}

lazy_static! {
    static ref SCHEMA: FieldSchema = FieldSchema::builtin();
}

impl FieldSchema {
    /// The process-wide schema instance.
    pub fn global() -> &'static FieldSchema {
        &SCHEMA
    }

    fn builtin() -> Self {
        let fields = catalogue();
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(index, spec)| (spec.name, index))
            .collect();
        FieldSchema { fields, by_name }
    }

    /// Value kind of a field, if the catalogue knows it.
    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.spec_of(name).map(|spec| spec.kind)
    }

    /// Full spec of a field, if the catalogue knows it.
    pub fn spec_of(&self, name: &str) -> Option<&FieldSpec> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Every known field, in documentation order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Names of the fields whose value does not fit its declared kind.
    /// Fields the catalogue has never heard of are skipped.
    pub fn validate(&self, values: &SectionValues) -> BTreeSet<String> {
        let mut offending = BTreeSet::new();
        for (name, value) in values {
            if let Some(kind) = self.kind_of(name) {
                if !kind.accepts(value) {
                    offending.insert(name.clone());
                }
            }
        }
        offending
    }
}

const DIFFICULTY: &[&str] = &["None", "Easy", "Normal", "Hard"];
const DEATH_PENALTY: &[&str] = &["None", "Item", "ItemAndEquipment", "All"];
const RANDOMIZER_TYPE: &[&str] = &["None", "Region", "All"];
const LOG_FORMAT: &[&str] = &["Text", "Json"];

fn catalogue() -> Vec<FieldSpec> {
    use ValueKind::{Bool, Enum, Float, Integer, Text};

    vec![
        // Server
        FieldSpec { name: "ServerName", kind: Text, category: "Server", default: "PalWorld Server" },
        FieldSpec { name: "ServerDescription", kind: Text, category: "Server", default: "A PalWorld server" },
        FieldSpec { name: "AdminPassword", kind: Text, category: "Server", default: "" },
        FieldSpec { name: "ServerPassword", kind: Text, category: "Server", default: "" },
        FieldSpec { name: "ServerPlayerMaxNum", kind: Integer, category: "Server", default: "32" },
        FieldSpec { name: "PublicIP", kind: Text, category: "Server", default: "" },
        FieldSpec { name: "PublicPort", kind: Integer, category: "Server", default: "8211" },
        // Game balance
        FieldSpec { name: "Difficulty", kind: Enum(DIFFICULTY), category: "Game Balance", default: "Normal" },
        FieldSpec { name: "DayTimeSpeedRate", kind: Float, category: "Game Balance", default: "1.000000" },
        FieldSpec { name: "NightTimeSpeedRate", kind: Float, category: "Game Balance", default: "1.000000" },
        FieldSpec { name: "ExpRate", kind: Float, category: "Game Balance", default: "1.000000" },
        FieldSpec { name: "DeathPenalty", kind: Enum(DEATH_PENALTY), category: "Game Balance", default: "All" },
        FieldSpec { name: "GuildPlayerMaxNum", kind: Integer, category: "Game Balance", default: "20" },
        // Pals
        FieldSpec { name: "PalCaptureRate", kind: Float, category: "Pal", default: "1.000000" },
        FieldSpec { name: "PalSpawnNumRate", kind: Float, category: "Pal", default: "1.000000" },
        FieldSpec { name: "PalDamageRateAttack", kind: Float, category: "Pal", default: "1.000000" },
        FieldSpec { name: "PalDamageRateDefense", kind: Float, category: "Pal", default: "1.000000" },
        FieldSpec { name: "PalStaminaDecreaceRate", kind: Float, category: "Pal", default: "1.000000" },
        FieldSpec { name: "PalStomachDecreaceRate", kind: Float, category: "Pal", default: "1.000000" },
        FieldSpec { name: "PalAutoHPRegeneRate", kind: Float, category: "Pal", default: "1.000000" },
        FieldSpec { name: "PalAutoHpRegeneRateInSleep", kind: Float, category: "Pal", default: "1.000000" },
        FieldSpec { name: "PalEggDefaultHatchingTime", kind: Float, category: "Pal", default: "72.000000" },
        // Players
        FieldSpec { name: "PlayerDamageRateAttack", kind: Float, category: "Player", default: "1.000000" },
        FieldSpec { name: "PlayerDamageRateDefense", kind: Float, category: "Player", default: "1.000000" },
        FieldSpec { name: "PlayerStaminaDecreaceRate", kind: Float, category: "Player", default: "1.000000" },
        FieldSpec { name: "PlayerStomachDecreaceRate", kind: Float, category: "Player", default: "1.000000" },
        FieldSpec { name: "PlayerAutoHPRegeneRate", kind: Float, category: "Player", default: "1.000000" },
        FieldSpec { name: "PlayerAutoHpRegeneRateInSleep", kind: Float, category: "Player", default: "1.000000" },
        // Base camps
        FieldSpec { name: "BaseCampMaxNumInGuild", kind: Integer, category: "Base Camp", default: "4" },
        FieldSpec { name: "BaseCampWorkerMaxNum", kind: Integer, category: "Base Camp", default: "15" },
        // Building
        FieldSpec { name: "BuildObjectDamageRate", kind: Float, category: "Building", default: "1.000000" },
        FieldSpec { name: "BuildObjectDeteriorationDamageRate", kind: Float, category: "Building", default: "1.000000" },
        FieldSpec { name: "MaxBuildingLimitNum", kind: Integer, category: "Building", default: "0" },
        // Collection
        FieldSpec { name: "CollectionDropRate", kind: Float, category: "Collection", default: "1.000000" },
        FieldSpec { name: "CollectionObjectHpRate", kind: Float, category: "Collection", default: "1.000000" },
        FieldSpec { name: "CollectionObjectRespawnSpeedRate", kind: Float, category: "Collection", default: "1.000000" },
        // Enemies
        FieldSpec { name: "EnemyDropItemRate", kind: Float, category: "Enemy", default: "1.000000" },
        // Items
        FieldSpec { name: "ItemWeightRate", kind: Float, category: "Item", default: "1.000000" },
        FieldSpec { name: "EquipmentDurabilityDamageRate", kind: Float, category: "Item", default: "1.000000" },
        // Gameplay toggles
        FieldSpec { name: "bEnableFastTravel", kind: Bool, category: "Gameplay", default: "True" },
        FieldSpec { name: "bEnableInvaderEnemy", kind: Bool, category: "Gameplay", default: "True" },
        FieldSpec { name: "bHardcore", kind: Bool, category: "Gameplay", default: "False" },
        FieldSpec { name: "bPalLost", kind: Bool, category: "Gameplay", default: "False" },
        FieldSpec { name: "bShowPlayerList", kind: Bool, category: "Gameplay", default: "True" },
        FieldSpec { name: "bCharacterRecreateInHardcore", kind: Bool, category: "Gameplay", default: "False" },
        FieldSpec { name: "bInvisibleOtherGuildBaseCampAreaFX", kind: Bool, category: "Gameplay", default: "False" },
        FieldSpec { name: "bIsRandomizerPalLevelRandom", kind: Bool, category: "Gameplay", default: "False" },
        FieldSpec { name: "bIsUseBackupSaveData", kind: Bool, category: "Gameplay", default: "True" },
        FieldSpec { name: "bBuildAreaLimit", kind: Bool, category: "Gameplay", default: "False" },
        FieldSpec { name: "bAllowGlobalPalboxExport", kind: Bool, category: "Gameplay", default: "False" },
        FieldSpec { name: "bAllowGlobalPalboxImport", kind: Bool, category: "Gameplay", default: "False" },
        // Randomizer
        FieldSpec { name: "RandomizerSeed", kind: Integer, category: "Randomizer", default: "0" },
        FieldSpec { name: "RandomizerType", kind: Enum(RANDOMIZER_TYPE), category: "Randomizer", default: "None" },
        // Crossplay
        FieldSpec { name: "CrossplayPlatforms", kind: Text, category: "Crossplay", default: "(Steam,Xbox,PS5,Mac)" },
        FieldSpec { name: "AllowConnectPlatform", kind: Text, category: "Crossplay", default: "" },
        // Chat
        FieldSpec { name: "ChatPostLimitPerMinute", kind: Integer, category: "Chat", default: "0" },
        // Supply drops
        FieldSpec { name: "SupplyDropSpan", kind: Integer, category: "Supply Drop", default: "0" },
        // Replication tuning
        FieldSpec { name: "ServerReplicatePawnCullDistance", kind: Integer, category: "Sync", default: "10000" },
        FieldSpec { name: "ItemContainerForceMarkDirtyInterval", kind: Integer, category: "Sync", default: "5" },
        // Remote APIs
        FieldSpec { name: "RESTAPIEnabled", kind: Bool, category: "API", default: "True" },
        FieldSpec { name: "RESTAPIPort", kind: Integer, category: "API", default: "8212" },
        FieldSpec { name: "RCONEnabled", kind: Bool, category: "API", default: "False" },
        FieldSpec { name: "RCONPort", kind: Integer, category: "API", default: "25575" },
        // Logging
        FieldSpec { name: "LogFormatType", kind: Enum(LOG_FORMAT), category: "Log", default: "Text" },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> SectionValues {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn knows_the_documented_fields() {
        let schema = FieldSchema::global();

        assert_eq!(schema.kind_of("ExpRate"), Some(ValueKind::Float));
        assert_eq!(schema.kind_of("PublicPort"), Some(ValueKind::Integer));
        assert_eq!(schema.kind_of("bHardcore"), Some(ValueKind::Bool));
        assert_eq!(schema.kind_of("ServerName"), Some(ValueKind::Text));
        assert_eq!(schema.kind_of("NoSuchField"), None);
        assert_eq!(schema.fields().len(), 64);
    }

    #[test]
    fn defaults_all_pass_their_own_kind() {
        for spec in FieldSchema::global().fields() {
            assert!(spec.kind.accepts(spec.default), "default rejected for {}", spec.name);
        }
    }

    #[test]
    fn validate_flags_only_the_bad_fields() {
        let schema = FieldSchema::global();
        let offending = schema.validate(&values(&[
            ("ExpRate", "not-a-number"),
            ("PublicPort", "8211"),
            ("Difficulty", "Impossible"),
            ("bHardcore", "False"),
        ]));

        assert!(offending.contains("ExpRate"));
        assert!(offending.contains("Difficulty"));
        assert_eq!(offending.len(), 2);
    }

    #[test]
    fn unknown_fields_are_not_flagged() {
        let offending =
            FieldSchema::global().validate(&values(&[("SomeFutureKnob", "whatever")]));
        assert!(offending.is_empty());
    }

    #[test]
    fn booleans_accept_any_casing() {
        assert!(ValueKind::Bool.accepts("True"));
        assert!(ValueKind::Bool.accepts("false"));
        assert!(ValueKind::Bool.accepts("TRUE"));
        assert!(!ValueKind::Bool.accepts("1"));
        assert!(!ValueKind::Bool.accepts("yes"));
    }

    #[test]
    fn normalize_canonicalises_operator_input() {
        assert_eq!(ValueKind::Bool.normalize("TRUE").as_deref(), Some("True"));
        assert_eq!(ValueKind::Bool.normalize("false").as_deref(), Some("False"));
        assert_eq!(ValueKind::Bool.normalize("banana"), None);
        assert_eq!(ValueKind::Integer.normalize("8211").as_deref(), Some("8211"));
        assert_eq!(ValueKind::Integer.normalize("many"), None);
        assert_eq!(ValueKind::Float.normalize("2.5").as_deref(), Some("2.5"));
    }

    #[test]
    fn enum_kinds_accept_only_their_tokens() {
        let kind = FieldSchema::global().kind_of("DeathPenalty").unwrap();
        assert!(kind.accepts("ItemAndEquipment"));
        assert!(!kind.accepts("itemandequipment"));
        assert!(!kind.accepts("Everything"));
    }

    #[test]
    fn kinds_describe_themselves() {
        assert_eq!(ValueKind::Float.to_string(), "float");
        assert_eq!(
            FieldSchema::global().kind_of("Difficulty").unwrap().to_string(),
            "one of None, Easy, Normal, Hard"
        );
    }

    #[test]
    fn specs_carry_category_and_default() {
        let spec = FieldSchema::global().spec_of("PalEggDefaultHatchingTime").unwrap();
        assert_eq!(spec.category, "Pal");
        assert_eq!(spec.default, "72.000000");
    }
}

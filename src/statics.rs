// Central place for format names, status strings and other non-localized constants.
// Keep these out of the operation modules to reduce duplication and make tweaks safer.

// Newlines
pub const NL_LF: &str = "\n";
pub const NL_CRLF: &str = "\r\n";

// Indentation used by the compiler's text output.
pub const INDENT: &str = "    ";

// Entry type names
pub const TYPE_SYSTEM: &str = "VfxSystemDefinitionData";
pub const TYPE_EMITTER: &str = "VfxEmitterDefinitionData";
pub const TYPE_MATERIAL: &str = "StaticMaterialDef";
pub const TYPE_MATERIAL_PARAM: &str = "StaticMaterialShaderParamDef";
pub const TYPE_RESOURCE_RESOLVER: &str = "ResourceResolver";
pub const TYPE_SKIN_PROPERTIES: &str = "SkinCharacterDataProperties";
pub const TYPE_IDLE_EFFECT: &str = "SkinCharacterDataProperties_CharacterIdleEffect";
pub const TYPE_PERSISTENT_CONDITION: &str = "PersistentEffectConditionData";
pub const TYPE_PERSISTENT_VFX: &str = "PersistentVfxData";
pub const TYPE_CHILD_PARTICLE_SET: &str = "VfxChildParticleSetDefinitionData";
pub const TYPE_CHILD_IDENTIFIER: &str = "VfxChildIdentifier";
pub const TYPE_VALUE_FLOAT: &str = "ValueFloat";

// Field names
pub const FIELD_ENTRIES: &str = "entries";
pub const FIELD_PARTICLE_NAME: &str = "particleName";
pub const FIELD_PARTICLE_PATH: &str = "particlePath";
pub const FIELD_EMITTERS: &str = "complexEmitterDefinitionData";
pub const FIELD_EMITTER_NAME: &str = "emitterName";
pub const FIELD_BLEND_MODE: &str = "blendMode";
pub const FIELD_COLOR: &str = "color";
pub const FIELD_RESOURCE_MAP: &str = "resourceMap";
pub const FIELD_NAME: &str = "name";
pub const FIELD_VALUE: &str = "value";
pub const FIELD_IDLE_EFFECTS: &str = "idleParticlesEffects";
pub const FIELD_PERSISTENT_CONDITIONS: &str = "PersistentEffectConditions";
pub const FIELD_OWNER_CONDITION: &str = "OwnerCondition";
pub const FIELD_PERSISTENT_VFXS: &str = "PersistentVfxs";
pub const FIELD_EFFECT_KEY: &str = "effectKey";
pub const FIELD_BONE_NAME: &str = "boneName";
pub const FIELD_CHILD_EFFECT: &str = "effect";

// Persistent-effect owner condition drivers
pub const DRIVER_HAS_BUFF: &str = "HasBuffDynamicMaterialBoolDriver";
pub const DRIVER_ANIMATION_PLAYING: &str = "IsAnimationPlayingDynamicMaterialBoolDriver";

// Defaults
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 50;
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 750;
pub const DEFAULT_BONE_NAME: &str = "C_Buffbone_Glb_Center_Loc";

// Names of the text dump sitting next to a compiled bin.
pub const TEXT_EXTENSION: &str = "py";
pub const BIN_EXTENSION: &str = "bin";

// Extensions treated as asset references inside emitter bodies.
pub const ASSET_EXTENSIONS: &[&str] = &[
    "dds", "tex", "png", "tga", "scb", "sco", "skn", "skl", "anm", "bin",
];

// English status strings (EN_ prefix to make future localization easier)
pub const EN_STATUS_NOT_LOADED: &str = "No file is loaded.";
pub const EN_STATUS_NOTHING_TO_UNDO: &str = "Nothing to undo.";
pub const EN_STATUS_HASHED_CONTENT: &str =
    "File looks hashed (no readable system names); editing in hash-only mode.";
pub const EN_STATUS_BACKUP_HINT: &str = "The last good save is untouched; restore a backup if needed.";

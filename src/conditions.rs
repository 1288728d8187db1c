//! Template insertions that make an effect play: as a child of another system, as a
//! bone-bound idle particle, or as a persistent effect gated by an owner condition.
//!
//! `ConditionMode::Edit` first removes every record this module would have written for
//! the same effect, then inserts the new one, so re-applying never duplicates.

use crate::document::Document;
use crate::error::{Result, VfxError};
use crate::naming;
use crate::ops::Edit;
use crate::scan::{self, BlockKind};
use crate::splice::{self, BlockWriter};
use crate::statics;
use crate::value::{self, EntryKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionMode {
    #[default]
    Add,
    Edit,
}

/// What must hold on the owner for a persistent effect to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistentCondition {
    Always,
    BuffActive(String),
    AnimationPlaying(String),
}

/// True when some `field` line of `element` names one of `keys`.
fn references_effect(element: &str, field: &str, keys: &[EntryKey]) -> bool {
    scan::split_lines(element).iter().any(|line| {
        scan::parse_field(line).is_some_and(|f| {
            f.name == field
                && EntryKey::parse(f.value)
                    .is_some_and(|k| keys.iter().any(|key| key.hash() == k.hash()))
        })
    })
}

/// The key skin data should use for `effect`: its resource-map alias when there is one,
/// else the system key. The second value lists every key that refers to the effect.
fn effect_reference(doc: &Document, effect: &str) -> Result<(EntryKey, Vec<EntryKey>)> {
    let system_key = doc.system(effect)?.key.clone();
    let alias = doc
        .tree
        .resource_map
        .iter()
        .find(|entry| entry.value.hash() == system_key.hash())
        .map(|entry| entry.key.clone());
    let primary = alias.clone().unwrap_or_else(|| system_key.clone());
    let mut all = vec![system_key];
    all.extend(alias);
    Ok((primary, all))
}

fn bone_or_default(bone: Option<&str>) -> &str {
    match bone.map(str::trim) {
        Some(b) if !b.is_empty() => b,
        _ => statics::DEFAULT_BONE_NAME,
    }
}

/// The first `SkinCharacterDataProperties` entry: `(key, block text)`.
fn skin_properties(doc: &Document) -> Result<(EntryKey, String)> {
    let lines = scan::split_lines(&doc.text);
    scan::scan_entries(&lines)
        .into_iter()
        .find(|span| span.kind == BlockKind::SkinProperties)
        .map(|span| (span.key.clone(), span.text(&lines)))
        .ok_or_else(|| VfxError::not_found("entry", statics::TYPE_SKIN_PROPERTIES))
}

/// Add a trigger emitter to `parent` that spawns `child` as a single particle.
pub fn add_child_particle(
    doc: &Document,
    parent: &str,
    child: &str,
    emitter_name: Option<&str>,
    mode: ConditionMode,
) -> Result<Edit> {
    let parent_system = doc.system(parent)?;
    let child_system = doc.system(child)?;
    if parent_system.key == child_system.key {
        return Err(VfxError::InvalidInput(
            "a system cannot spawn itself as a child".to_string(),
        ));
    }
    let child_key = child_system.key.clone();

    let mut block = parent_system.raw.clone();
    let mut removed = Vec::new();
    if mode == ConditionMode::Edit {
        for emitter in parent_system.emitters.iter().rev() {
            let Some(body) = parent_system.emitter_body(&emitter.name) else {
                continue;
            };
            if references_effect(&body, statics::FIELD_CHILD_EFFECT, std::slice::from_ref(&child_key)) {
                block = splice::remove_emitter_at(&block, emitter.span);
                removed.push(emitter.name.as_str());
            }
        }
    }
    let replaced = removed.len();

    let requested = emitter_name.map(str::trim).filter(|n| !n.is_empty());
    let desired = requested
        .map(str::to_string)
        .unwrap_or_else(|| format!("Child_{}", child_system.display_name));
    let name = naming::unique_name(&desired, |n| {
        parent_system.has_emitter(n) && !removed.iter().any(|r| *r == n)
    });

    let newline = doc.newline();
    let mut writer = BlockWriter::new("", newline);
    writer
        .line(0, &format!("{} {{", statics::TYPE_EMITTER))
        .line(1, "isSingleParticle: flag = true")
        .line(
            1,
            &format!(
                "childParticleSetDefinition: pointer = {} {{",
                statics::TYPE_CHILD_PARTICLE_SET
            ),
        )
        .line(2, "childrenIdentifiers: list[embed] = {")
        .line(3, &format!("{} {{", statics::TYPE_CHILD_IDENTIFIER))
        .line(
            4,
            &format!("{}: link = {}", statics::FIELD_CHILD_EFFECT, child_key.to_token()),
        )
        .line(3, "}")
        .line(2, "}")
        .line(1, "}")
        .line(1, &format!("bindWeight: embed = {} {{", statics::TYPE_VALUE_FLOAT))
        .line(2, "constantValue: f32 = 1")
        .line(1, "}")
        .line(1, "particleIsLocalOrientation: flag = true")
        .line(1, &format!("rate: embed = {} {{", statics::TYPE_VALUE_FLOAT))
        .line(2, "constantValue: f32 = 1")
        .line(1, "}")
        .line(
            1,
            &format!("{}: string = {}", statics::FIELD_EMITTER_NAME, value::quote(&name)),
        )
        .line(0, "}");

    let block = splice::append_emitter(&block, &writer.finish(), newline)?;
    let text = splice::replace_entry(&doc.text, &parent_system.key, &block)?;

    tracing::debug!(parent = %parent_system.key, child = %child_key, emitter = %name, replaced, "added child particle");
    let verb = if replaced > 0 { "Updated" } else { "Added" };
    Ok(Edit::new(
        doc.with_text(text),
        format!(
            "{verb} child particle {} on {} (emitter {name})",
            child_system.display_name, parent_system.display_name
        ),
    ))
}

/// Add an idle particle record bound to `bone` on the skin properties entry.
pub fn add_idle_particle(
    doc: &Document,
    effect: &str,
    bone: Option<&str>,
    mode: ConditionMode,
) -> Result<Edit> {
    let (key, aliases) = effect_reference(doc, effect)?;
    let bone = bone_or_default(bone);
    let (skin_key, block) = skin_properties(doc)?;

    let (block, replaced) = match mode {
        ConditionMode::Add => (block, 0),
        ConditionMode::Edit => splice::remove_list_elements(
            &block,
            statics::FIELD_IDLE_EFFECTS,
            statics::TYPE_IDLE_EFFECT,
            |e| references_effect(e, statics::FIELD_EFFECT_KEY, &aliases),
        ),
    };

    let newline = doc.newline();
    let mut writer = BlockWriter::new("", newline);
    writer
        .line(0, &format!("{} {{", statics::TYPE_IDLE_EFFECT))
        .line(1, &format!("{}: hash = {}", statics::FIELD_EFFECT_KEY, key.to_token()))
        .line(1, &format!("{}: string = {}", statics::FIELD_BONE_NAME, value::quote(bone)))
        .line(0, "}");

    let block = splice::append_list_element(
        &block,
        statics::FIELD_IDLE_EFFECTS,
        "list[embed]",
        &writer.finish(),
        newline,
    )?;
    let text = splice::replace_entry(&doc.text, &skin_key, &block)?;

    tracing::debug!(effect = %key, bone, replaced, "added idle particle");
    let verb = if replaced > 0 { "Updated" } else { "Added" };
    Ok(Edit::new(
        doc.with_text(text),
        format!("{verb} idle particle {effect} on {bone}"),
    ))
}

/// Add a persistent effect that plays on `bone` while `condition` holds.
pub fn add_persistent_effect(
    doc: &Document,
    effect: &str,
    bone: Option<&str>,
    condition: &PersistentCondition,
    mode: ConditionMode,
) -> Result<Edit> {
    let (key, aliases) = effect_reference(doc, effect)?;
    let bone = bone_or_default(bone);
    let (skin_key, block) = skin_properties(doc)?;

    let (block, replaced) = match mode {
        ConditionMode::Add => (block, 0),
        ConditionMode::Edit => splice::remove_list_elements(
            &block,
            statics::FIELD_PERSISTENT_CONDITIONS,
            statics::TYPE_PERSISTENT_CONDITION,
            |e| references_effect(e, statics::FIELD_EFFECT_KEY, &aliases),
        ),
    };

    let newline = doc.newline();
    let mut writer = BlockWriter::new("", newline);
    writer.line(0, &format!("{} {{", statics::TYPE_PERSISTENT_CONDITION));
    match condition {
        PersistentCondition::Always => {}
        PersistentCondition::BuffActive(buff) => {
            writer
                .line(
                    1,
                    &format!(
                        "{}: pointer = {} {{",
                        statics::FIELD_OWNER_CONDITION,
                        statics::DRIVER_HAS_BUFF
                    ),
                )
                .line(2, &format!("Spell: hash = {}", value::quote(buff)))
                .line(1, "}");
        }
        PersistentCondition::AnimationPlaying(animation) => {
            writer
                .line(
                    1,
                    &format!(
                        "{}: pointer = {} {{",
                        statics::FIELD_OWNER_CONDITION,
                        statics::DRIVER_ANIMATION_PLAYING
                    ),
                )
                .line(2, &format!("mAnimationName: hash = {}", value::quote(animation)))
                .line(1, "}");
        }
    }
    writer
        .line(1, &format!("{}: list2[embed] = {{", statics::FIELD_PERSISTENT_VFXS))
        .line(2, &format!("{} {{", statics::TYPE_PERSISTENT_VFX))
        .line(3, &format!("{}: string = {}", statics::FIELD_BONE_NAME, value::quote(bone)))
        .line(3, &format!("{}: hash = {}", statics::FIELD_EFFECT_KEY, key.to_token()))
        .line(2, "}")
        .line(1, "}")
        .line(0, "}");

    let block = splice::append_list_element(
        &block,
        statics::FIELD_PERSISTENT_CONDITIONS,
        "list2[pointer]",
        &writer.finish(),
        newline,
    )?;
    let text = splice::replace_entry(&doc.text, &skin_key, &block)?;

    tracing::debug!(effect = %key, bone, ?condition, replaced, "added persistent effect");
    let verb = if replaced > 0 { "Updated" } else { "Added" };
    Ok(Edit::new(
        doc.with_text(text),
        format!("{verb} persistent effect {effect} on {bone}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEXT: &str = concat!(
        "entries: map[hash,embed] = {\n",
        "    \"Characters/Ahri/Skins/Skin0\" = SkinCharacterDataProperties {\n",
        "        skinClassification: u32 = 1\n",
        "    }\n",
        "    \"Fx_Parent\" = VfxSystemDefinitionData {\n",
        "        complexEmitterDefinitionData: list[pointer] = {}\n",
        "        particleName: string = \"Fx_Parent\"\n",
        "    }\n",
        "    \"Fx_Child\" = VfxSystemDefinitionData {\n",
        "        particleName: string = \"Fx_Child\"\n",
        "    }\n",
        "}\n",
    );

    #[test]
    fn child_particle_adds_trigger_emitter_once_in_edit_mode() {
        let doc = Document::from_text(TEXT);
        let first = add_child_particle(&doc, "Fx_Parent", "Fx_Child", None, ConditionMode::Add)
            .unwrap()
            .document;
        let parent = first.tree.system("Fx_Parent").unwrap();
        assert_eq!(parent.emitter_names(), vec!["Child_Fx_Child"]);
        assert!(parent.raw.contains("                            effect: link = \"Fx_Child\"\n"));

        let again = add_child_particle(&first, "Fx_Parent", "Fx_Child", None, ConditionMode::Edit)
            .unwrap();
        assert!(again.description.starts_with("Updated"));
        assert_eq!(
            again.document.tree.system("Fx_Parent").unwrap().emitter_names(),
            vec!["Child_Fx_Child"]
        );

        let added = add_child_particle(&first, "Fx_Parent", "Fx_Child", None, ConditionMode::Add)
            .unwrap();
        assert_eq!(
            added.document.tree.system("Fx_Parent").unwrap().emitter_names(),
            vec!["Child_Fx_Child", "Child_Fx_Child_1"]
        );
    }

    #[test]
    fn child_particle_rejects_self_reference() {
        let doc = Document::from_text(TEXT);
        assert!(add_child_particle(&doc, "Fx_Parent", "Fx_Parent", None, ConditionMode::Add).is_err());
        assert!(add_child_particle(&doc, "Fx_Parent", "Fx_Nope", None, ConditionMode::Add).is_err());
    }

    #[test]
    fn idle_particle_creates_list_then_replaces_in_edit_mode() {
        let doc = Document::from_text(TEXT);
        let first = add_idle_particle(&doc, "Fx_Child", None, ConditionMode::Add).unwrap();
        assert!(first.document.text.contains(concat!(
            "        skinClassification: u32 = 1\n",
            "        idleParticlesEffects: list[embed] = {\n",
            "            SkinCharacterDataProperties_CharacterIdleEffect {\n",
            "                effectKey: hash = \"Fx_Child\"\n",
            "                boneName: string = \"C_Buffbone_Glb_Center_Loc\"\n",
            "            }\n",
            "        }\n",
            "    }\n",
        )));

        let edited =
            add_idle_particle(&first.document, "Fx_Child", Some("L_Hand"), ConditionMode::Edit).unwrap();
        let text = &edited.document.text;
        assert_eq!(text.matches(statics::TYPE_IDLE_EFFECT).count(), 1);
        assert!(text.contains("boneName: string = \"L_Hand\""));
    }

    #[test]
    fn persistent_effect_writes_owner_condition() {
        let doc = Document::from_text(TEXT);
        let edit = add_persistent_effect(
            &doc,
            "Fx_Child",
            Some("R_Hand"),
            &PersistentCondition::BuffActive("AhriBuff".to_string()),
            ConditionMode::Add,
        )
        .unwrap();
        let text = &edit.document.text;
        assert!(text.contains("        PersistentEffectConditions: list2[pointer] = {\n"));
        assert!(text.contains("OwnerCondition: pointer = HasBuffDynamicMaterialBoolDriver {\n"));
        assert!(text.contains("Spell: hash = \"AhriBuff\"\n"));

        let always = add_persistent_effect(
            &edit.document,
            "Fx_Child",
            None,
            &PersistentCondition::Always,
            ConditionMode::Edit,
        )
        .unwrap();
        let text = &always.document.text;
        assert_eq!(text.matches(statics::TYPE_PERSISTENT_CONDITION).count(), 1);
        assert!(!text.contains("OwnerCondition"));
    }

    #[test]
    fn missing_skin_properties_is_reported() {
        let doc = Document::from_text("\"Fx_A\" = VfxSystemDefinitionData {}\n");
        let err = add_idle_particle(&doc, "Fx_A", None, ConditionMode::Add).unwrap_err();
        assert!(matches!(err, VfxError::NotFound { .. }));
    }
}

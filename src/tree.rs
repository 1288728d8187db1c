use crate::naming;
use crate::scan::{self, BlockKind, BlockSpan};
use crate::statics;
use crate::value::{self, EntryKey};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Inclusive, 0-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// Lightweight emitter metadata. The body is only materialized on request.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    pub name: String,
    pub system_key: String,
    /// Relative to the owning system's block (line 0 is the system header).
    pub span: LineRange,
    pub body: Option<String>,
}

impl Emitter {
    pub fn is_loaded(&self) -> bool {
        self.body.is_some()
    }

    /// Load the body from the owning system's raw block text if it is not loaded yet.
    pub fn hydrate(&mut self, system_raw: &str) -> Option<&str> {
        if self.body.is_none() {
            let lines = scan::split_lines(system_raw);
            let slice = lines.get(self.span.start..=self.span.end)?;
            self.body = Some(slice.concat());
        }
        self.body.as_deref()
    }
}

/// Attributes pulled out of an emitter body by targeted scans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitterDetails {
    pub textures: Vec<String>,
    pub blend_mode: Option<u8>,
    pub colors: Vec<[f32; 4]>,
}

impl EmitterDetails {
    pub fn scan(body: &str) -> Self {
        let lines = scan::split_lines(body);
        let mut details = EmitterDetails::default();

        for line in &lines {
            let Some(field) = scan::parse_field(line) else {
                continue;
            };
            if field.ty == "string" && field.name.to_ascii_lowercase().contains("texture") {
                if let Some(path) = value::unquote(field.value) {
                    details.textures.push(path);
                }
            } else if field.name == statics::FIELD_BLEND_MODE && details.blend_mode.is_none() {
                details.blend_mode = field.value.parse().ok();
            }
        }

        for (start, end) in scan::find_field_blocks_anywhere(&lines, statics::FIELD_COLOR) {
            for line in &lines[start..=end] {
                if let Some(field) = scan::parse_field(line) {
                    if field.ty == "vec4" {
                        if let Some(v) = value::parse_vec4(field.value) {
                            details.colors.push(v);
                        }
                    }
                }
            }
        }

        details
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct System {
    pub key: EntryKey,
    pub display_name: String,
    pub particle_name: Option<String>,
    pub particle_path: Option<String>,
    pub emitters: Vec<Emitter>,
    pub raw: String,
    pub lines: LineRange,
}

impl System {
    pub fn emitter(&self, name: &str) -> Option<&Emitter> {
        self.emitters.iter().find(|e| e.name == name)
    }

    pub fn emitter_mut(&mut self, name: &str) -> Option<&mut Emitter> {
        self.emitters.iter_mut().find(|e| e.name == name)
    }

    pub fn has_emitter(&self, name: &str) -> bool {
        self.emitter(name).is_some()
    }

    pub fn emitter_names(&self) -> Vec<&str> {
        self.emitters.iter().map(|e| e.name.as_str()).collect()
    }

    /// Body of one emitter, taken from the cached copy or re-read from the raw block.
    pub fn emitter_body(&self, name: &str) -> Option<String> {
        let emitter = self.emitter(name)?;
        if let Some(body) = &emitter.body {
            return Some(body.clone());
        }
        let lines = scan::split_lines(&self.raw);
        Some(lines.get(emitter.span.start..=emitter.span.end)?.concat())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorParam {
    pub name: String,
    pub value: [f32; 4],
    pub is_color: bool,
    /// Absolute line of the `value: vec4 = ...` assignment.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub key: EntryKey,
    pub display_name: String,
    pub params: Vec<ColorParam>,
    pub lines: LineRange,
}

impl Material {
    pub fn param(&self, name: &str) -> Option<&ColorParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMapEntry {
    pub key: EntryKey,
    pub value: EntryKey,
    /// Absolute line of the entry.
    pub line: usize,
}

/// The parsed property tree: systems and materials in file order, plus the resource map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VfxTree {
    pub systems: IndexMap<String, System>,
    pub materials: IndexMap<String, Material>,
    pub resource_map: Vec<ResourceMapEntry>,
}

impl VfxTree {
    pub fn parse(text: &str) -> Self {
        let lines = scan::split_lines(text);
        let mut tree = VfxTree::default();

        for span in scan::scan_entries(&lines) {
            match span.kind {
                BlockKind::System => {
                    let system = parse_system(&lines, &span);
                    let lookup = system.key.lookup();
                    if tree.systems.contains_key(&lookup) {
                        tracing::warn!(key = %lookup, "duplicate system key; keeping the first");
                        continue;
                    }
                    tree.systems.insert(lookup, system);
                }
                BlockKind::Material => {
                    let material = parse_material(&lines, &span);
                    tree.materials
                        .entry(material.key.lookup())
                        .or_insert(material);
                }
                _ => {}
            }
        }

        tree.resource_map = parse_resource_map(&lines);
        tree
    }

    pub fn system(&self, key: &str) -> Option<&System> {
        self.systems.get(key)
    }

    pub fn material(&self, key: &str) -> Option<&Material> {
        self.materials.get(key)
    }

    pub fn emitter_count(&self) -> usize {
        self.systems.values().map(|s| s.emitters.len()).sum()
    }

    /// Lazily materialize one emitter body, caching it in the tree.
    pub fn emitter_body(&mut self, system_key: &str, emitter: &str) -> Option<String> {
        let system = self.systems.get_mut(system_key)?;
        let raw = system.raw.clone();
        let e = system.emitter_mut(emitter)?;
        e.hydrate(&raw).map(str::to_string)
    }

    /// Heuristic for dumps produced without a hash table: every system is keyed by a hash
    /// literal and none carries a readable particle name.
    pub fn looks_hashed(&self) -> bool {
        !self.systems.is_empty()
            && self.systems.values().all(|s| {
                matches!(s.key, EntryKey::Hash(_))
                    && s.particle_name.is_none()
                    && s.particle_path.is_none()
            })
    }
}

/// Full block text for the entry addressed by `key`, or `None` when it is absent.
pub fn extract_block(text: &str, key: &str) -> Option<String> {
    let lines = scan::split_lines(text);
    let key = EntryKey::from_lookup(key);
    scan::find_entry(&lines, &key).map(|span| span.text(&lines))
}

fn string_field(lines: &[&str], name: &str, depth: i32) -> Option<String> {
    let idx = scan::find_field_at_depth(lines, name, depth)?;
    let field = scan::parse_field(lines[idx])?;
    value::unquote(field.value)
}

fn parse_system(lines: &[&str], span: &BlockSpan) -> System {
    let block = &lines[span.start_line..=span.end_line];
    let key_lookup = span.key.lookup();

    let particle_name = string_field(block, statics::FIELD_PARTICLE_NAME, 1);
    let particle_path = string_field(block, statics::FIELD_PARTICLE_PATH, 1);

    let spans = scan::scan_elements(block, statics::TYPE_EMITTER);
    let declared: Vec<Option<String>> = spans
        .iter()
        .map(|&(start, end)| string_field(&block[start..=end], statics::FIELD_EMITTER_NAME, 1))
        .collect();
    // Fallback names must not shadow a declared one.
    let mut taken: HashSet<String> = declared.iter().flatten().cloned().collect();
    let emitters = spans
        .into_iter()
        .zip(declared)
        .enumerate()
        .map(|(idx, ((start, end), name))| {
            let name = name.unwrap_or_else(|| {
                let name = naming::unique_name(&format!("Emitter_{}", idx + 1), |n| {
                    taken.contains(n)
                });
                taken.insert(name.clone());
                name
            });
            Emitter {
                name,
                system_key: key_lookup.clone(),
                span: LineRange { start, end },
                body: None,
            }
        })
        .collect();

    let display_name = particle_name
        .clone()
        .or_else(|| {
            span.key
                .as_name()
                .map(|n| n.rsplit('/').next().unwrap_or(n).to_string())
        })
        .unwrap_or_else(|| key_lookup.clone());

    System {
        key: span.key.clone(),
        display_name,
        particle_name,
        particle_path,
        emitters,
        raw: block.concat(),
        lines: LineRange {
            start: span.start_line,
            end: span.end_line,
        },
    }
}

fn is_color_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("color") || lower.contains("colour") || lower.contains("tint")
}

fn parse_material(lines: &[&str], span: &BlockSpan) -> Material {
    let block = &lines[span.start_line..=span.end_line];

    let mut params = Vec::new();
    for (start, end) in scan::scan_elements(block, statics::TYPE_MATERIAL_PARAM) {
        let param_lines = &block[start..=end];
        let Some(name) = string_field(param_lines, statics::FIELD_NAME, 1) else {
            continue;
        };
        let Some(rel) = scan::find_field_at_depth(param_lines, statics::FIELD_VALUE, 1) else {
            continue;
        };
        let Some(field) = scan::parse_field(param_lines[rel]) else {
            continue;
        };
        if field.ty != "vec4" {
            continue;
        }
        let Some(value) = value::parse_vec4(field.value) else {
            continue;
        };
        params.push(ColorParam {
            is_color: is_color_name(&name),
            name,
            value,
            line: span.start_line + start + rel,
        });
    }

    let display_name = string_field(block, statics::FIELD_NAME, 1)
        .map(|n| n.rsplit('/').next().unwrap_or(&n).to_string())
        .unwrap_or_else(|| span.key.lookup());

    Material {
        key: span.key.clone(),
        display_name,
        params,
        lines: LineRange {
            start: span.start_line,
            end: span.end_line,
        },
    }
}

fn parse_resource_map(lines: &[&str]) -> Vec<ResourceMapEntry> {
    let mut entries = Vec::new();
    for (start, end) in scan::find_field_blocks_anywhere(lines, statics::FIELD_RESOURCE_MAP) {
        for (idx, line) in lines.iter().enumerate().take(end).skip(start + 1) {
            let Some([_, key_tok, _, value_tok, _]) = scan::parse_map_pair(line) else {
                continue;
            };
            let (Some(key), Some(value)) = (EntryKey::parse(key_tok), EntryKey::parse(value_tok))
            else {
                continue;
            };
            entries.push(ResourceMapEntry {
                key,
                value,
                line: idx,
            });
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = concat!(
        "entries: map[hash,embed] = {\n",
        "    \"Characters/Ahri/Fx_A\" = VfxSystemDefinitionData {\n",
        "        complexEmitterDefinitionData: list[pointer] = {\n",
        "            VfxEmitterDefinitionData {\n",
        "                emitterName: string = \"Glow\"\n",
        "                blendMode: u8 = 4\n",
        "                texture: string = \"ASSETS/Glow.dds\"\n",
        "                color: embed = ValueColor {\n",
        "                    constantValue: vec4 = { 1, 0.5, 0, 1 }\n",
        "                }\n",
        "            }\n",
        "            VfxEmitterDefinitionData {\n",
        "                rate: embed = ValueFloat {\n",
        "                    constantValue: f32 = 1\n",
        "                }\n",
        "            }\n",
        "        }\n",
        "    }\n",
        "    0x12345678 = VfxSystemDefinitionData {}\n",
        "}\n",
    );

    #[test]
    fn parse_builds_systems_with_lazy_emitters() {
        let tree = VfxTree::parse(TEXT);
        assert_eq!(tree.systems.len(), 2);

        let system = tree.system("Characters/Ahri/Fx_A").unwrap();
        assert_eq!(system.display_name, "Fx_A");
        assert_eq!(system.emitter_names(), vec!["Glow", "Emitter_2"]);
        assert!(system.emitters.iter().all(|e| !e.is_loaded()));
        assert_eq!(system.lines, LineRange { start: 1, end: 17 });

        let hashed = tree.system("0x12345678").unwrap();
        assert_eq!(hashed.display_name, "0x12345678");
        assert!(hashed.emitters.is_empty());
    }

    #[test]
    fn fallback_emitter_names_skip_declared_ones() {
        let text = concat!(
            "\"Fx_A\" = VfxSystemDefinitionData {\n",
            "    complexEmitterDefinitionData: list[pointer] = {\n",
            "        VfxEmitterDefinitionData {\n",
            "            rate: f32 = 1\n",
            "        }\n",
            "        VfxEmitterDefinitionData {\n",
            "            rate: f32 = 2\n",
            "        }\n",
            "        VfxEmitterDefinitionData {\n",
            "            emitterName: string = \"Emitter_2\"\n",
            "        }\n",
            "    }\n",
            "}\n",
        );
        let tree = VfxTree::parse(text);
        let system = tree.system("Fx_A").unwrap();
        assert_eq!(
            system.emitter_names(),
            vec!["Emitter_1", "Emitter_2_1", "Emitter_2"]
        );
        assert_eq!(system.emitter("Emitter_2").unwrap().span, LineRange { start: 8, end: 10 });
    }

    #[test]
    fn emitter_body_hydrates_and_scans_details() {
        let mut tree = VfxTree::parse(TEXT);
        let body = tree.emitter_body("Characters/Ahri/Fx_A", "Glow").unwrap();
        assert!(body.starts_with("            VfxEmitterDefinitionData {\n"));
        assert!(body.ends_with("            }\n"));
        assert!(
            tree.system("Characters/Ahri/Fx_A")
                .unwrap()
                .emitter("Glow")
                .unwrap()
                .is_loaded()
        );

        let details = EmitterDetails::scan(&body);
        assert_eq!(details.textures, vec!["ASSETS/Glow.dds".to_string()]);
        assert_eq!(details.blend_mode, Some(4));
        assert_eq!(details.colors, vec![[1.0, 0.5, 0.0, 1.0]]);
    }

    #[test]
    fn extract_block_returns_none_for_missing_keys() {
        assert!(extract_block(TEXT, "Nope").is_none());
        assert_eq!(
            extract_block(TEXT, "0x12345678").as_deref(),
            Some("    0x12345678 = VfxSystemDefinitionData {}\n")
        );
    }

    #[test]
    fn looks_hashed_requires_only_hash_keys() {
        assert!(!VfxTree::parse(TEXT).looks_hashed());
        let hashed = "0x00000001 = VfxSystemDefinitionData {\n}\n";
        assert!(VfxTree::parse(hashed).looks_hashed());
        assert!(!VfxTree::parse("").looks_hashed());
    }
}

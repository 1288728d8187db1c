use std::fmt;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the lowercased name; the hash the bin format uses for entry keys,
/// field names and link values.
pub fn fnv1a_lower(name: &str) -> u32 {
    let mut h = FNV_OFFSET;
    for b in name.bytes() {
        h ^= u32::from(b.to_ascii_lowercase());
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

pub fn hash_literal(hash: u32) -> String {
    format!("0x{hash:08x}")
}

/// Parse a `0x`-prefixed hash literal. Anything wider than 32 bits is rejected.
pub fn parse_hash_literal(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))?;
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// A top-level entry key, or one side of a resource-map entry: either a quoted string
/// or a hash literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Name(String),
    Hash(u32),
}

impl EntryKey {
    /// Parse the raw key token as it appears in the text (`"quoted"` or `0x1234abcd`).
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.starts_with('"') {
            return unquote(token).map(EntryKey::Name);
        }
        parse_hash_literal(token).map(EntryKey::Hash)
    }

    /// Interpret a caller-supplied lookup string: hash literals address hash keys,
    /// anything else is a plain name.
    pub fn from_lookup(lookup: &str) -> Self {
        match parse_hash_literal(lookup) {
            Some(h) if lookup.len() == 10 => EntryKey::Hash(h),
            _ => EntryKey::Name(lookup.to_string()),
        }
    }

    /// The string callers use to address this entry in a tree.
    pub fn lookup(&self) -> String {
        match self {
            EntryKey::Name(name) => name.clone(),
            EntryKey::Hash(h) => hash_literal(*h),
        }
    }

    /// The token written back into the text.
    pub fn to_token(&self) -> String {
        match self {
            EntryKey::Name(name) => quote(name),
            EntryKey::Hash(h) => hash_literal(*h),
        }
    }

    pub fn hash(&self) -> u32 {
        match self {
            EntryKey::Name(name) => fnv1a_lower(name),
            EntryKey::Hash(h) => *h,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            EntryKey::Name(name) => Some(name),
            EntryKey::Hash(_) => None,
        }
    }

    /// True when this key names `other`, either literally or through its hash.
    pub fn refers_to(&self, other: &EntryKey) -> bool {
        match (self, other) {
            (EntryKey::Name(a), EntryKey::Name(b)) => a == b,
            _ => self.hash() == other.hash(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lookup())
    }
}

/// Quote a string the way the text form writes string values.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Strip quotes and resolve escapes. Returns `None` for anything that is not a single
/// complete quoted string.
pub fn unquote(token: &str) -> Option<String> {
    let inner = token.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            '"' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

/// Write a float the way the compiler does: shortest round-trip digits, no trailing `.0`.
pub fn format_float(v: f32) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v.is_sign_negative() { "-inf" } else { "inf" }.to_string();
    }
    let mut buf = ryu::Buffer::new();
    let s = buf.format(v);
    match s.strip_suffix(".0") {
        Some(int) if int == "-0" => "0".to_string(),
        Some(int) => int.to_string(),
        None => s.to_string(),
    }
}

/// Parse `{ r, g, b, a }`.
pub fn parse_vec4(text: &str) -> Option<[f32; 4]> {
    let inner = text.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut out = [0.0f32; 4];
    let mut count = 0usize;
    for part in inner.split(',') {
        if count == 4 {
            return None;
        }
        out[count] = part.trim().parse::<f32>().ok()?;
        count += 1;
    }
    (count == 4).then_some(out)
}

pub fn format_vec4(v: [f32; 4]) -> String {
    format!(
        "{{ {}, {}, {}, {} }}",
        format_float(v[0]),
        format_float(v[1]),
        format_float(v[2]),
        format_float(v[3])
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_is_case_insensitive() {
        assert_eq!(fnv1a_lower(""), 0x811c_9dc5);
        assert_eq!(fnv1a_lower("a"), 0xe40c_292c);
        assert_eq!(fnv1a_lower("Fx_A"), fnv1a_lower("fx_a"));
    }

    #[test]
    fn entry_key_parses_both_forms() {
        assert_eq!(
            EntryKey::parse("\"Fx_A\""),
            Some(EntryKey::Name("Fx_A".to_string()))
        );
        assert_eq!(
            EntryKey::parse("0x1A2B3C4D"),
            Some(EntryKey::Hash(0x1a2b_3c4d))
        );
        assert_eq!(EntryKey::parse("0x123456789"), None);
        assert_eq!(EntryKey::Hash(0xab).to_token(), "0x000000ab");
    }

    #[test]
    fn from_lookup_only_treats_full_literals_as_hashes() {
        assert_eq!(EntryKey::from_lookup("0x0000abcd"), EntryKey::Hash(0xabcd));
        assert_eq!(
            EntryKey::from_lookup("0xabc"),
            EntryKey::Name("0xabc".to_string())
        );
    }

    #[test]
    fn refers_to_matches_name_against_hash() {
        let name = EntryKey::Name("Fx_A".to_string());
        let hash = EntryKey::Hash(fnv1a_lower("fx_a"));
        assert!(name.refers_to(&hash));
        assert!(hash.refers_to(&name));
        assert!(!name.refers_to(&EntryKey::Name("fx_a".to_string())));
    }

    #[test]
    fn quote_and_unquote_escape_specials() {
        let raw = "a \"b\" \\ c";
        let quoted = quote(raw);
        assert_eq!(quoted, "\"a \\\"b\\\" \\\\ c\"");
        assert_eq!(unquote(&quoted).as_deref(), Some(raw));
        assert_eq!(unquote("\"a\" \"b\""), None);
    }

    #[test]
    fn floats_drop_trailing_zero_fraction() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-2.0), "-2");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-0.0), "0");
    }

    #[test]
    fn vec4_parse_and_format() {
        assert_eq!(parse_vec4("{ 1, 0.5, 0.25, 1 }"), Some([1.0, 0.5, 0.25, 1.0]));
        assert_eq!(parse_vec4("{1,2,3}"), None);
        assert_eq!(parse_vec4("{ 1, 2, 3, 4, 5 }"), None);
        assert_eq!(format_vec4([1.0, 0.5, 0.25, 1.0]), "{ 1, 0.5, 0.25, 1 }");
    }
}

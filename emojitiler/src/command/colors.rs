//! Color-name resolution for chroma-key backgrounds.

/// Known color names and their hex values.
const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "000000"),
    ("white", "FFFFFF"),
    ("red", "FF0000"),
    ("green", "00FF00"),
    ("blue", "0000FF"),
    ("yellow", "FFFF00"),
    ("cyan", "00FFFF"),
    ("magenta", "FF00FF"),
    ("pink", "FFC0CB"),
    ("orange", "FFA500"),
    ("purple", "800080"),
    ("gray", "808080"),
    ("grey", "808080"),
    ("brown", "A52A2A"),
];

/// Resolves a color argument to the `0xRRGGBB` form the transcoder filter
/// expects.
///
/// Accepts a known color name (case-insensitive), a bare 6-digit hex value,
/// or a `#`/`0x`-prefixed hex value. Returns `None` for anything else.
pub fn resolve_color(input: &str) -> Option<String> {
    let lower = input.to_ascii_lowercase();
    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Some(format!("0x{hex}"));
    }

    let hex = lower
        .strip_prefix("0x")
        .or_else(|| lower.strip_prefix('#'))
        .unwrap_or(&lower);
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(format!("0x{}", hex.to_ascii_uppercase()));
    }

    None
}

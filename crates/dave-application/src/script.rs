//! Right-to-left script detection used to tag history entries.

/// Inclusive code point ranges of the Arabic script blocks, sorted.
const ARABIC_RANGES: [(u32, u32); 10] = [
    (0x0600, 0x061E),
    (0x0620, 0x06FF),
    (0x0750, 0x077F),
    (0x08A0, 0x08FF),
    (0xFB50, 0xFDFF),
    (0xFE70, 0xFEFF),
    (0x10E60, 0x10E7F),
    (0x1EC70, 0x1ECBF),
    (0x1ED00, 0x1ED4F),
    (0x1EE00, 0x1EEFF),
];

/// `ARABIC_RANGES` flattened to half-open boundaries `[start, end + 1)`.
const BOUNDARIES: [u32; 20] = flatten(ARABIC_RANGES);

const fn flatten(ranges: [(u32, u32); 10]) -> [u32; 20] {
    let mut out = [0; 20];
    let mut i = 0;
    while i < ranges.len() {
        out[2 * i] = ranges[i].0;
        out[2 * i + 1] = ranges[i].1 + 1;
        i += 1;
    }
    out
}

/// True when `c` falls inside one of the ranges.
///
/// The number of boundaries at or below `c` is odd exactly when `c` sits
/// inside a range.
fn is_rtl_char(c: char) -> bool {
    BOUNDARIES.partition_point(|&boundary| boundary <= c as u32) % 2 == 1
}

/// True when any character of `text` belongs to the Arabic script table.
pub fn contains_rtl_script(text: &str) -> bool {
    text.chars().any(is_rtl_char)
}

//! Marker-delimited prompt region and its truncation
//!
//! Only the first `start ... end` pair in a prompt is ever read or rewritten.

/// Default opening marker of the case statement region
pub const DEFAULT_START_MARKER: &str = "<案情陈述开始>";

/// Default closing marker of the case statement region
pub const DEFAULT_END_MARKER: &str = "<案情陈述结束>";

/// Characters removed from the end of the region per shrink
pub const DEFAULT_SHRINK_CHARS: usize = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMarkers {
    pub start: String,
    pub end: String,
}

impl Default for RegionMarkers {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_MARKER.to_string(),
            end: DEFAULT_END_MARKER.to_string(),
        }
    }
}

/// Result of one attempt to shorten a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shrink {
    /// New prompt with a shorter region
    Shrunk(String),
    /// Region is already too short to lose another chunk
    Exhausted,
    /// Prompt has no complete region
    NoRegion,
}

/// Byte range of the first region's content (between the markers).
fn region_bounds(prompt: &str, markers: &RegionMarkers) -> Option<(usize, usize)> {
    let start = prompt.find(&markers.start)? + markers.start.len();
    let len = prompt[start..].find(&markers.end)?;
    Some((start, start + len))
}

/// Content between the first start marker and the next end marker.
pub fn extract_region<'a>(prompt: &'a str, markers: &RegionMarkers) -> Option<&'a str> {
    region_bounds(prompt, markers).map(|(s, e)| &prompt[s..e])
}

/// Drop the last `chars` characters of `region`.
///
/// `None` when that would leave nothing.
pub fn shrink_region(region: &str, chars: usize) -> Option<&str> {
    let total = region.chars().count();
    if total <= chars {
        return None;
    }
    let keep = total - chars;
    let cut = region
        .char_indices()
        .nth(keep)
        .map_or(region.len(), |(i, _)| i);
    Some(&region[..cut])
}

/// Replace the first region's content, keeping both markers.
pub fn replace_region(prompt: &str, markers: &RegionMarkers, content: &str) -> Option<String> {
    let (start, end) = region_bounds(prompt, markers)?;
    let mut out = String::with_capacity(start + content.len() + prompt.len() - end);
    out.push_str(&prompt[..start]);
    out.push_str(content);
    out.push_str(&prompt[end..]);
    Some(out)
}

/// Shorten the first region of `prompt` by `chars` characters.
pub fn shrink_prompt(prompt: &str, markers: &RegionMarkers, chars: usize) -> Shrink {
    let Some(region) = extract_region(prompt, markers) else {
        return Shrink::NoRegion;
    };
    match shrink_region(region, chars) {
        Some(shorter) => match replace_region(prompt, markers, shorter) {
            Some(p) => Shrink::Shrunk(p),
            None => Shrink::NoRegion,
        },
        None => Shrink::Exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> RegionMarkers {
        RegionMarkers {
            start: "<S>".into(),
            end: "<E>".into(),
        }
    }

    #[test]
    fn extract_first_region_only() {
        let p = "head <S>one<E> mid <S>two<E> tail";
        assert_eq!(extract_region(p, &markers()), Some("one"));
    }

    #[test]
    fn extract_spans_newlines() {
        let p = "<S>line1\nline2<E>";
        assert_eq!(extract_region(p, &markers()), Some("line1\nline2"));
    }

    #[test]
    fn extract_requires_both_markers() {
        assert_eq!(extract_region("no markers", &markers()), None);
        assert_eq!(extract_region("<S>open only", &markers()), None);
        assert_eq!(extract_region("<E>before<S>", &markers()), None);
    }

    #[test]
    fn shrink_counts_characters_not_bytes() {
        let region = "案情陈述内容";
        assert_eq!(shrink_region(region, 2), Some("案情陈述"));
        assert_eq!(shrink_region(region, 6), None);
        assert_eq!(shrink_region(region, 10), None);
        assert_eq!(shrink_region("", 0), None);
    }

    #[test]
    fn replace_keeps_markers_and_other_regions() {
        let p = "a<S>one<E>b<S>two<E>";
        assert_eq!(
            replace_region(p, &markers(), "1").as_deref(),
            Some("a<S>1<E>b<S>two<E>")
        );
    }

    #[test]
    fn shrink_prompt_outcomes() {
        let m = markers();
        let long = format!("x<S>{}<E>y", "z".repeat(10));
        assert_eq!(
            shrink_prompt(&long, &m, 4),
            Shrink::Shrunk(format!("x<S>{}<E>y", "z".repeat(6)))
        );
        assert_eq!(shrink_prompt(&long, &m, 10), Shrink::Exhausted);
        assert_eq!(shrink_prompt("x<S><E>y", &m, 1), Shrink::Exhausted);
        assert_eq!(shrink_prompt("plain", &m, 1), Shrink::NoRegion);
    }

    #[test]
    fn repeated_shrinks_reach_floor() {
        let m = RegionMarkers::default();
        let mut prompt = format!(
            "请判断：{}{}{}",
            m.start,
            "字".repeat(DEFAULT_SHRINK_CHARS * 2 + 10),
            m.end
        );
        let mut shrinks = 0;
        loop {
            match shrink_prompt(&prompt, &m, DEFAULT_SHRINK_CHARS) {
                Shrink::Shrunk(p) => {
                    assert!(p.len() < prompt.len());
                    prompt = p;
                    shrinks += 1;
                }
                Shrink::Exhausted => break,
                Shrink::NoRegion => panic!("markers lost"),
            }
        }
        assert_eq!(shrinks, 2);
        assert_eq!(extract_region(&prompt, &m), Some("字".repeat(10).as_str()));
    }
}

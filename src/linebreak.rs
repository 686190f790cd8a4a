//! Unicode text segmentation (UAX #14 line breaking) for outbound message
//! splitting.
//!
//! IRC caps a single line at a small byte budget (512 bytes minus framing
//! overhead, see [`crate::command::record`]); long messages must be cut
//! into several lines without breaking mid-word or mid-grapheme wherever a
//! legal break opportunity exists nearby.
//!
//! Break *legality* (which positions in a string are allowed to end a
//! line at all) is delegated to [`unicode_linebreak`] — the "Unicode
//! property database" spec.md's Non-goals name as an external lookup.
//! What the crate doesn't do is rank candidates: when several legal
//! breaks fall inside the trailing window of a line, this module scores
//! each one with an approximate UAX #14 rule number (lower overrides
//! higher, per spec.md §4.2 step 5) using the codepoint classes
//! [`unicode_linebreak::break_property`] exposes, [`unicode_width`] for
//! the East-Asian-width check LB30 excludes on, and small hand-rolled
//! Regional_Indicator/Extended_Pictographic range tables for the
//! LB30a/LB30b emoji contexts. The ranking is only ever used to choose
//! among positions `unicode_linebreak` already calls legal — it never
//! overrides a legality decision, so an imprecise rule number can only
//! make the chosen break point less ideal, never illegal.

use unicode_linebreak::{break_property, linebreaks, BreakClass, BreakOpportunity};
use unicode_width::UnicodeWidthChar;

/// One output line from [`split`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// The line's text, with or without its trailing break characters
    /// depending on [`LineBreakOptions::include_break_characters`].
    pub text: String,
    /// Whether this line ends at a mandatory break (an explicit line
    /// terminator, or the end of the input) as opposed to a break chosen
    /// only to satisfy the byte budget.
    pub mandatory: bool,
}

/// Options controlling [`split`].
#[derive(Clone, Copy, Debug)]
pub struct LineBreakOptions {
    /// Maximum line length in bytes. Lines exceed this only when
    /// `allow_overflow` is set and no earlier break opportunity exists.
    pub max_bytes: usize,
    /// When a single unbreakable run is longer than `max_bytes`, let it
    /// overflow the budget instead of forcing a break inside it.
    pub allow_overflow: bool,
    /// Keep break characters (spaces, CR/LF) attached to the line that
    /// precedes them. When unset, they're dropped from the output
    /// entirely and concatenating the lines does not reconstruct the
    /// original string.
    pub include_break_characters: bool,
}

impl Default for LineBreakOptions {
    fn default() -> Self {
        Self {
            max_bytes: 512,
            allow_overflow: false,
            include_break_characters: false,
        }
    }
}

/// How far back from the budget boundary a break point can sit and still
/// be a candidate "threshold" (spec.md §4.2 step 5: `max_bytes − 24`).
const WINDOW_BYTES: usize = 24;

const BREAK_CHARS: [char; 4] = [' ', '\t', '\r', '\n'];

fn trimmed_end(text: &str, include_break_characters: bool) -> &str {
    if include_break_characters {
        text
    } else {
        text.trim_end_matches(|c| BREAK_CHARS.contains(&c))
    }
}

fn char_boundary_at_or_before(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// LB1: resolve classes the rule table never sees directly onto their
/// fallback class (AI/SG/XX -> AL, CJ -> NS). `SA` (complex-context,
/// e.g. Thai/Lao/Khmer) should split further into CM or AL by general
/// category, but that requires a general-category table this crate
/// doesn't carry (spec.md's Non-goal externalizes the property database
/// as a whole); it is folded into AL here.
fn resolve_class(class: BreakClass) -> BreakClass {
    match class {
        BreakClass::AI | BreakClass::SG | BreakClass::XX | BreakClass::SA => BreakClass::AL,
        BreakClass::CJ => BreakClass::NS,
        other => other,
    }
}

/// Regional_Indicator codepoints (the 26 "flag letter" symbols,
/// U+1F1E6..=U+1F1FF) — LB30a pairs two of these into a flag and forbids
/// breaking them apart.
fn is_regional_indicator(c: char) -> bool {
    matches!(c as u32, 0x1F1E6..=0x1F1FF)
}

/// Approximates Extended_Pictographic via its well-known contiguous
/// blocks (dingbats, the misc-symbols-and-pictographs planes, emoji
/// modifiers). Not a generated property table — spec.md's Non-goals
/// explicitly externalize the Unicode property database itself, so this
/// is a best-effort range list rather than a full derivation.
fn is_extended_pictographic_approx(c: char) -> bool {
    matches!(c as u32,
        0x231A..=0x231B
        | 0x2328
        | 0x23CF
        | 0x23E9..=0x23FA
        | 0x24C2
        | 0x25AA..=0x25FE
        | 0x2600..=0x27BF
        | 0x2934..=0x2935
        | 0x2B00..=0x2BFF
        | 0x3030
        | 0x303D
        | 0x3297
        | 0x3299
        | 0x1F000..=0x1FAFF
    )
}

fn is_wide(c: char) -> bool {
    UnicodeWidthChar::width(c).unwrap_or(0) >= 2
}

/// Assigns an approximate UAX #14 rule number to a legal break point,
/// given the resolved classes either side of it. Lower numbers are
/// preferred (spec.md §4.2: "lower rule numbers override higher"); `31`
/// (LB31, "break everywhere else") is the default for anything not
/// matched by a more specific rule below.
fn rule_priority(prev: BreakClass, cur: Option<BreakClass>, prev_wide: bool, cur_wide: bool, prev_special: bool, cur_special: bool) -> u8 {
    use BreakClass::*;

    let Some(cur) = cur else {
        // No codepoint follows: only the end-of-text sentinel would land
        // here, which `split` always treats as mandatory rather than
        // scoring through this function.
        return 3;
    };

    if prev == SP {
        return 18; // LB18: break after spaces.
    }
    if matches!(prev, BA | HY | CB) {
        return 21; // LB21: break opportunity after hyphens/BA/CB.
    }
    if prev == IN {
        return 17; // LB17: break after inseparable runs (e.g. ellipses).
    }
    if prev_special || cur_special {
        // LB30a (regional-indicator flag pairs) / LB30b (emoji modifier
        // sequences): `unicode_linebreak` already refuses to split these
        // apart, so reaching here means the window boundary falls just
        // outside such a run; rank it alongside the East-Asian exclusion
        // band rather than as an ordinary word break.
        return 30;
    }
    if (prev_wide || cur_wide) && matches!(prev, ID | EB | EM | H2 | H3 | JL | JV | JT) {
        return 30; // LB30: East-Asian-wide ideograph run.
    }
    if matches!(prev, ID | EB | EM | H2 | H3 | JL | JV | JT) && matches!(cur, ID | EB | EM | H2 | H3 | JL | JV | JT) {
        return 26; // Hangul syllable / ideograph adjacency.
    }
    if matches!(prev, NU | IS | SY | PR | PO) || matches!(cur, NU | IS | SY | PR | PO) {
        return 25; // LB25: numeric context.
    }
    if matches!(prev, AL | HL) && matches!(cur, AL | HL) {
        return 28; // LB28: between alphabetics.
    }
    31
}

/// Scores a legal break point at byte offset `pos` in `text`.
fn break_rule_priority(text: &str, pos: usize) -> u8 {
    let prev_char = text[..pos].chars().next_back();
    let cur_char = text[pos..].chars().next();

    let Some(prev_char) = prev_char else {
        return 2; // LB2: nothing precedes sot; not a real candidate.
    };

    let prev_class = resolve_class(break_property(prev_char as u32));
    let cur_class = cur_char.map(|c| resolve_class(break_property(c as u32)));

    let prev_wide = is_wide(prev_char);
    let cur_wide = cur_char.is_some_and(is_wide);
    let prev_special = is_regional_indicator(prev_char) || is_extended_pictographic_approx(prev_char);
    let cur_special = cur_char.is_some_and(|c| is_regional_indicator(c) || is_extended_pictographic_approx(c));

    rule_priority(prev_class, cur_class, prev_wide, cur_wide, prev_special, cur_special)
}

/// Split `text` into lines honoring the UAX #14 break opportunities
/// present in it, each no longer than `options.max_bytes` bytes unless
/// `options.allow_overflow` is set.
#[must_use]
pub fn split(text: &str, options: &LineBreakOptions) -> Vec<Line> {
    if text.is_empty() {
        return vec![Line {
            text: String::new(),
            mandatory: true,
        }];
    }

    let breaks: Vec<(usize, bool)> = linebreaks(text)
        .map(|(pos, opp)| (pos, matches!(opp, BreakOpportunity::Mandatory)))
        .collect();

    let mut lines = Vec::new();
    let mut line_start = 0usize;
    // The best optional-break candidate seen since `line_start` that
    // falls within the trailing window `[max_bytes - WINDOW_BYTES,
    // max_bytes]` of the budget boundary: (byte offset, rule number).
    // Lowest rule number wins; ties keep the later occurrence (the `<=`
    // comparison below), matching spec.md §4.2 step 5's tie-break.
    let mut window_best: Option<(usize, u8)> = None;
    let mut idx = 0usize;

    let window_lo_bytes = options.max_bytes.saturating_sub(WINDOW_BYTES);

    while idx < breaks.len() {
        let (pos, mandatory) = breaks[idx];
        let len = pos - line_start;

        if len <= options.max_bytes || options.allow_overflow {
            if mandatory {
                let text_out = trimmed_end(&text[line_start..pos], options.include_break_characters);
                lines.push(Line {
                    text: text_out.to_owned(),
                    mandatory: true,
                });
                line_start = pos;
                window_best = None;
            } else if len >= window_lo_bytes {
                let priority = break_rule_priority(text, pos);
                let better = match window_best {
                    None => true,
                    Some((_, best_priority)) => priority <= best_priority,
                };
                if better {
                    window_best = Some((pos, priority));
                }
            }
            idx += 1;
            continue;
        }

        // `pos` overflows the budget from `line_start`. Rewind to the
        // best windowed threshold, if one was seen.
        if let Some((fit_pos, _)) = window_best.take() {
            let text_out = trimmed_end(&text[line_start..fit_pos], options.include_break_characters);
            lines.push(Line {
                text: text_out.to_owned(),
                mandatory: false,
            });
            line_start = fit_pos;
            // Reconsider the same breakpoint against the new line start.
            continue;
        }

        // No windowed break opportunity fits: a single run is longer
        // than the budget. Force a break at the budget boundary (on a
        // char boundary) and keep going.
        let forced = char_boundary_at_or_before(text, line_start + options.max_bytes);
        let forced = if forced > line_start {
            forced
        } else {
            // The budget is smaller than one character; make forward
            // progress by taking exactly one character.
            text[line_start..]
                .char_indices()
                .nth(1)
                .map_or(text.len(), |(i, _)| line_start + i)
        };
        lines.push(Line {
            text: text[line_start..forced].to_owned(),
            mandatory: false,
        });
        line_start = forced;
        // Reconsider the same breakpoint against the new line start.
    }

    if line_start < text.len() {
        // `unicode_linebreak::linebreaks` always yields a final mandatory
        // break at `text.len()`, so this only runs for pathological empty
        // break iterators; treat the remainder as one final line.
        let text_out = trimmed_end(&text[line_start..], options.include_break_characters);
        lines.push(Line {
            text: text_out.to_owned(),
            mandatory: true,
        });
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_word_boundary_when_it_fits() {
        let lines = split("hello world", &LineBreakOptions { max_bytes: 6, ..Default::default() });
        assert_eq!(
            lines,
            vec![
                Line { text: "hello".to_owned(), mandatory: false },
                Line { text: "world".to_owned(), mandatory: true },
            ]
        );
    }

    #[test]
    fn keeps_break_characters_when_requested() {
        let lines = split(
            "a\r\nb",
            &LineBreakOptions {
                max_bytes: 100,
                include_break_characters: true,
                ..Default::default()
            },
        );
        assert_eq!(
            lines,
            vec![
                Line { text: "a\r\n".to_owned(), mandatory: true },
                Line { text: "b".to_owned(), mandatory: true },
            ]
        );
    }

    #[test]
    fn empty_input_yields_single_empty_line() {
        let lines = split("", &LineBreakOptions::default());
        assert_eq!(lines, vec![Line { text: String::new(), mandatory: true }]);
    }

    #[test]
    fn forces_break_inside_a_run_longer_than_budget() {
        let text = "a".repeat(20);
        let lines = split(&text, &LineBreakOptions { max_bytes: 8, ..Default::default() });
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.text.len() <= 8);
        }
        let joined: String = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn allow_overflow_keeps_unbreakable_run_whole() {
        let text = "a".repeat(20);
        let lines = split(
            &text,
            &LineBreakOptions {
                max_bytes: 8,
                allow_overflow: true,
                ..Default::default()
            },
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, text);
    }

    #[test]
    fn reconstructs_original_when_break_characters_included() {
        let text = "one two three four five six seven eight";
        let lines = split(
            text,
            &LineBreakOptions {
                max_bytes: 12,
                include_break_characters: true,
                ..Default::default()
            },
        );
        let joined: String = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn no_line_exceeds_budget_without_overflow() {
        let text = "the quick brown fox jumps over the lazy dog and then some more words follow";
        for max_bytes in [4usize, 8, 16, 32] {
            let lines = split(text, &LineBreakOptions { max_bytes, ..Default::default() });
            for line in &lines {
                assert!(
                    line.text.len() <= max_bytes,
                    "line {:?} exceeds budget {}",
                    line.text,
                    max_bytes
                );
            }
        }
    }

    #[test]
    fn prefers_lowest_rule_number_within_window_over_latest_candidate() {
        // Two candidates land before the first overflow: the space after
        // "alpha" (rule 18) and the hyphen after "beta" (rule 21). The
        // hyphen is the more recent candidate, but the space has the
        // lower (higher-priority) rule number, so the rewind should land
        // on "alpha" rather than the later "alpha beta".
        let text = "alpha beta-gamma delta";
        let lines = split(text, &LineBreakOptions { max_bytes: 16, ..Default::default() });
        assert_eq!(lines[0].text, "alpha");
    }

    #[test]
    fn does_not_use_a_break_point_outside_the_window() {
        // The only space early in the string sits well outside the
        // trailing-24-byte window for this budget, so the line should
        // run up to the budget boundary (or the next in-window break)
        // rather than rewinding all the way back to it.
        let text = "ab cdefghijklmnopqrstuvwxyzabcdefghijklmnop";
        let lines = split(text, &LineBreakOptions { max_bytes: 40, ..Default::default() });
        assert_ne!(lines[0].text, "ab");
    }
}

//! Deterministic option matching.
//!
//! Rules are tried in a fixed order and the first hit wins; there is no
//! scoring. An option equal to the target always wins, then the alias table,
//! then bidirectional substring containment.

use crate::field::FieldOption;

/// Synonyms for one domain concept, written in [`normalize`]d form.
#[derive(Debug, Clone, Copy)]
pub struct AliasGroup {
    pub concept: &'static str,
    pub synonyms: &'static [&'static str],
}

pub const ALIAS_GROUPS: &[AliasGroup] = &[
    AliasGroup {
        concept: "decline",
        synonyms: &[
            "decline to self identify",
            "decline",
            "prefer not to say",
            "prefer not to answer",
            "i dont wish to answer",
            "do not wish to answer",
            "choose not to disclose",
        ],
    },
    AliasGroup {
        concept: "no",
        synonyms: &["no", "false"],
    },
    AliasGroup {
        concept: "yes",
        synonyms: &["yes", "true"],
    },
    AliasGroup {
        concept: "high_school",
        synonyms: &["high school", "ged", "secondary school"],
    },
    AliasGroup {
        concept: "associate",
        synonyms: &["associates", "associate"],
    },
    AliasGroup {
        concept: "bachelor",
        synonyms: &["bachelors", "bachelor", "ba", "bs", "bsc", "beng", "undergraduate"],
    },
    AliasGroup {
        concept: "mba",
        synonyms: &["mba", "master of business administration"],
    },
    AliasGroup {
        concept: "master",
        synonyms: &["masters", "master", "ms", "msc", "ma", "meng"],
    },
    AliasGroup {
        concept: "doctorate",
        synonyms: &["phd", "doctorate", "doctoral", "doctor of philosophy"],
    },
    AliasGroup {
        concept: "female",
        synonyms: &["female", "woman"],
    },
    AliasGroup {
        concept: "male",
        synonyms: &["male", "man"],
    },
];

/// Lowercase, drop apostrophes and periods, turn other punctuation into
/// spaces, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\'' | '\u{2019}' | '.' => {}
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prompt-style entries such as "Select..." or "-- choose --".
pub fn is_placeholder_option(option: &FieldOption) -> bool {
    let text = option.text.trim().to_lowercase();
    text.is_empty()
        || text.starts_with("select")
        || text.starts_with("choose")
        || text.starts_with("please select")
        || text.starts_with("--")
        || text == "none selected"
}

fn contains_phrase(tokens: &[&str], phrase: &str) -> bool {
    let wanted: Vec<&str> = phrase.split(' ').collect();
    !wanted.is_empty() && tokens.windows(wanted.len()).any(|w| w == wanted.as_slice())
}

/// Two-letter synonyms ("ma", "bs", "no") collide with state codes and prose.
fn is_short(synonym: &str) -> bool {
    synonym.len() <= 2
}

/// A target names a group through a short synonym only when that is all it says.
fn target_names(tokens: &[&str], synonym: &str) -> bool {
    if is_short(synonym) {
        tokens == [synonym]
    } else {
        contains_phrase(tokens, synonym)
    }
}

/// An option carries a short synonym only as its leading token ("No, I will not").
fn option_names(tokens: &[&str], synonym: &str) -> bool {
    if is_short(synonym) {
        tokens.first() == Some(&synonym)
    } else {
        contains_phrase(tokens, synonym)
    }
}

/// Pick the option that `target` names, or `None`.
pub fn match_option<'a>(options: &'a [FieldOption], target: &str) -> Option<&'a FieldOption> {
    let target_norm = normalize(target);
    if target_norm.is_empty() {
        return None;
    }
    let candidates: Vec<&FieldOption> = options
        .iter()
        .filter(|o| !is_placeholder_option(o))
        .collect();
    let wanted = target.trim();

    if let Some(exact) = candidates.iter().find(|o| {
        o.text.trim().eq_ignore_ascii_case(wanted)
            || o.value.trim().eq_ignore_ascii_case(wanted)
            || normalize(&o.text) == target_norm
    }) {
        return Some(exact);
    }

    let target_tokens: Vec<&str> = target_norm.split(' ').collect();
    let group = ALIAS_GROUPS
        .iter()
        .find(|g| g.synonyms.iter().any(|s| target_names(&target_tokens, s)));
    if let Some(group) = group {
        let normalized: Vec<String> = candidates.iter().map(|o| normalize(&o.text)).collect();
        let by_equality = normalized
            .iter()
            .position(|text| group.synonyms.contains(&text.as_str()));
        let by_phrase = || {
            normalized.iter().position(|text| {
                let tokens: Vec<&str> = text.split(' ').collect();
                group.synonyms.iter().any(|s| option_names(&tokens, s))
            })
        };
        if let Some(i) = by_equality.or_else(by_phrase) {
            return Some(candidates[i]);
        }
    }

    candidates.into_iter().find(|o| {
        let text = normalize(&o.text);
        !text.is_empty() && (text.contains(&target_norm) || target_norm.contains(&text))
    })
}

/// Option sharing the most tokens with `target`; first wins ties.
pub fn token_overlap_match<'a>(options: &'a [FieldOption], target: &str) -> Option<&'a FieldOption> {
    let target_norm = normalize(target);
    let target_tokens: Vec<&str> = target_norm.split(' ').filter(|t| t.len() > 1).collect();
    let mut best: Option<(usize, &FieldOption)> = None;
    for option in options.iter().filter(|o| !is_placeholder_option(o)) {
        let text = normalize(&option.text);
        let overlap = text
            .split(' ')
            .filter(|t| target_tokens.contains(t))
            .count();
        if overlap > 0 && best.map_or(true, |(score, _)| overlap > score) {
            best = Some((overlap, option));
        }
    }
    best.map(|(_, option)| option)
}

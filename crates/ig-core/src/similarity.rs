use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::constants::{
    CHAR_OVERLAP_SHARE, CONTENT_WEIGHT, ENERGY_WEIGHT, MAX_ENERGY, MIN_ENERGY, MIN_SUBSTRING_LEN,
    SUBSTRING_SHARE, TAG_WEIGHT, TITLE_WEIGHT,
};
use crate::idea::{Idea, clamp_energy};

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\W_]+").unwrap());

/// Per-component scores behind a combined similarity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SimilarityBreakdown {
    pub title: f64,
    pub content: f64,
    pub tags: f64,
    pub energy: f64,
    pub total: f64,
}

/// Combined similarity of two ideas in `[0, 1]`.
pub fn score(a: &Idea, b: &Idea) -> f64 {
    breakdown(a, b).total
}

pub fn breakdown(a: &Idea, b: &Idea) -> SimilarityBreakdown {
    let title = text_similarity(&a.title, &b.title);
    // Missing content scores zero but keeps its weight.
    let content = match (&a.content, &b.content) {
        (Some(ca), Some(cb)) => text_similarity(ca, cb),
        _ => 0.0,
    };
    let tags = tag_score(&a.tags, &b.tags);
    let energy = energy_score(a.energy, b.energy);

    let total = TITLE_WEIGHT * title
        + CONTENT_WEIGHT * content
        + TAG_WEIGHT * tags
        + ENERGY_WEIGHT * energy;

    SimilarityBreakdown {
        title,
        content,
        tags,
        energy,
        total: total.clamp(0.0, 1.0),
    }
}

/// Lower-case and drop everything that is not a letter or digit.
pub fn normalize(text: &str) -> String {
    NON_ALNUM.replace_all(&text.to_lowercase(), "").into_owned()
}

/// Blend of character overlap and common-substring overlap, in `[0, 1]`.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = normalize(a).chars().collect();
    let b: Vec<char> = normalize(b).chars().collect();
    let blended = CHAR_OVERLAP_SHARE * char_overlap(&a, &b) + SUBSTRING_SHARE * substring_score(&a, &b);
    blended.clamp(0.0, 1.0)
}

/// `2·matched / (len a + len b)`, each character of `b` matched at most once.
fn char_overlap(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }

    let mut available: HashMap<char, usize> = HashMap::new();
    for &c in b {
        *available.entry(c).or_default() += 1;
    }
    let mut matched = 0usize;
    for c in a {
        if let Some(n) = available.get_mut(c).filter(|n| **n > 0) {
            *n -= 1;
            matched += 1;
        }
    }

    2.0 * matched as f64 / total as f64
}

/// Sum of `len²` over distinct common substrings, over `len a · len b`.
///
/// Unbounded above for long shared runs; callers clamp. `a` is walked over a
/// suffix automaton of `b`. Each automaton state owns a distinct run of
/// substring lengths, so nothing is counted twice and the cost stays
/// near-linear in both lengths.
fn substring_score(a: &[char], b: &[char]) -> f64 {
    if a.len() < MIN_SUBSTRING_LEN || b.len() < MIN_SUBSTRING_LEN {
        return 0.0;
    }
    let automaton = SuffixAutomaton::build(b);
    let reach = automaton.longest_matches(a);

    let min = MIN_SUBSTRING_LEN as u128;
    let mut sum: u128 = 0;
    for (state, &matched) in reach.iter().enumerate() {
        let Some(link) = automaton.states[state].link else {
            continue;
        };
        // Lengths owned by this state: (len(link), len(state)].
        let lo = (automaton.states[link].len as u128 + 1).max(min);
        let hi = matched as u128;
        if hi >= lo {
            sum += square_sum(hi) - square_sum(lo - 1);
        }
    }
    sum as f64 / (a.len() as f64 * b.len() as f64)
}

/// `1² + 2² + … + n²`.
fn square_sum(n: u128) -> u128 {
    n * (n + 1) * (2 * n + 1) / 6
}

#[derive(Clone, Default)]
struct State {
    len: usize,
    link: Option<usize>,
    next: HashMap<char, usize>,
}

/// Every substring of the indexed text maps to exactly one state.
struct SuffixAutomaton {
    states: Vec<State>,
}

impl SuffixAutomaton {
    fn build(text: &[char]) -> Self {
        let mut states = Vec::with_capacity(2 * text.len() + 1);
        states.push(State::default());
        let mut last = 0;

        for &c in text {
            let cur = states.len();
            let len = states[last].len + 1;
            states.push(State {
                len,
                ..State::default()
            });

            let mut p = Some(last);
            let mut existing = None;
            while let Some(i) = p {
                if let Some(&q) = states[i].next.get(&c) {
                    existing = Some((i, q));
                    break;
                }
                states[i].next.insert(c, cur);
                p = states[i].link;
            }

            let link = match existing {
                None => 0,
                Some((i, q)) => {
                    if states[i].len + 1 == states[q].len {
                        q
                    } else {
                        let clone = states.len();
                        let mut split = states[q].clone();
                        split.len = states[i].len + 1;
                        states.push(split);
                        let mut p = Some(i);
                        while let Some(j) = p {
                            if states[j].next.get(&c) != Some(&q) {
                                break;
                            }
                            states[j].next.insert(c, clone);
                            p = states[j].link;
                        }
                        states[q].link = Some(clone);
                        clone
                    }
                }
            };
            states[cur].link = Some(link);
            last = cur;
        }

        Self { states }
    }

    /// Per state, the longest of its substrings that also occurs in `text`.
    /// Zero when none does.
    fn longest_matches(&self, text: &[char]) -> Vec<usize> {
        let mut reach = vec![0usize; self.states.len()];
        let (mut state, mut len) = (0usize, 0usize);

        for c in text {
            while state != 0 && !self.states[state].next.contains_key(c) {
                // The root has no link; every other state does.
                state = self.states[state].link.unwrap_or(0);
                len = self.states[state].len;
            }
            match self.states[state].next.get(c) {
                Some(&next) => {
                    state = next;
                    len += 1;
                }
                None => len = 0,
            }
            reach[state] = reach[state].max(len);
        }

        // A match in a state implies every shorter suffix matches, which live
        // in its link ancestors. Longest states first so parents see children.
        let mut order: Vec<usize> = (1..self.states.len()).collect();
        order.sort_unstable_by_key(|&s| std::cmp::Reverse(self.states[s].len));
        for s in order {
            let matched = reach[s].min(self.states[s].len);
            reach[s] = matched;
            if let Some(link) = self.states[s].link {
                let inherited = matched.min(self.states[link].len);
                reach[link] = reach[link].max(inherited);
            }
        }
        reach
    }
}

/// Dice coefficient over tag sets; 0 when both are empty.
pub fn tag_score<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let a: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let b: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * a.intersection(&b).count() as f64 / total as f64
}

/// `1 - |a - b| / 4` on clamped energy levels.
pub fn energy_score(a: u8, b: u8) -> f64 {
    let span = f64::from(MAX_ENERGY - MIN_ENERGY);
    let diff = f64::from(clamp_energy(a).abs_diff(clamp_energy(b)));
    1.0 - diff / span
}
